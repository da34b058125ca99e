// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! 8-byte version stamps for secret content rows.
//!
//! A stamp packs a millisecond timestamp relative to a fixed epoch into
//! the top 41 bits and random bits into the low 23, so stamps sort
//! lexicographically by creation time without leaking a guessable
//! sequence across unrelated secrets. 41 timestamp bits keep the scheme
//! from overflowing until 2078.

use serde::{Deserialize, Serialize};

/// Epoch for version stamps: 2010-01-01T00:00:00Z in unix milliseconds.
pub const VERSION_EPOCH_MS: i64 = 1_262_304_000_000;

const RANDOM_BITS: u32 = 23;
const RANDOM_MASK: u64 = (1 << RANDOM_BITS) - 1;

/// Source of randomness for the low bits of a version stamp.
///
/// Injected at the call site so version generation stays a pure function
/// of (clock, random source) and tests can pin both.
pub trait RandomSource: Send + Sync {
	fn random_bits(&self) -> u64;
}

/// Production random source backed by the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
	fn random_bits(&self) -> u64 {
		use rand::RngCore;
		rand::rngs::OsRng.next_u64()
	}
}

/// Fixed random source for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub u64);

impl RandomSource for FixedRandom {
	fn random_bits(&self) -> u64 {
		self.0
	}
}

/// Opaque identifier of one secret content version.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionStamp(i64);

impl VersionStamp {
	/// Build a stamp from a unix-millisecond clock reading and random bits.
	///
	/// Only the low 23 random bits are kept. `now_ms` must be after the
	/// stamp epoch; any caller-supplied clock after 2010 satisfies this.
	pub fn from_parts(now_ms: i64, random: u64) -> Self {
		assert!(now_ms > VERSION_EPOCH_MS, "clock reads before the version epoch");
		let time = (now_ms - VERSION_EPOCH_MS) as u64;
		Self(((time << RANDOM_BITS) | (random & RANDOM_MASK)) as i64)
	}

	/// Generate a stamp for `now_ms` using the supplied random source.
	pub fn generate(now_ms: i64, random: &dyn RandomSource) -> Self {
		Self::from_parts(now_ms, random.random_bits())
	}

	pub fn as_i64(self) -> i64 {
		self.0
	}

	pub fn from_i64(raw: i64) -> Self {
		Self(raw)
	}

	/// Milliseconds since the unix epoch at which this stamp was minted.
	pub fn timestamp_ms(self) -> i64 {
		((self.0 as u64) >> RANDOM_BITS) as i64 + VERSION_EPOCH_MS
	}

	/// 16-char lowercase hex rendering, zero padded so string order
	/// matches numeric order.
	pub fn to_hex(self) -> String {
		format!("{:016x}", self.0 as u64)
	}

	pub fn parse_hex(text: &str) -> Result<Self, ParseVersionError> {
		if text.len() != 16 {
			return Err(ParseVersionError(text.to_string()));
		}
		u64::from_str_radix(text, 16)
			.map(|v| Self(v as i64))
			.map_err(|_| ParseVersionError(text.to_string()))
	}
}

impl std::fmt::Display for VersionStamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.to_hex())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("invalid version stamp: {0}")]
pub struct ParseVersionError(pub String);
