// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Content encryption for the Warden secret store.
//!
//! Payloads are encrypted under per-secret keys derived from a single
//! master key via HKDF-SHA256, keyed by the secret's name, so every
//! version of one secret uses compatible key material. Ciphertext is a
//! self-describing JSON envelope carrying the derivation info and nonce.

pub mod content;
pub mod error;

pub use content::{ContentCryptographer, Cryptographer, KEY_SIZE, NONCE_SIZE};
pub use error::{CryptoError, CryptoResult};
