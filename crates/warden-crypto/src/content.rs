// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The [`Cryptographer`] seam and its AES-256-GCM implementation.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use base64::Engine;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Derivation info for the checksum key, kept distinct from any secret
/// name so checksum and content keys never coincide.
const HMAC_DERIVATION_INFO: &str = "hmackey";

/// Encrypts and decrypts secret payloads and computes integrity
/// checksums.
///
/// Plaintext crosses this boundary base64-encoded, matching how content
/// arrives from callers; `derivation_info` is the secret's name.
pub trait Cryptographer: Send + Sync {
	fn encrypt(&self, plaintext_base64: &str, derivation_info: &str) -> CryptoResult<String>;
	fn decrypt(&self, envelope_json: &str) -> CryptoResult<String>;
	fn checksum(&self, plaintext_base64: &str) -> String;
}

/// Ciphertext envelope. The derivation info rides along so decryption
/// needs no out-of-band context.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
	derivation_info: String,
	iv: String,
	content: String,
}

/// Default cryptographer: per-name AES-256-GCM keys derived from one
/// master key via HKDF-SHA256.
pub struct ContentCryptographer {
	master: Zeroizing<[u8; KEY_SIZE]>,
}

impl ContentCryptographer {
	pub fn new(master: [u8; KEY_SIZE]) -> Self {
		Self { master: Zeroizing::new(master) }
	}

	/// Fresh random master key, for tests and ephemeral deployments.
	pub fn generate() -> Self {
		let mut master = Zeroizing::new([0u8; KEY_SIZE]);
		OsRng.fill_bytes(master.as_mut());
		Self { master }
	}

	fn derive_key(&self, info: &str) -> Zeroizing<[u8; KEY_SIZE]> {
		let hkdf = Hkdf::<Sha256>::new(None, self.master.as_ref());
		let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
		// Expanding 32 bytes out of HKDF-SHA256 cannot exceed the output
		// bound, so this never fails.
		hkdf.expand(info.as_bytes(), okm.as_mut())
			.unwrap_or_else(|_| unreachable!("HKDF output length is fixed at {KEY_SIZE}"));
		okm
	}
}

impl Cryptographer for ContentCryptographer {
	fn encrypt(&self, plaintext_base64: &str, derivation_info: &str) -> CryptoResult<String> {
		let plaintext = base64::engine::general_purpose::STANDARD
			.decode(plaintext_base64)
			.map_err(|e| CryptoError::Encoding(format!("plaintext is not base64: {e}")))?;

		let derived = self.derive_key(derivation_info);
		let key = Key::<Aes256Gcm>::from_slice(derived.as_ref());
		let cipher = Aes256Gcm::new(key);

		let mut nonce_bytes = [0u8; NONCE_SIZE];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = cipher
			.encrypt(nonce, plaintext.as_slice())
			.map_err(|e| CryptoError::Encryption(format!("content encryption failed: {e}")))?;

		let envelope = Envelope {
			derivation_info: derivation_info.to_string(),
			iv: base64::engine::general_purpose::STANDARD.encode(nonce_bytes),
			content: base64::engine::general_purpose::STANDARD.encode(ciphertext),
		};
		serde_json::to_string(&envelope)
			.map_err(|e| CryptoError::Encryption(format!("envelope serialization failed: {e}")))
	}

	fn decrypt(&self, envelope_json: &str) -> CryptoResult<String> {
		let envelope: Envelope = serde_json::from_str(envelope_json)
			.map_err(|e| CryptoError::Decryption(format!("malformed envelope: {e}")))?;

		let nonce_bytes = base64::engine::general_purpose::STANDARD
			.decode(&envelope.iv)
			.map_err(|e| CryptoError::Decryption(format!("malformed nonce: {e}")))?;
		if nonce_bytes.len() != NONCE_SIZE {
			return Err(CryptoError::InvalidKeySize {
				expected: NONCE_SIZE,
				actual: nonce_bytes.len(),
			});
		}
		let ciphertext = base64::engine::general_purpose::STANDARD
			.decode(&envelope.content)
			.map_err(|e| CryptoError::Decryption(format!("malformed ciphertext: {e}")))?;

		let derived = self.derive_key(&envelope.derivation_info);
		let key = Key::<Aes256Gcm>::from_slice(derived.as_ref());
		let cipher = Aes256Gcm::new(key);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let plaintext: Zeroizing<Vec<u8>> = Zeroizing::new(
			cipher
				.decrypt(nonce, ciphertext.as_slice())
				.map_err(|e| CryptoError::Decryption(format!("content decryption failed: {e}")))?,
		);

		Ok(base64::engine::general_purpose::STANDARD.encode(plaintext.as_slice()))
	}

	fn checksum(&self, plaintext_base64: &str) -> String {
		let derived = self.derive_key(HMAC_DERIVATION_INFO);
		// HMAC accepts any key length.
		let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(derived.as_ref())
			.unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
		mac.update(plaintext_base64.as_bytes());
		hex::encode(mac.finalize().into_bytes())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn b64(data: &[u8]) -> String {
		base64::engine::general_purpose::STANDARD.encode(data)
	}

	#[test]
	fn test_encryption_roundtrip() {
		let crypto = ContentCryptographer::generate();
		let plaintext = b64(b"super secret value");

		let envelope = crypto.encrypt(&plaintext, "service/db-password").unwrap();
		let decrypted = crypto.decrypt(&envelope).unwrap();

		assert_eq!(plaintext, decrypted);
	}

	#[test]
	fn test_envelope_carries_derivation_info() {
		let crypto = ContentCryptographer::generate();
		let envelope = crypto.encrypt(&b64(b"v"), "some/name").unwrap();
		assert!(envelope.contains("some/name"));
	}

	#[test]
	fn test_same_name_two_versions_share_key_material() {
		let crypto = ContentCryptographer::generate();
		let one = crypto.encrypt(&b64(b"v1"), "shared/name").unwrap();
		let two = crypto.encrypt(&b64(b"v2"), "shared/name").unwrap();

		assert_eq!(crypto.decrypt(&one).unwrap(), b64(b"v1"));
		assert_eq!(crypto.decrypt(&two).unwrap(), b64(b"v2"));
	}

	#[test]
	fn test_rejects_non_base64_plaintext() {
		let crypto = ContentCryptographer::generate();
		let result = crypto.encrypt("not base64!!", "name");
		assert!(matches!(result, Err(CryptoError::Encoding(_))));
	}

	#[test]
	fn test_different_master_fails_decryption() {
		let one = ContentCryptographer::generate();
		let two = ContentCryptographer::generate();

		let envelope = one.encrypt(&b64(b"secret"), "name").unwrap();
		assert!(matches!(two.decrypt(&envelope), Err(CryptoError::Decryption(_))));
	}

	#[test]
	fn test_tampered_envelope_fails() {
		let crypto = ContentCryptographer::generate();
		let envelope = crypto.encrypt(&b64(b"secret"), "name").unwrap();

		// Point the envelope at a different derivation info; the derived
		// key no longer matches and GCM authentication fails.
		let tampered = envelope.replace("\"name\"", "\"other\"");
		assert!(crypto.decrypt(&tampered).is_err());
	}

	#[test]
	fn test_checksum_is_stable() {
		let crypto = ContentCryptographer::new([7u8; KEY_SIZE]);
		let plaintext = b64(b"payload");
		assert_eq!(crypto.checksum(&plaintext), crypto.checksum(&plaintext));
		assert_ne!(crypto.checksum(&plaintext), crypto.checksum(&b64(b"other")));
	}

	proptest! {
		#[test]
		fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
			let crypto = ContentCryptographer::new([3u8; KEY_SIZE]);
			let plaintext = b64(&data);
			let envelope = crypto.encrypt(&plaintext, "prop/name").unwrap();
			prop_assert_eq!(crypto.decrypt(&envelope).unwrap(), plaintext);
		}

		#[test]
		fn prop_ciphertexts_never_repeat(data in proptest::collection::vec(any::<u8>(), 1..512)) {
			let crypto = ContentCryptographer::new([3u8; KEY_SIZE]);
			let plaintext = b64(&data);
			let one = crypto.encrypt(&plaintext, "prop/name").unwrap();
			let two = crypto.encrypt(&plaintext, "prop/name").unwrap();
			prop_assert_ne!(one, two);
		}

		#[test]
		fn prop_checksum_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
			let crypto = ContentCryptographer::new([9u8; KEY_SIZE]);
			let plaintext = b64(&data);
			prop_assert_eq!(crypto.checksum(&plaintext), crypto.checksum(&plaintext));
		}
	}
}
