// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
	#[error("Encryption failed: {0}")]
	Encryption(String),

	#[error("Decryption failed: {0}")]
	Decryption(String),

	#[error("Invalid key size: expected {expected}, got {actual}")]
	InvalidKeySize { expected: usize, actual: usize },

	#[error("Encoding error: {0}")]
	Encoding(String),
}

pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
