// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Input validation shared by every secret write path.
//!
//! Validation runs before any storage mutation so an invalid item can
//! never be partially persisted, including inside batches.

use std::collections::BTreeMap;

use base64::Engine;

/// Maximum secret name length. Shorter than the database column so names
/// survive any future suffixing without truncation.
pub const MAX_SECRET_NAME_LENGTH: usize = 195;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	#[error("secret name must not be empty")]
	EmptyName,

	#[error("secret name `{0}` must not begin with a period")]
	LeadingPeriod(String),

	#[error("secret name `{0}` exceeds {MAX_SECRET_NAME_LENGTH} characters")]
	NameTooLong(String),

	#[error("secret content must not be empty")]
	EmptyContent,

	#[error("secret content must be valid base64")]
	MalformedContent,

	#[error("metadata key `{0}`: custom keys must start with an underscore")]
	MetadataKeyNotUnderscored(String),

	#[error("metadata key `{0}`: keys may only contain letters, numbers, and underscores")]
	MetadataKeyCharset(String),

	#[error("metadata mode `{0}` is not proper octal")]
	MetadataModeNotOctal(String),
}

pub fn validate_secret_name(name: &str) -> Result<(), ValidationError> {
	if name.is_empty() {
		return Err(ValidationError::EmptyName);
	}
	if name.starts_with('.') {
		return Err(ValidationError::LeadingPeriod(name.to_string()));
	}
	if name.len() > MAX_SECRET_NAME_LENGTH {
		return Err(ValidationError::NameTooLong(name.to_string()));
	}
	Ok(())
}

/// Content arrives base64-encoded and must decode to a non-empty payload.
pub fn validate_content(content_base64: &str) -> Result<(), ValidationError> {
	if content_base64.is_empty() {
		return Err(ValidationError::EmptyContent);
	}
	base64::engine::general_purpose::STANDARD
		.decode(content_base64)
		.map_err(|_| ValidationError::MalformedContent)?;
	Ok(())
}

/// Metadata keys are either the well-known POSIX delivery hints
/// (`owner`, `group`, `mode`) or custom keys, which must start with an
/// underscore and stay in `[A-Za-z0-9_]`. A `mode` value must be octal
/// with a leading zero.
pub fn validate_metadata(metadata: &BTreeMap<String, String>) -> Result<(), ValidationError> {
	for (key, value) in metadata {
		let well_known = matches!(key.as_str(), "owner" | "group" | "mode");
		if !well_known {
			if !key.starts_with('_') {
				return Err(ValidationError::MetadataKeyNotUnderscored(key.clone()));
			}
			if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
				return Err(ValidationError::MetadataKeyCharset(key.clone()));
			}
		}
		if key == "mode" && !is_octal_mode(value) {
			return Err(ValidationError::MetadataModeNotOctal(value.clone()));
		}
	}
	Ok(())
}

fn is_octal_mode(value: &str) -> bool {
	value.len() >= 2
		&& value.starts_with('0')
		&& value[1..].chars().all(|c| ('0'..='7').contains(&c))
}
