// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use warden_core::validate::ValidationError;
use warden_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Illegal state: {0}")]
	IllegalState(String),

	#[error(transparent)]
	Crypto(#[from] warden_crypto::CryptoError),

	#[error(transparent)]
	Storage(DbError),
}

impl From<DbError> for ServiceError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(what) => Self::NotFound(what),
			DbError::Conflict(what) => Self::Conflict(what),
			other => Self::Storage(other),
		}
	}
}

impl From<ValidationError> for ServiceError {
	fn from(err: ValidationError) -> Self {
		Self::InvalidArgument(err.to_string())
	}
}

impl From<sqlx::Error> for ServiceError {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage(DbError::Sqlx(err))
	}
}

pub type Result<T> = std::result::Result<T, ServiceError>;
