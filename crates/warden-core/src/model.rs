// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Plain data records returned by the stores and services.
//!
//! These are never raw storage rows; the persistence layer maps into
//! them and the service layer hands them out unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::VersionStamp;

/// Actor identity and clock reading for one mutation.
///
/// Both are supplied by the caller (the request's authenticated
/// identity); the engine never invents them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
	pub actor: String,
	pub at: DateTime<Utc>,
}

impl AuditStamp {
	pub fn new(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
		Self { actor: actor.into(), at }
	}

	/// Convenience for callers without their own clock source.
	pub fn now(actor: impl Into<String>) -> Self {
		Self::new(actor, Utc::now())
	}
}

/// Durable identity of a secret family, independent of any content
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSeries {
	pub id: i64,
	pub name: String,
	pub description: String,
	/// Optional free-form tag for the secret's kind.
	pub secret_type: Option<String>,
	/// Opaque options recorded when the secret was generated.
	pub generation_options: BTreeMap<String, String>,
	/// Name of the owning group, when one is assigned. Ownership is
	/// provenance only; access grants decide read authorization.
	pub owner: Option<String>,
	pub current_version: Option<VersionStamp>,
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl SecretSeries {
	pub fn is_deleted(&self) -> bool {
		self.deleted_at.is_some()
	}
}

/// One immutable, encrypted version of a secret's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretContent {
	pub id: VersionStamp,
	pub secret_series_id: i64,
	/// Opaque ciphertext envelope produced by the cryptographer.
	pub encrypted_content: String,
	/// Integrity digest of the (base64) plaintext.
	pub content_hmac: String,
	pub metadata: BTreeMap<String, String>,
	/// Expiry in epoch seconds; 0 means no expiry.
	pub expiry: i64,
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
}

/// A series paired with one of its content versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSeriesAndContent {
	pub series: SecretSeries,
	pub content: SecretContent,
}

/// Content-free secret summary, safe to return to callers who may not
/// read the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedSecret {
	pub id: i64,
	pub name: String,
	pub description: String,
	pub secret_type: Option<String>,
	pub owner: Option<String>,
	pub checksum: String,
	pub metadata: BTreeMap<String, String>,
	pub expiry: i64,
	pub version: Option<VersionStamp>,
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
}

impl SanitizedSecret {
	/// Strip a series + current content pair down to its summary.
	pub fn from_parts(series: &SecretSeries, content: &SecretContent) -> Self {
		Self {
			id: series.id,
			name: series.name.clone(),
			description: series.description.clone(),
			secret_type: series.secret_type.clone(),
			owner: series.owner.clone(),
			checksum: content.content_hmac.clone(),
			metadata: content.metadata.clone(),
			expiry: content.expiry,
			version: Some(content.id),
			created_at: series.created_at,
			created_by: series.created_by.clone(),
			updated_at: series.updated_at,
			updated_by: series.updated_by.clone(),
		}
	}
}

/// Named collection used for client membership and secret access grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
	pub id: i64,
	pub name: String,
	pub description: String,
	pub metadata: BTreeMap<String, String>,
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
}

/// Authenticated machine principal.
///
/// Privileged automation clients are ordinary clients with
/// `automation_allowed` set; there is no separate entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
	pub id: i64,
	pub name: String,
	pub description: String,
	pub spiffe_id: Option<String>,
	pub enabled: bool,
	pub automation_allowed: bool,
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
	pub last_seen_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
}
