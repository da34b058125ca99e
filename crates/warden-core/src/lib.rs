// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Domain model for the Warden secret store.
//!
//! This crate carries the storage-independent pieces of the secret
//! lifecycle and access-control engine:
//!
//! - Plain data records ([`model`]): secret series, secret content
//!   versions, groups, clients, and sanitized (content-free) summaries
//! - Lexicographically sortable version stamps ([`version`])
//! - Tri-state partial updates and batch request/report types ([`update`])
//! - Input validation shared by every write path ([`validate`])

pub mod model;
pub mod update;
pub mod validate;
pub mod version;

pub use model::{
	AuditStamp, Client, Group, SanitizedSecret, SecretContent, SecretSeries, SecretSeriesAndContent,
};
pub use update::{
	BatchItem, BatchItemStatus, BatchMode, BatchReport, CreateOrUpdate, FieldUpdate, PartialUpdate,
};
pub use validate::ValidationError;
pub use version::{OsRandom, RandomSource, VersionStamp};
