// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Warden service layer.
//!
//! The consistency engine over the stores: [`SecretLifecycle`] owns
//! secret creation, versioned reads, rollback, and deletion;
//! [`AccessControlIndex`] answers and mutates who-can-read-what;
//! [`BatchCoordinator`] applies multi-item writes under a chosen
//! atomicity mode; [`OwnershipBackfill`] infers owners for historical
//! rows. Every multi-step read-modify-write runs inside one sqlx
//! transaction.

pub mod acl;
pub mod backfill;
pub mod batch;
pub mod config;
pub mod error;
pub mod lifecycle;

pub use acl::AccessControlIndex;
pub use backfill::{BackfillSummary, OwnershipBackfill};
pub use batch::BatchCoordinator;
pub use config::{BatchTuning, ConfigError, WardenConfig};
pub use error::{Result, ServiceError};
pub use lifecycle::SecretLifecycle;
