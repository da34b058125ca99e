// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Warden secret store.
//!
//! Modules map one-to-one onto tables:
//!
//! - [`series`] — `secrets` (secret identities, soft-delete state)
//! - [`content`] — `secrets_content` (immutable encrypted versions)
//! - [`client`] / [`group`] — principal and group registries
//! - [`acl`] — `memberships` and `accessgrants` join tables
//!
//! Every store function takes `&mut SqliteConnection` so callers decide
//! transaction boundaries: each multi-step read-modify-write sequence in
//! the service layer composes these inside one transaction, and the
//! backing store's constraints (notably the partial unique index on live
//! secret names) arbitrate races.

pub mod acl;
pub mod client;
pub mod content;
mod conv;
pub mod error;
pub mod group;
pub mod pool;
pub mod series;
pub mod testing;

pub use error::{DbError, Result};
pub use pool::create_pool;
