// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Access-control index: who can read what, and the grant/membership
//! mutations that decide it.
//!
//! Read authorization is purely the join client -> membership -> group
//! -> grant -> series. Ownership is provenance metadata and never
//! grants access. [`AccessControlIndex::resolve_for_client`] collapses
//! every failure shape into one NotFound so an unauthorized caller
//! cannot probe which secrets exist.

use std::collections::BTreeMap;

use sqlx::{SqliteConnection, SqlitePool};

use warden_core::model::{AuditStamp, Client, Group, SanitizedSecret, SecretSeriesAndContent};
use warden_core::version::VersionStamp;
use warden_db::{acl, client, content, group, series};

use crate::error::{Result, ServiceError};

#[derive(Clone)]
pub struct AccessControlIndex {
	pool: SqlitePool,
}

impl AccessControlIndex {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Content-free summaries of every live secret a client can read,
	/// assembled in one snapshot transaction.
	#[tracing::instrument(skip(self))]
	pub async fn secrets_visible_to(&self, client_name: &str) -> Result<Vec<SanitizedSecret>> {
		let mut tx = self.pool.begin().await?;
		let client = client::get_by_name(&mut tx, client_name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("client `{client_name}` not found")))?;
		let visible = acl::series_visible_to_client(&mut tx, client.id).await?;
		let summaries = Self::sanitize_all(&mut tx, visible).await?;
		tx.commit().await?;
		Ok(summaries)
	}

	/// Live secrets directly granted to a group.
	#[tracing::instrument(skip(self))]
	pub async fn secrets_granted_to(&self, group_name: &str) -> Result<Vec<SanitizedSecret>> {
		let mut tx = self.pool.begin().await?;
		let group = group::get_by_name(&mut tx, group_name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("group `{group_name}` not found")))?;
		let granted = acl::series_granted_to_group(&mut tx, group.id).await?;
		let summaries = Self::sanitize_all(&mut tx, granted).await?;
		tx.commit().await?;
		Ok(summaries)
	}

	async fn sanitize_all(
		conn: &mut SqliteConnection,
		series_list: Vec<warden_core::model::SecretSeries>,
	) -> Result<Vec<SanitizedSecret>> {
		let mut summaries = Vec::with_capacity(series_list.len());
		for series in series_list {
			// The visibility queries only return series with a current
			// version, so the pointer resolving is an invariant.
			let version = series.current_version.ok_or_else(|| {
				ServiceError::IllegalState(format!("secret `{}` has no current version", series.name))
			})?;
			let current = content::get_for_series(&mut *conn, series.id, version)
				.await?
				.ok_or_else(|| {
					ServiceError::IllegalState(format!("current version of `{}` is missing", series.name))
				})?;
			summaries.push(SanitizedSecret::from_parts(&series, &current));
		}
		Ok(summaries)
	}

	pub async fn clients_with_access_to(&self, secret_name: &str) -> Result<Vec<Client>> {
		let mut tx = self.pool.begin().await?;
		let series = Self::series_by_name(&mut tx, secret_name).await?;
		let clients = acl::clients_with_access(&mut tx, series.id).await?;
		tx.commit().await?;
		Ok(clients)
	}

	pub async fn groups_granting(&self, secret_name: &str) -> Result<Vec<Group>> {
		let mut tx = self.pool.begin().await?;
		let series = Self::series_by_name(&mut tx, secret_name).await?;
		let groups = acl::groups_granting(&mut tx, series.id).await?;
		tx.commit().await?;
		Ok(groups)
	}

	pub async fn groups_containing(&self, client_name: &str) -> Result<Vec<Group>> {
		let mut conn = self.pool.acquire().await?;
		let client = client::get_by_name(&mut conn, client_name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("client `{client_name}` not found")))?;
		Ok(acl::groups_for_client(&mut conn, client.id).await?)
	}

	/// Authorized fetch for delivery. Succeeds only when the client
	/// exists, is enabled, and some membership x grant path reaches the
	/// secret; every other outcome is the same NotFound, so a caller
	/// cannot distinguish "no such secret" from "not yours".
	#[tracing::instrument(skip(self))]
	pub async fn resolve_for_client(
		&self,
		client_name: &str,
		secret_name: &str,
		version: Option<VersionStamp>,
	) -> Result<SecretSeriesAndContent> {
		let mut tx = self.pool.begin().await?;
		let resolved = Self::try_resolve(&mut tx, client_name, secret_name, version).await?;
		tx.commit().await?;
		resolved.ok_or_else(|| ServiceError::NotFound(format!("secret `{secret_name}` not found")))
	}

	async fn try_resolve(
		conn: &mut SqliteConnection,
		client_name: &str,
		secret_name: &str,
		version: Option<VersionStamp>,
	) -> Result<Option<SecretSeriesAndContent>> {
		let client = match client::get_by_name(&mut *conn, client_name).await? {
			Some(c) if c.enabled => c,
			_ => return Ok(None),
		};
		let series = match series::get_by_name(&mut *conn, secret_name).await? {
			Some(s) => s,
			None => return Ok(None),
		};
		if !acl::client_can_access(&mut *conn, client.id, series.id).await? {
			return Ok(None);
		}
		let wanted = match version.or(series.current_version) {
			Some(v) => v,
			None => return Ok(None),
		};
		let content = match content::get_for_series(&mut *conn, series.id, wanted).await? {
			Some(c) => c,
			None => return Ok(None),
		};
		Ok(Some(SecretSeriesAndContent { series, content }))
	}

	/// Grant a group read access to a secret. Returns false for a
	/// re-grant of an existing pair.
	#[tracing::instrument(skip(self, audit))]
	pub async fn grant(&self, secret_id: i64, group_id: i64, audit: &AuditStamp) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		Self::series_by_id(&mut tx, secret_id).await?;
		Self::group_by_id(&mut tx, group_id).await?;
		let inserted = acl::grant(&mut tx, group_id, secret_id, audit.at).await?;
		tx.commit().await?;
		Ok(inserted)
	}

	/// Returns false when no such grant existed.
	#[tracing::instrument(skip(self))]
	pub async fn revoke(&self, secret_id: i64, group_id: i64) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		Self::series_by_id(&mut tx, secret_id).await?;
		Self::group_by_id(&mut tx, group_id).await?;
		let removed = acl::revoke(&mut tx, group_id, secret_id).await?;
		tx.commit().await?;
		Ok(removed)
	}

	#[tracing::instrument(skip(self, audit))]
	pub async fn enroll(&self, client_id: i64, group_id: i64, audit: &AuditStamp) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		Self::client_by_id(&mut tx, client_id).await?;
		Self::group_by_id(&mut tx, group_id).await?;
		let inserted = acl::enroll(&mut tx, group_id, client_id, audit.at).await?;
		tx.commit().await?;
		Ok(inserted)
	}

	#[tracing::instrument(skip(self))]
	pub async fn evict(&self, client_id: i64, group_id: i64) -> Result<bool> {
		let mut tx = self.pool.begin().await?;
		Self::client_by_id(&mut tx, client_id).await?;
		Self::group_by_id(&mut tx, group_id).await?;
		let removed = acl::evict(&mut tx, group_id, client_id).await?;
		tx.commit().await?;
		Ok(removed)
	}

	async fn series_by_name(
		conn: &mut SqliteConnection,
		name: &str,
	) -> Result<warden_core::model::SecretSeries> {
		series::get_by_name(&mut *conn, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret `{name}` not found")))
	}

	async fn series_by_id(conn: &mut SqliteConnection, id: i64) -> Result<()> {
		series::get_by_id(&mut *conn, id)
			.await?
			.map(|_| ())
			.ok_or_else(|| ServiceError::NotFound(format!("secret series {id} not found")))
	}

	async fn group_by_id(conn: &mut SqliteConnection, id: i64) -> Result<()> {
		group::get_by_id(&mut *conn, id)
			.await?
			.map(|_| ())
			.ok_or_else(|| ServiceError::NotFound(format!("group {id} not found")))
	}

	async fn client_by_id(conn: &mut SqliteConnection, id: i64) -> Result<()> {
		client::get_by_id(&mut *conn, id)
			.await?
			.map(|_| ())
			.ok_or_else(|| ServiceError::NotFound(format!("client {id} not found")))
	}

	// Registry operations. These are admin-facing, so a NotFound here is
	// allowed to say what is missing.

	#[tracing::instrument(skip(self, audit))]
	pub async fn create_group(
		&self,
		name: &str,
		description: &str,
		metadata: &BTreeMap<String, String>,
		audit: &AuditStamp,
	) -> Result<Group> {
		let mut tx = self.pool.begin().await?;
		let id = group::create(&mut tx, name, description, metadata, audit).await?;
		let created = group::get_by_id(&mut tx, id)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("group {id} not found")))?;
		tx.commit().await?;
		Ok(created)
	}

	pub async fn get_group(&self, name: &str) -> Result<Group> {
		let mut conn = self.pool.acquire().await?;
		group::get_by_name(&mut conn, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("group `{name}` not found")))
	}

	pub async fn list_groups(&self) -> Result<Vec<Group>> {
		let mut conn = self.pool.acquire().await?;
		Ok(group::list(&mut conn).await?)
	}

	/// Deleting a group cascades its memberships and grants; owned
	/// secrets fall back to unowned.
	#[tracing::instrument(skip(self))]
	pub async fn delete_group(&self, id: i64) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		if group::delete(&mut tx, id).await? == 0 {
			return Err(ServiceError::NotFound(format!("group {id} not found")));
		}
		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self, audit))]
	pub async fn create_client(
		&self,
		name: &str,
		description: &str,
		spiffe_id: Option<&str>,
		automation_allowed: bool,
		audit: &AuditStamp,
	) -> Result<Client> {
		let mut tx = self.pool.begin().await?;
		let id = client::create(&mut tx, name, description, spiffe_id, automation_allowed, audit).await?;
		let created = client::get_by_id(&mut tx, id)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("client {id} not found")))?;
		tx.commit().await?;
		Ok(created)
	}

	pub async fn get_client(&self, name: &str) -> Result<Client> {
		let mut conn = self.pool.acquire().await?;
		client::get_by_name(&mut conn, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("client `{name}` not found")))
	}

	pub async fn list_clients(&self) -> Result<Vec<Client>> {
		let mut conn = self.pool.acquire().await?;
		Ok(client::list(&mut conn).await?)
	}

	#[tracing::instrument(skip(self, audit))]
	pub async fn set_client_enabled(&self, id: i64, enabled: bool, audit: &AuditStamp) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		if client::set_enabled(&mut tx, id, enabled, audit).await? == 0 {
			return Err(ServiceError::NotFound(format!("client {id} not found")));
		}
		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_client(&self, id: i64) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		if client::delete(&mut tx, id).await? == 0 {
			return Err(ServiceError::NotFound(format!("client {id} not found")));
		}
		tx.commit().await?;
		Ok(())
	}
}
