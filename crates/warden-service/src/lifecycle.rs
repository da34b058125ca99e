// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Secret lifecycle: create, append, read, rollback, soft-delete,
//! undelete, purge.
//!
//! Content rows are immutable once written (expiry aside); every write
//! path appends a new version and repoints `current` inside one
//! transaction. Plaintext never touches storage: payloads arrive
//! base64-encoded, are encrypted under a per-name derived key, and only
//! the ciphertext envelope and an HMAC checksum are persisted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use warden_core::model::{AuditStamp, SecretContent, SecretSeries, SecretSeriesAndContent};
use warden_core::update::{CreateOrUpdate, FieldUpdate, PartialUpdate};
use warden_core::validate::{validate_content, validate_metadata, validate_secret_name};
use warden_core::version::{RandomSource, VersionStamp};
use warden_crypto::Cryptographer;
use warden_db::{content, group, series};

use crate::error::{Result, ServiceError};

#[derive(Clone)]
pub struct SecretLifecycle {
	pool: SqlitePool,
	crypto: Arc<dyn Cryptographer>,
	random: Arc<dyn RandomSource>,
}

impl SecretLifecycle {
	pub fn new(pool: SqlitePool, crypto: Arc<dyn Cryptographer>, random: Arc<dyn RandomSource>) -> Self {
		Self { pool, crypto, random }
	}

	pub(crate) fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	fn next_version(&self, at: DateTime<Utc>) -> VersionStamp {
		VersionStamp::generate(at.timestamp_millis(), self.random.as_ref())
	}

	fn validate_request(req: &CreateOrUpdate) -> Result<()> {
		validate_secret_name(&req.name)?;
		validate_content(&req.content)?;
		validate_metadata(&req.metadata)?;
		Ok(())
	}

	/// Create the series if no live one holds the name, then append a
	/// content version and advance `current`.
	///
	/// A concurrent create of the same name surfaces as a uniqueness
	/// conflict from the partial index; the loser retries once, finds
	/// the winner's series, and appends to it.
	#[tracing::instrument(skip(self, req, audit), fields(name = %req.name))]
	pub async fn create_or_update(
		&self,
		req: &CreateOrUpdate,
		audit: &AuditStamp,
	) -> Result<SecretSeriesAndContent> {
		Self::validate_request(req)?;
		match self.create_or_update_once(req, audit).await {
			Err(ServiceError::Conflict(_)) => {
				tracing::debug!(name = %req.name, "lost concurrent create, retrying as append");
				self.create_or_update_once(req, audit).await
			}
			other => other,
		}
	}

	async fn create_or_update_once(
		&self,
		req: &CreateOrUpdate,
		audit: &AuditStamp,
	) -> Result<SecretSeriesAndContent> {
		let mut tx = self.pool.begin().await?;
		let result = self.create_or_update_in(&mut tx, req, audit).await?;
		tx.commit().await?;
		Ok(result)
	}

	/// Transactional body of [`create_or_update`], shared with the batch
	/// coordinator so an all-or-none batch can run every item inside the
	/// caller's transaction.
	pub(crate) async fn create_or_update_in(
		&self,
		conn: &mut SqliteConnection,
		req: &CreateOrUpdate,
		audit: &AuditStamp,
	) -> Result<SecretSeriesAndContent> {
		Self::validate_request(req)?;
		let series_id = match series::get_by_name(&mut *conn, &req.name).await? {
			Some(existing) => {
				self.overwrite_identity(&mut *conn, &existing, req, audit).await?;
				existing.id
			}
			None => self.create_series(&mut *conn, req, audit).await?,
		};
		self.append_version(&mut *conn, series_id, req, audit).await
	}

	/// Like [`create_or_update`] but refuses to touch an existing secret.
	#[tracing::instrument(skip(self, req, audit), fields(name = %req.name))]
	pub async fn create(&self, req: &CreateOrUpdate, audit: &AuditStamp) -> Result<SecretSeriesAndContent> {
		Self::validate_request(req)?;
		let mut tx = self.pool.begin().await?;
		if series::live_name_exists(&mut tx, &req.name).await? {
			return Err(ServiceError::Conflict(format!("secret `{}` already exists", req.name)));
		}
		let series_id = self.create_series(&mut tx, req, audit).await?;
		let result = self.append_version(&mut tx, series_id, req, audit).await?;
		tx.commit().await?;
		Ok(result)
	}

	async fn create_series(
		&self,
		conn: &mut SqliteConnection,
		req: &CreateOrUpdate,
		audit: &AuditStamp,
	) -> Result<i64> {
		let owner_id = match &req.owner {
			Some(name) => Some(Self::group_id_by_name(&mut *conn, name).await?),
			None => None,
		};
		let id = series::create(
			&mut *conn,
			&req.name,
			owner_id,
			req.description.as_deref().unwrap_or(""),
			req.secret_type.as_deref(),
			&Default::default(),
			audit,
		)
		.await?;
		Ok(id)
	}

	/// Update path of create-or-update: description and type are
	/// overwritten from the request, an absent owner preserves the
	/// stored one, and generation options are untouched.
	async fn overwrite_identity(
		&self,
		conn: &mut SqliteConnection,
		existing: &SecretSeries,
		req: &CreateOrUpdate,
		audit: &AuditStamp,
	) -> Result<()> {
		let owner_id = match &req.owner {
			Some(name) => Some(Self::group_id_by_name(&mut *conn, name).await?),
			None => Self::existing_owner_id(&mut *conn, existing).await?,
		};
		series::update(
			&mut *conn,
			existing.id,
			owner_id,
			req.description.as_deref().unwrap_or(""),
			req.secret_type.as_deref(),
			&existing.generation_options,
			audit,
		)
		.await?;
		Ok(())
	}

	/// Encrypt, insert a content row under a fresh version stamp, and
	/// advance `current`.
	async fn append_version(
		&self,
		conn: &mut SqliteConnection,
		series_id: i64,
		req: &CreateOrUpdate,
		audit: &AuditStamp,
	) -> Result<SecretSeriesAndContent> {
		let envelope = self.crypto.encrypt(&req.content, &req.name)?;
		let checksum = self.crypto.checksum(&req.content);
		let version = self.next_version(audit.at);
		content::insert(
			&mut *conn,
			version,
			series_id,
			&envelope,
			&checksum,
			&req.metadata,
			req.expiry,
			audit,
		)
		.await?;
		series::set_current_version(&mut *conn, series_id, version, audit).await?;
		Self::assemble(&mut *conn, series_id, version).await
	}

	async fn assemble(
		conn: &mut SqliteConnection,
		series_id: i64,
		version: VersionStamp,
	) -> Result<SecretSeriesAndContent> {
		let series = series::get_by_id(&mut *conn, series_id)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret series {series_id} not found")))?;
		let content = content::get_for_series(&mut *conn, series_id, version)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("version {version} not found")))?;
		Ok(SecretSeriesAndContent { series, content })
	}

	async fn group_id_by_name(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
		group::get_by_name(&mut *conn, name)
			.await?
			.map(|g| g.id)
			.ok_or_else(|| ServiceError::NotFound(format!("group `{name}` not found")))
	}

	async fn existing_owner_id(
		conn: &mut SqliteConnection,
		series: &SecretSeries,
	) -> Result<Option<i64>> {
		match &series.owner {
			Some(name) => Ok(group::get_by_name(&mut *conn, name).await?.map(|g| g.id)),
			None => Ok(None),
		}
	}

	/// Fetch a series together with one of its versions; `None` means
	/// the current version.
	#[tracing::instrument(skip(self))]
	pub async fn get_by_name_and_version(
		&self,
		name: &str,
		version: Option<VersionStamp>,
	) -> Result<SecretSeriesAndContent> {
		let mut conn = self.pool.acquire().await?;
		let series = series::get_by_name(&mut conn, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret `{name}` not found")))?;
		Self::fetch_version(&mut conn, series, version).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_id(&self, id: i64) -> Result<SecretSeriesAndContent> {
		let mut conn = self.pool.acquire().await?;
		let series = series::get_by_id(&mut conn, id)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret series {id} not found")))?;
		Self::fetch_version(&mut conn, series, None).await
	}

	async fn fetch_version(
		conn: &mut SqliteConnection,
		series: SecretSeries,
		version: Option<VersionStamp>,
	) -> Result<SecretSeriesAndContent> {
		let wanted = match version.or(series.current_version) {
			Some(v) => v,
			None => {
				return Err(ServiceError::NotFound(format!(
					"secret `{}` has no current version",
					series.name
				)))
			}
		};
		// Version lookups are scoped to the series so a stamp from an
		// unrelated secret cannot leak content.
		let content = content::get_for_series(&mut *conn, series.id, wanted)
			.await?
			.ok_or_else(|| {
				ServiceError::NotFound(format!("version {wanted} not found for secret `{}`", series.name))
			})?;
		Ok(SecretSeriesAndContent { series, content })
	}

	/// Content versions of a secret in version-stamp order, which is
	/// creation order.
	pub async fn list_versions(
		&self,
		name: &str,
		offset: i64,
		limit: i64,
		newest_first: bool,
	) -> Result<Vec<SecretContent>> {
		let mut conn = self.pool.acquire().await?;
		let series = series::get_by_name(&mut conn, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret `{name}` not found")))?;
		Ok(content::list_for_series(&mut conn, series.id, offset, limit, newest_first).await?)
	}

	/// Content-free enumeration of live series.
	pub async fn list_series(
		&self,
		offset: i64,
		limit: i64,
		newest_first: bool,
	) -> Result<Vec<SecretSeries>> {
		let mut conn = self.pool.acquire().await?;
		Ok(series::list_batched(&mut conn, offset, limit, newest_first).await?)
	}

	/// Repoint `current` at an older (or newer) version. The rolled-away
	/// version stays readable by explicit stamp.
	#[tracing::instrument(skip(self, audit), fields(version = %version))]
	pub async fn rollback(
		&self,
		name: &str,
		version: VersionStamp,
		audit: &AuditStamp,
	) -> Result<SecretSeriesAndContent> {
		let mut tx = self.pool.begin().await?;
		let series = series::get_by_name(&mut tx, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret `{name}` not found")))?;
		if content::get_for_series(&mut tx, series.id, version).await?.is_none() {
			return Err(ServiceError::IllegalState(format!(
				"version {version} does not belong to secret `{name}`"
			)));
		}
		series::set_current_version(&mut tx, series.id, version, audit).await?;
		let result = Self::assemble(&mut tx, series.id, version).await?;
		tx.commit().await?;
		Ok(result)
	}

	/// Apply only the supplied fields; untouched fields carry over from
	/// the series row and the current content row. Always appends a new
	/// version.
	#[tracing::instrument(skip(self, update, audit))]
	pub async fn partial_update(
		&self,
		name: &str,
		update: PartialUpdate,
		audit: &AuditStamp,
	) -> Result<SecretSeriesAndContent> {
		if let FieldUpdate::Set(metadata) = &update.metadata {
			validate_metadata(metadata)?;
		}
		if let FieldUpdate::Set(content_b64) = &update.content {
			validate_content(content_b64)?;
		}
		if update.content == FieldUpdate::Clear {
			return Err(ServiceError::InvalidArgument(
				"secret content cannot be cleared".to_string(),
			));
		}

		let mut tx = self.pool.begin().await?;
		let series = series::get_by_name(&mut tx, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret `{name}` not found")))?;
		let current_version = series.current_version.ok_or_else(|| {
			ServiceError::IllegalState(format!("secret `{name}` has no current version"))
		})?;
		let current = content::get_for_series(&mut tx, series.id, current_version)
			.await?
			.ok_or_else(|| {
				ServiceError::IllegalState(format!("current version of `{name}` is missing"))
			})?;

		let owner_id = match update.owner {
			FieldUpdate::Absent => Self::existing_owner_id(&mut tx, &series).await?,
			FieldUpdate::Clear => None,
			FieldUpdate::Set(ref group_name) => {
				Some(Self::group_id_by_name(&mut tx, group_name).await?)
			}
		};
		let description = update
			.description
			.resolve_or(series.description.clone(), String::new());
		let secret_type = update.secret_type.resolve(series.secret_type.clone());
		let metadata = update.metadata.resolve_or(current.metadata.clone(), Default::default());
		let expiry = update.expiry.resolve_or(current.expiry, 0);
		let (envelope, checksum) = match &update.content {
			FieldUpdate::Set(content_b64) => {
				(self.crypto.encrypt(content_b64, name)?, self.crypto.checksum(content_b64))
			}
			_ => (current.encrypted_content.clone(), current.content_hmac.clone()),
		};

		series::update(
			&mut tx,
			series.id,
			owner_id,
			&description,
			secret_type.as_deref(),
			&series.generation_options,
			audit,
		)
		.await?;
		let version = self.next_version(audit.at);
		content::insert(&mut tx, version, series.id, &envelope, &checksum, &metadata, expiry, audit)
			.await?;
		series::set_current_version(&mut tx, series.id, version, audit).await?;
		let result = Self::assemble(&mut tx, series.id, version).await?;
		tx.commit().await?;
		Ok(result)
	}

	/// Hide the secret and free its name; content rows stay on disk
	/// until a purge.
	#[tracing::instrument(skip(self, audit))]
	pub async fn soft_delete(&self, name: &str, audit: &AuditStamp) -> Result<i64> {
		let mut tx = self.pool.begin().await?;
		let series = series::get_by_name(&mut tx, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret `{name}` not found")))?;
		series::soft_delete(&mut tx, series.id, audit).await?;
		tx.commit().await?;
		Ok(series.id)
	}

	/// Restore a soft-deleted series by id. Fails with Conflict when a
	/// live series has since claimed the name; the check and the restore
	/// run in one transaction.
	#[tracing::instrument(skip(self, audit))]
	pub async fn undelete(&self, id: i64, audit: &AuditStamp) -> Result<SecretSeries> {
		let mut tx = self.pool.begin().await?;
		let deleted = series::get_deleted_by_id(&mut tx, id)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("no deleted secret series {id}")))?;
		if series::live_name_exists(&mut tx, &deleted.name).await? {
			return Err(ServiceError::Conflict(format!(
				"a live secret named `{}` already exists",
				deleted.name
			)));
		}
		series::undelete(&mut tx, id, audit).await?;
		let restored = series::get_by_id(&mut tx, id)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret series {id} not found")))?;
		tx.commit().await?;
		Ok(restored)
	}

	/// Irreversibly remove series soft-deleted before the cutoff, in
	/// per-batch transactions with a pause between batches. Content rows
	/// and access grants cascade. A crash mid-run leaves committed
	/// batches purged, which is acceptable for a cleanup job.
	#[tracing::instrument(skip(self))]
	pub async fn purge_deleted_before(
		&self,
		cutoff: DateTime<Utc>,
		batch_size: u32,
		delay: Duration,
	) -> Result<u64> {
		if batch_size == 0 {
			return Err(ServiceError::InvalidArgument("batch_size must be positive".to_string()));
		}
		let mut purged = 0u64;
		loop {
			let mut tx = self.pool.begin().await?;
			let ids = series::ids_deleted_before(&mut tx, cutoff, i64::from(batch_size)).await?;
			if ids.is_empty() {
				break;
			}
			for id in &ids {
				purged += series::hard_delete(&mut tx, *id).await?;
			}
			tx.commit().await?;
			tracing::debug!(count = ids.len(), total = purged, "purged deleted secrets batch");
			if ids.len() < batch_size as usize {
				break;
			}
			tokio::time::sleep(delay).await;
		}
		Ok(purged)
	}

	/// Change the expiry of the current content row in place. The one
	/// sanctioned content mutation.
	#[tracing::instrument(skip(self, audit))]
	pub async fn set_expiration(&self, name: &str, expiry: i64, audit: &AuditStamp) -> Result<()> {
		let mut tx = self.pool.begin().await?;
		let series = series::get_by_name(&mut tx, name)
			.await?
			.ok_or_else(|| ServiceError::NotFound(format!("secret `{name}` not found")))?;
		let current = series.current_version.ok_or_else(|| {
			ServiceError::IllegalState(format!("secret `{name}` has no current version"))
		})?;
		content::set_expiration(&mut tx, current, expiry, audit).await?;
		tx.commit().await?;
		Ok(())
	}

	/// Names of live secrets whose current version expires at or before
	/// the bound.
	pub async fn list_expiring(&self, not_after: i64) -> Result<Vec<String>> {
		let mut conn = self.pool.acquire().await?;
		Ok(series::list_expiring(&mut conn, not_after).await?)
	}

	/// Decrypt a stored version back to its base64 plaintext.
	pub fn decrypt(&self, content: &SecretContent) -> Result<String> {
		Ok(self.crypto.decrypt(&content.encrypted_content)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::BTreeMap;
	use std::sync::atomic::{AtomicU64, Ordering};
	use warden_crypto::ContentCryptographer;
	use warden_db::testing::create_warden_test_pool;

	/// Strictly increasing random bits so stamps minted in the same
	/// millisecond still order by creation.
	struct StepRandom(AtomicU64);

	impl RandomSource for StepRandom {
		fn random_bits(&self) -> u64 {
			self.0.fetch_add(1, Ordering::SeqCst)
		}
	}

	async fn lifecycle() -> SecretLifecycle {
		let pool = create_warden_test_pool().await;
		SecretLifecycle::new(
			pool,
			Arc::new(ContentCryptographer::generate()),
			Arc::new(StepRandom(AtomicU64::new(1))),
		)
	}

	fn audit() -> AuditStamp {
		AuditStamp::now("tester")
	}

	fn b64(plaintext: &[u8]) -> String {
		use base64::Engine;
		base64::engine::general_purpose::STANDARD.encode(plaintext)
	}

	#[tokio::test]
	async fn test_create_then_update_appends_second_version() {
		let lifecycle = lifecycle().await;

		let first = lifecycle
			.create_or_update(&CreateOrUpdate::new("db/password", b64(b"hunter2")), &audit())
			.await
			.unwrap();
		let second = lifecycle
			.create_or_update(&CreateOrUpdate::new("db/password", b64(b"hunter3")), &audit())
			.await
			.unwrap();

		assert_eq!(first.series.id, second.series.id);
		assert_ne!(first.content.id, second.content.id);
		assert!(first.content.id < second.content.id);
		assert_eq!(second.series.current_version, Some(second.content.id));

		let versions = lifecycle.list_versions("db/password", 0, 10, false).await.unwrap();
		assert_eq!(versions.len(), 2);
		assert_eq!(versions[0].id, first.content.id);
	}

	#[tokio::test]
	async fn test_stored_content_is_ciphertext() {
		let lifecycle = lifecycle().await;
		let plaintext = b64(b"top secret");

		let created = lifecycle
			.create_or_update(&CreateOrUpdate::new("s", plaintext.clone()), &audit())
			.await
			.unwrap();

		assert!(!created.content.encrypted_content.contains(&plaintext));
		assert_eq!(lifecycle.decrypt(&created.content).unwrap(), plaintext);
	}

	#[tokio::test]
	async fn test_create_rejects_existing_name() {
		let lifecycle = lifecycle().await;
		lifecycle.create(&CreateOrUpdate::new("only-once", b64(b"v1")), &audit()).await.unwrap();
		let err = lifecycle
			.create(&CreateOrUpdate::new("only-once", b64(b"v2")), &audit())
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_validation_precedes_any_write() {
		let lifecycle = lifecycle().await;

		let bad_name = lifecycle
			.create_or_update(&CreateOrUpdate::new(".hidden", b64(b"x")), &audit())
			.await
			.unwrap_err();
		assert!(matches!(bad_name, ServiceError::InvalidArgument(_)));

		let bad_content = lifecycle
			.create_or_update(&CreateOrUpdate::new("ok", "not base64!!"), &audit())
			.await
			.unwrap_err();
		assert!(matches!(bad_content, ServiceError::InvalidArgument(_)));

		assert!(lifecycle.list_series(0, 10, false).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_get_by_version_and_rollback() {
		let lifecycle = lifecycle().await;
		let v1 = lifecycle
			.create_or_update(&CreateOrUpdate::new("s", b64(b"one")), &audit())
			.await
			.unwrap();
		let v2 = lifecycle
			.create_or_update(&CreateOrUpdate::new("s", b64(b"two")), &audit())
			.await
			.unwrap();

		let current = lifecycle.get_by_name_and_version("s", None).await.unwrap();
		assert_eq!(current.content.id, v2.content.id);

		let pinned = lifecycle.get_by_name_and_version("s", Some(v1.content.id)).await.unwrap();
		assert_eq!(pinned.content.id, v1.content.id);

		let rolled = lifecycle.rollback("s", v1.content.id, &audit()).await.unwrap();
		assert_eq!(rolled.series.current_version, Some(v1.content.id));

		// The rolled-away version stays readable by explicit stamp.
		let newer = lifecycle.get_by_name_and_version("s", Some(v2.content.id)).await.unwrap();
		assert_eq!(lifecycle.decrypt(&newer.content).unwrap(), b64(b"two"));
	}

	#[tokio::test]
	async fn test_rollback_rejects_foreign_version() {
		let lifecycle = lifecycle().await;
		lifecycle.create_or_update(&CreateOrUpdate::new("a", b64(b"x")), &audit()).await.unwrap();
		let other = lifecycle
			.create_or_update(&CreateOrUpdate::new("b", b64(b"y")), &audit())
			.await
			.unwrap();

		let err = lifecycle.rollback("a", other.content.id, &audit()).await.unwrap_err();
		assert!(matches!(err, ServiceError::IllegalState(_)));
	}

	#[tokio::test]
	async fn test_version_from_other_series_is_not_found() {
		let lifecycle = lifecycle().await;
		lifecycle.create_or_update(&CreateOrUpdate::new("a", b64(b"x")), &audit()).await.unwrap();
		let other = lifecycle
			.create_or_update(&CreateOrUpdate::new("b", b64(b"y")), &audit())
			.await
			.unwrap();

		let err = lifecycle
			.get_by_name_and_version("a", Some(other.content.id))
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::NotFound(_)));
	}

	#[tokio::test]
	async fn test_partial_update_owner_tristate() {
		let lifecycle = lifecycle().await;
		{
			let mut conn = lifecycle.pool().acquire().await.unwrap();
			group::create(&mut conn, "g1", "", &BTreeMap::new(), &audit()).await.unwrap();
			group::create(&mut conn, "g2", "", &BTreeMap::new(), &audit()).await.unwrap();
		}

		let mut req = CreateOrUpdate::new("s", b64(b"v"));
		req.owner = Some("g1".to_string());
		lifecycle.create_or_update(&req, &audit()).await.unwrap();

		// Absent leaves the owner alone.
		let updated = lifecycle
			.partial_update(
				"s",
				PartialUpdate { description: FieldUpdate::Set("new desc".into()), ..Default::default() },
				&audit(),
			)
			.await
			.unwrap();
		assert_eq!(updated.series.owner.as_deref(), Some("g1"));
		assert_eq!(updated.series.description, "new desc");

		// Set replaces it.
		let updated = lifecycle
			.partial_update(
				"s",
				PartialUpdate { owner: FieldUpdate::Set("g2".into()), ..Default::default() },
				&audit(),
			)
			.await
			.unwrap();
		assert_eq!(updated.series.owner.as_deref(), Some("g2"));

		// Clear nulls it.
		let updated = lifecycle
			.partial_update(
				"s",
				PartialUpdate { owner: FieldUpdate::Clear, ..Default::default() },
				&audit(),
			)
			.await
			.unwrap();
		assert_eq!(updated.series.owner, None);
	}

	#[tokio::test]
	async fn test_partial_update_always_appends_version() {
		let lifecycle = lifecycle().await;
		let created =
			lifecycle.create_or_update(&CreateOrUpdate::new("s", b64(b"v")), &audit()).await.unwrap();

		let updated = lifecycle
			.partial_update(
				"s",
				PartialUpdate { expiry: FieldUpdate::Set(1_900_000_000), ..Default::default() },
				&audit(),
			)
			.await
			.unwrap();

		assert_ne!(updated.content.id, created.content.id);
		// Untouched content carries over ciphertext and checksum.
		assert_eq!(updated.content.encrypted_content, created.content.encrypted_content);
		assert_eq!(updated.content.content_hmac, created.content.content_hmac);
		assert_eq!(updated.content.expiry, 1_900_000_000);
	}

	#[tokio::test]
	async fn test_partial_update_rejects_cleared_content() {
		let lifecycle = lifecycle().await;
		lifecycle.create_or_update(&CreateOrUpdate::new("s", b64(b"v")), &audit()).await.unwrap();

		let err = lifecycle
			.partial_update(
				"s",
				PartialUpdate { content: FieldUpdate::Clear, ..Default::default() },
				&audit(),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn test_partial_update_unknown_owner_group() {
		let lifecycle = lifecycle().await;
		lifecycle.create_or_update(&CreateOrUpdate::new("s", b64(b"v")), &audit()).await.unwrap();

		let err = lifecycle
			.partial_update(
				"s",
				PartialUpdate { owner: FieldUpdate::Set("nope".into()), ..Default::default() },
				&audit(),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::NotFound(_)));
	}

	#[tokio::test]
	async fn test_soft_delete_frees_name_and_undelete_conflicts() {
		let lifecycle = lifecycle().await;
		let first =
			lifecycle.create_or_update(&CreateOrUpdate::new("s", b64(b"v1")), &audit()).await.unwrap();
		let deleted_id = lifecycle.soft_delete("s", &audit()).await.unwrap();
		assert_eq!(deleted_id, first.series.id);

		let missing = lifecycle.get_by_name_and_version("s", None).await.unwrap_err();
		assert!(matches!(missing, ServiceError::NotFound(_)));

		// Name is reusable for a fresh series with its own history.
		let second =
			lifecycle.create_or_update(&CreateOrUpdate::new("s", b64(b"v2")), &audit()).await.unwrap();
		assert_ne!(second.series.id, first.series.id);
		assert_eq!(lifecycle.list_versions("s", 0, 10, false).await.unwrap().len(), 1);

		// Undelete must refuse while the name is taken.
		let err = lifecycle.undelete(first.series.id, &audit()).await.unwrap_err();
		assert!(matches!(err, ServiceError::Conflict(_)));

		lifecycle.soft_delete("s", &audit()).await.unwrap();
		let restored = lifecycle.undelete(first.series.id, &audit()).await.unwrap();
		assert_eq!(restored.id, first.series.id);
		assert!(!restored.is_deleted());
	}

	#[tokio::test]
	async fn test_purge_removes_old_deletions_only() {
		let lifecycle = lifecycle().await;
		lifecycle.create_or_update(&CreateOrUpdate::new("old", b64(b"v")), &audit()).await.unwrap();
		lifecycle.create_or_update(&CreateOrUpdate::new("recent", b64(b"v")), &audit()).await.unwrap();

		let long_ago = AuditStamp::new("tester", Utc::now() - chrono::Duration::days(90));
		lifecycle.soft_delete("old", &long_ago).await.unwrap();
		lifecycle.soft_delete("recent", &audit()).await.unwrap();

		let cutoff = Utc::now() - chrono::Duration::days(30);
		let purged = lifecycle.purge_deleted_before(cutoff, 10, Duration::ZERO).await.unwrap();
		assert_eq!(purged, 1);

		// The recent deletion is still restorable.
		let mut conn = lifecycle.pool().acquire().await.unwrap();
		let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM secrets")
			.fetch_one(&mut *conn)
			.await
			.unwrap();
		assert_eq!(remaining, 1);
	}

	#[tokio::test]
	async fn test_purge_rejects_zero_batch() {
		let lifecycle = lifecycle().await;
		let err = lifecycle
			.purge_deleted_before(Utc::now(), 0, Duration::ZERO)
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::InvalidArgument(_)));
	}

	#[tokio::test]
	async fn test_set_expiration_and_list_expiring() {
		let lifecycle = lifecycle().await;
		lifecycle.create_or_update(&CreateOrUpdate::new("soon", b64(b"v")), &audit()).await.unwrap();
		lifecycle.create_or_update(&CreateOrUpdate::new("never", b64(b"v")), &audit()).await.unwrap();

		lifecycle.set_expiration("soon", 1_000, &audit()).await.unwrap();

		assert_eq!(lifecycle.list_expiring(2_000).await.unwrap(), vec!["soon".to_string()]);
		assert!(lifecycle.list_expiring(500).await.unwrap().is_empty());

		let current = lifecycle.get_by_name_and_version("soon", None).await.unwrap();
		assert_eq!(current.content.expiry, 1_000);
	}
}
