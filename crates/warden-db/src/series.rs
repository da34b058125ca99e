// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Store functions for the `secrets` table (secret series identities).
//!
//! A series row is the durable identity of a secret: name, description,
//! owner, pointer to the current content version, and the soft-delete
//! marker. Name uniqueness among live rows is enforced by a partial
//! unique index; [`create`] surfaces a violation as `DbError::Conflict`
//! so callers can arbitrate the concurrent-create race.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use warden_core::model::{AuditStamp, SecretSeries};
use warden_core::version::VersionStamp;

use crate::conv::{map_to_json, parse_datetime, parse_map, parse_opt_datetime};
use crate::error::{DbError, Result};

const SELECT_SERIES: &str = r#"
	SELECT s.id, s.name, s.description, s.secret_type, s.options,
	       o.name AS owner_name, s.current,
	       s.created_at, s.created_by, s.updated_at, s.updated_by, s.deleted_at
	FROM secrets s
	LEFT JOIN groups o ON s.owner = o.id
"#;

pub(crate) fn row_to_series(row: &SqliteRow) -> Result<SecretSeries> {
	Ok(SecretSeries {
		id: row.try_get("id")?,
		name: row.try_get("name")?,
		description: row.try_get("description")?,
		secret_type: row.try_get("secret_type")?,
		generation_options: parse_map(&row.try_get::<String, _>("options")?)?,
		owner: row.try_get("owner_name")?,
		current_version: row
			.try_get::<Option<i64>, _>("current")?
			.map(VersionStamp::from_i64),
		created_at: parse_datetime(&row.try_get::<String, _>("created_at")?)?,
		created_by: row.try_get("created_by")?,
		updated_at: parse_datetime(&row.try_get::<String, _>("updated_at")?)?,
		updated_by: row.try_get("updated_by")?,
		deleted_at: parse_opt_datetime(row.try_get::<Option<String>, _>("deleted_at")?.as_deref())?,
	})
}

/// Insert a new series with no current version yet.
///
/// # Errors
/// `DbError::Conflict` if a live series already holds the name.
#[tracing::instrument(skip(conn, generation_options, audit), fields(name = %name))]
pub async fn create(
	conn: &mut SqliteConnection,
	name: &str,
	owner_id: Option<i64>,
	description: &str,
	secret_type: Option<&str>,
	generation_options: &BTreeMap<String, String>,
	audit: &AuditStamp,
) -> Result<i64> {
	let at = audit.at.to_rfc3339();
	let result = sqlx::query(
		r#"
		INSERT INTO secrets
			(name, description, secret_type, options, owner, current,
			 created_at, created_by, updated_at, updated_by, deleted_at)
		VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, NULL)
		"#,
	)
	.bind(name)
	.bind(description)
	.bind(secret_type)
	.bind(map_to_json(generation_options)?)
	.bind(owner_id)
	.bind(&at)
	.bind(&audit.actor)
	.bind(&at)
	.bind(&audit.actor)
	.execute(&mut *conn)
	.await
	.map_err(|e| DbError::from_unique(e, format!("secret series `{name}` already exists")))?;

	let id = result.last_insert_rowid();
	tracing::debug!(series_id = id, "secret series created");
	Ok(id)
}

/// Live series by name (soft-deleted rows are invisible here).
pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<SecretSeries>> {
	let row = sqlx::query(&format!("{SELECT_SERIES} WHERE s.name = ? AND s.deleted_at IS NULL"))
		.bind(name)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_series(&r)).transpose()
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<SecretSeries>> {
	let row = sqlx::query(&format!("{SELECT_SERIES} WHERE s.id = ? AND s.deleted_at IS NULL"))
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_series(&r)).transpose()
}

/// Soft-deleted series by id, for undelete.
pub async fn get_deleted_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<SecretSeries>> {
	let row = sqlx::query(&format!("{SELECT_SERIES} WHERE s.id = ? AND s.deleted_at IS NOT NULL"))
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_series(&r)).transpose()
}

pub async fn live_name_exists(conn: &mut SqliteConnection, name: &str) -> Result<bool> {
	let n: i64 = sqlx::query_scalar(
		"SELECT EXISTS(SELECT 1 FROM secrets WHERE name = ? AND deleted_at IS NULL)",
	)
	.bind(name)
	.fetch_one(&mut *conn)
	.await?;
	Ok(n != 0)
}

/// Overwrite the mutable identity fields of a live series.
#[tracing::instrument(skip(conn, generation_options, audit))]
pub async fn update(
	conn: &mut SqliteConnection,
	id: i64,
	owner_id: Option<i64>,
	description: &str,
	secret_type: Option<&str>,
	generation_options: &BTreeMap<String, String>,
	audit: &AuditStamp,
) -> Result<u64> {
	let result = sqlx::query(
		r#"
		UPDATE secrets
		SET owner = ?, description = ?, secret_type = ?, options = ?,
		    updated_at = ?, updated_by = ?
		WHERE id = ? AND deleted_at IS NULL
		"#,
	)
	.bind(owner_id)
	.bind(description)
	.bind(secret_type)
	.bind(map_to_json(generation_options)?)
	.bind(audit.at.to_rfc3339())
	.bind(&audit.actor)
	.bind(id)
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected())
}

/// Repoint the current version. Used both to advance on a new write and
/// to move back on rollback.
#[tracing::instrument(skip(conn, audit), fields(version = %version))]
pub async fn set_current_version(
	conn: &mut SqliteConnection,
	id: i64,
	version: VersionStamp,
	audit: &AuditStamp,
) -> Result<u64> {
	let result = sqlx::query(
		"UPDATE secrets SET current = ?, updated_at = ?, updated_by = ? WHERE id = ? AND deleted_at IS NULL",
	)
	.bind(version.as_i64())
	.bind(audit.at.to_rfc3339())
	.bind(&audit.actor)
	.bind(id)
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected())
}

#[tracing::instrument(skip(conn, audit))]
pub async fn soft_delete(conn: &mut SqliteConnection, id: i64, audit: &AuditStamp) -> Result<u64> {
	let result = sqlx::query(
		"UPDATE secrets SET deleted_at = ?, updated_at = ?, updated_by = ? WHERE id = ? AND deleted_at IS NULL",
	)
	.bind(audit.at.to_rfc3339())
	.bind(audit.at.to_rfc3339())
	.bind(&audit.actor)
	.bind(id)
	.execute(&mut *conn)
	.await?;
	tracing::debug!(series_id = id, "secret series soft-deleted");
	Ok(result.rows_affected())
}

#[tracing::instrument(skip(conn, audit))]
pub async fn undelete(conn: &mut SqliteConnection, id: i64, audit: &AuditStamp) -> Result<u64> {
	let result = sqlx::query(
		"UPDATE secrets SET deleted_at = NULL, updated_at = ?, updated_by = ? WHERE id = ? AND deleted_at IS NOT NULL",
	)
	.bind(audit.at.to_rfc3339())
	.bind(&audit.actor)
	.bind(id)
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected())
}

/// Batched series listing ordered by creation time.
pub async fn list_batched(
	conn: &mut SqliteConnection,
	offset: i64,
	limit: i64,
	newest_first: bool,
) -> Result<Vec<SecretSeries>> {
	let order = if newest_first { "DESC" } else { "ASC" };
	let rows = sqlx::query(&format!(
		"{SELECT_SERIES} WHERE s.deleted_at IS NULL ORDER BY s.created_at {order}, s.id {order} LIMIT ? OFFSET ?"
	))
	.bind(limit)
	.bind(offset)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(row_to_series).collect()
}

/// Names of live secrets whose current version expires at or before the
/// bound (expiry 0 means never and is excluded).
pub async fn list_expiring(conn: &mut SqliteConnection, not_after: i64) -> Result<Vec<String>> {
	let rows = sqlx::query(
		r#"
		SELECT s.name FROM secrets s
		JOIN secrets_content c ON s.current = c.id
		WHERE s.deleted_at IS NULL AND c.expiry > 0 AND c.expiry <= ?
		ORDER BY c.expiry, s.name
		"#,
	)
	.bind(not_after)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(|r| Ok(r.try_get("name")?)).collect()
}

/// Next batch of series soft-deleted strictly before the cutoff.
pub async fn ids_deleted_before(
	conn: &mut SqliteConnection,
	cutoff: DateTime<Utc>,
	limit: i64,
) -> Result<Vec<i64>> {
	let rows = sqlx::query(
		"SELECT id FROM secrets WHERE deleted_at IS NOT NULL AND deleted_at < ? ORDER BY id LIMIT ?",
	)
	.bind(cutoff.to_rfc3339())
	.bind(limit)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
}

/// Irreversibly remove one series row. Content rows and access grants
/// cascade via foreign keys.
#[tracing::instrument(skip(conn))]
pub async fn hard_delete(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
	let result = sqlx::query("DELETE FROM secrets WHERE id = ?")
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected())
}

/// Keyset page of live, unowned series ids, for ownership backfill.
pub async fn ids_without_owner_after(
	conn: &mut SqliteConnection,
	after_id: i64,
	limit: i64,
) -> Result<Vec<i64>> {
	let rows = sqlx::query(
		"SELECT id FROM secrets WHERE owner IS NULL AND deleted_at IS NULL AND id > ? ORDER BY id LIMIT ?",
	)
	.bind(after_id)
	.bind(limit)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
}

/// Assign an owner only if the series is still unowned. The guard makes
/// backfill safe against a concurrent explicit owner-set.
#[tracing::instrument(skip(conn))]
pub async fn set_owner_if_unset(conn: &mut SqliteConnection, id: i64, owner_id: i64) -> Result<u64> {
	let result = sqlx::query("UPDATE secrets SET owner = ? WHERE id = ? AND owner IS NULL")
		.bind(owner_id)
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected())
}
