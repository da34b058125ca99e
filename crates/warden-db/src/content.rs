// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Store functions for the `secrets_content` table.
//!
//! Content rows are immutable once written: a new payload is always a
//! new row with a fresh version stamp. The single sanctioned mutation is
//! [`set_expiration`].

use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use warden_core::model::{AuditStamp, SecretContent};
use warden_core::version::VersionStamp;

use crate::conv::{map_to_json, parse_datetime, parse_map};
use crate::error::{DbError, Result};

fn row_to_content(row: &SqliteRow) -> Result<SecretContent> {
	Ok(SecretContent {
		id: VersionStamp::from_i64(row.try_get("id")?),
		secret_series_id: row.try_get("secret_series_id")?,
		encrypted_content: row.try_get("encrypted_content")?,
		content_hmac: row.try_get("content_hmac")?,
		metadata: parse_map(&row.try_get::<String, _>("metadata")?)?,
		expiry: row.try_get("expiry")?,
		created_at: parse_datetime(&row.try_get::<String, _>("created_at")?)?,
		created_by: row.try_get("created_by")?,
		updated_at: parse_datetime(&row.try_get::<String, _>("updated_at")?)?,
		updated_by: row.try_get("updated_by")?,
	})
}

/// Insert one content version under a caller-assigned version stamp.
#[tracing::instrument(skip(conn, encrypted_content, content_hmac, metadata, audit), fields(version = %id))]
pub async fn insert(
	conn: &mut SqliteConnection,
	id: VersionStamp,
	secret_series_id: i64,
	encrypted_content: &str,
	content_hmac: &str,
	metadata: &BTreeMap<String, String>,
	expiry: i64,
	audit: &AuditStamp,
) -> Result<()> {
	let at = audit.at.to_rfc3339();
	sqlx::query(
		r#"
		INSERT INTO secrets_content
			(id, secret_series_id, encrypted_content, content_hmac, metadata, expiry,
			 created_at, created_by, updated_at, updated_by)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(id.as_i64())
	.bind(secret_series_id)
	.bind(encrypted_content)
	.bind(content_hmac)
	.bind(map_to_json(metadata)?)
	.bind(expiry)
	.bind(&at)
	.bind(&audit.actor)
	.bind(&at)
	.bind(&audit.actor)
	.execute(&mut *conn)
	.await
	.map_err(|e| DbError::from_unique(e, format!("content version {id} already exists")))?;

	tracing::debug!(series_id = secret_series_id, "secret content version created");
	Ok(())
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: VersionStamp) -> Result<Option<SecretContent>> {
	let row = sqlx::query("SELECT * FROM secrets_content WHERE id = ?")
		.bind(id.as_i64())
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_content(&r)).transpose()
}

/// Version lookup scoped to its owning series, so a stamp from an
/// unrelated secret can never be resolved.
pub async fn get_for_series(
	conn: &mut SqliteConnection,
	secret_series_id: i64,
	id: VersionStamp,
) -> Result<Option<SecretContent>> {
	let row = sqlx::query("SELECT * FROM secrets_content WHERE id = ? AND secret_series_id = ?")
		.bind(id.as_i64())
		.bind(secret_series_id)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_content(&r)).transpose()
}

/// Paginated version history; version stamps encode creation time, so
/// ordering by id is ordering by creation.
pub async fn list_for_series(
	conn: &mut SqliteConnection,
	secret_series_id: i64,
	offset: i64,
	limit: i64,
	newest_first: bool,
) -> Result<Vec<SecretContent>> {
	let order = if newest_first { "DESC" } else { "ASC" };
	let rows = sqlx::query(&format!(
		"SELECT * FROM secrets_content WHERE secret_series_id = ? ORDER BY id {order} LIMIT ? OFFSET ?"
	))
	.bind(secret_series_id)
	.bind(limit)
	.bind(offset)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(row_to_content).collect()
}

#[tracing::instrument(skip(conn, audit), fields(version = %id))]
pub async fn set_expiration(
	conn: &mut SqliteConnection,
	id: VersionStamp,
	expiry: i64,
	audit: &AuditStamp,
) -> Result<u64> {
	let result = sqlx::query(
		"UPDATE secrets_content SET expiry = ?, updated_at = ?, updated_by = ? WHERE id = ?",
	)
	.bind(expiry)
	.bind(audit.at.to_rfc3339())
	.bind(&audit.actor)
	.bind(id.as_i64())
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected())
}

pub async fn count_for_series(conn: &mut SqliteConnection, secret_series_id: i64) -> Result<i64> {
	Ok(
		sqlx::query_scalar("SELECT COUNT(*) FROM secrets_content WHERE secret_series_id = ?")
			.bind(secret_series_id)
			.fetch_one(&mut *conn)
			.await?,
	)
}
