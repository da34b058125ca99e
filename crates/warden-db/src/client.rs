// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Store functions for the `clients` registry (machine principals).

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use warden_core::model::{AuditStamp, Client};

use crate::conv::{parse_datetime, parse_opt_datetime};
use crate::error::{DbError, Result};

pub(crate) fn row_to_client(row: &SqliteRow) -> Result<Client> {
	Ok(Client {
		id: row.try_get("id")?,
		name: row.try_get("name")?,
		description: row.try_get("description")?,
		spiffe_id: row.try_get("spiffe_id")?,
		enabled: row.try_get::<i64, _>("enabled")? != 0,
		automation_allowed: row.try_get::<i64, _>("automation_allowed")? != 0,
		created_at: parse_datetime(&row.try_get::<String, _>("created_at")?)?,
		created_by: row.try_get("created_by")?,
		updated_at: parse_datetime(&row.try_get::<String, _>("updated_at")?)?,
		updated_by: row.try_get("updated_by")?,
		last_seen_at: parse_opt_datetime(row.try_get::<Option<String>, _>("last_seen_at")?.as_deref())?,
		expires_at: parse_opt_datetime(row.try_get::<Option<String>, _>("expires_at")?.as_deref())?,
	})
}

/// # Errors
/// `DbError::Conflict` if the client name is taken.
#[tracing::instrument(skip(conn, audit), fields(name = %name))]
pub async fn create(
	conn: &mut SqliteConnection,
	name: &str,
	description: &str,
	spiffe_id: Option<&str>,
	automation_allowed: bool,
	audit: &AuditStamp,
) -> Result<i64> {
	let at = audit.at.to_rfc3339();
	let result = sqlx::query(
		r#"
		INSERT INTO clients
			(name, description, spiffe_id, enabled, automation_allowed,
			 created_at, created_by, updated_at, updated_by)
		VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(name)
	.bind(description)
	.bind(spiffe_id)
	.bind(automation_allowed as i64)
	.bind(&at)
	.bind(&audit.actor)
	.bind(&at)
	.bind(&audit.actor)
	.execute(&mut *conn)
	.await
	.map_err(|e| DbError::from_unique(e, format!("client `{name}` already exists")))?;

	tracing::debug!(client_id = result.last_insert_rowid(), "client created");
	Ok(result.last_insert_rowid())
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Client>> {
	let row = sqlx::query("SELECT * FROM clients WHERE id = ?")
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_client(&r)).transpose()
}

pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Client>> {
	let row = sqlx::query("SELECT * FROM clients WHERE name = ?")
		.bind(name)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_client(&r)).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Client>> {
	let rows = sqlx::query("SELECT * FROM clients ORDER BY name")
		.fetch_all(&mut *conn)
		.await?;
	rows.iter().map(row_to_client).collect()
}

/// Enable or disable a client. Disabled clients resolve no secrets.
#[tracing::instrument(skip(conn, audit))]
pub async fn set_enabled(
	conn: &mut SqliteConnection,
	id: i64,
	enabled: bool,
	audit: &AuditStamp,
) -> Result<u64> {
	let result = sqlx::query(
		"UPDATE clients SET enabled = ?, updated_at = ?, updated_by = ? WHERE id = ?",
	)
	.bind(enabled as i64)
	.bind(audit.at.to_rfc3339())
	.bind(&audit.actor)
	.bind(id)
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected())
}

/// Delete a client; memberships cascade.
#[tracing::instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
	let result = sqlx::query("DELETE FROM clients WHERE id = ?")
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected())
}
