// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Store functions for the two access-control join tables.
//!
//! `memberships` links clients into groups; `accessgrants` links groups
//! to secret series. Read authorization is purely the join
//! client -> membership -> group -> grant -> series; series ownership
//! plays no part in it.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use warden_core::model::{Client, Group, SecretSeries};

use crate::error::Result;
use crate::{client::row_to_client, group::row_to_group, series::row_to_series};

/// Grant a group read access to a series. Re-granting an existing pair
/// is a no-op; returns whether a row was inserted.
#[tracing::instrument(skip(conn))]
pub async fn grant(
	conn: &mut SqliteConnection,
	group_id: i64,
	secret_series_id: i64,
	at: DateTime<Utc>,
) -> Result<bool> {
	let result = sqlx::query(
		"INSERT OR IGNORE INTO accessgrants (group_id, secret_series_id, created_at) VALUES (?, ?, ?)",
	)
	.bind(group_id)
	.bind(secret_series_id)
	.bind(at.to_rfc3339())
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected() > 0)
}

/// Returns whether a grant row was removed.
#[tracing::instrument(skip(conn))]
pub async fn revoke(conn: &mut SqliteConnection, group_id: i64, secret_series_id: i64) -> Result<bool> {
	let result = sqlx::query("DELETE FROM accessgrants WHERE group_id = ? AND secret_series_id = ?")
		.bind(group_id)
		.bind(secret_series_id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected() > 0)
}

/// Enroll a client into a group. Returns whether a row was inserted.
#[tracing::instrument(skip(conn))]
pub async fn enroll(
	conn: &mut SqliteConnection,
	group_id: i64,
	client_id: i64,
	at: DateTime<Utc>,
) -> Result<bool> {
	let result = sqlx::query(
		"INSERT OR IGNORE INTO memberships (group_id, client_id, created_at) VALUES (?, ?, ?)",
	)
	.bind(group_id)
	.bind(client_id)
	.bind(at.to_rfc3339())
	.execute(&mut *conn)
	.await?;
	Ok(result.rows_affected() > 0)
}

/// Returns whether a membership row was removed.
#[tracing::instrument(skip(conn))]
pub async fn evict(conn: &mut SqliteConnection, group_id: i64, client_id: i64) -> Result<bool> {
	let result = sqlx::query("DELETE FROM memberships WHERE group_id = ? AND client_id = ?")
		.bind(group_id)
		.bind(client_id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected() > 0)
}

/// Live series reachable from a client through any of its groups.
/// Only series with a current version are visible.
pub async fn series_visible_to_client(
	conn: &mut SqliteConnection,
	client_id: i64,
) -> Result<Vec<SecretSeries>> {
	let rows = sqlx::query(
		r#"
		SELECT DISTINCT s.id, s.name, s.description, s.secret_type, s.options,
		       o.name AS owner_name, s.current,
		       s.created_at, s.created_by, s.updated_at, s.updated_by, s.deleted_at
		FROM secrets s
		JOIN accessgrants a ON a.secret_series_id = s.id
		JOIN memberships m ON m.group_id = a.group_id
		LEFT JOIN groups o ON s.owner = o.id
		WHERE m.client_id = ? AND s.deleted_at IS NULL AND s.current IS NOT NULL
		ORDER BY s.name
		"#,
	)
	.bind(client_id)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(row_to_series).collect()
}

/// Live series directly granted to a group (no membership traversal).
pub async fn series_granted_to_group(
	conn: &mut SqliteConnection,
	group_id: i64,
) -> Result<Vec<SecretSeries>> {
	let rows = sqlx::query(
		r#"
		SELECT s.id, s.name, s.description, s.secret_type, s.options,
		       o.name AS owner_name, s.current,
		       s.created_at, s.created_by, s.updated_at, s.updated_by, s.deleted_at
		FROM secrets s
		JOIN accessgrants a ON a.secret_series_id = s.id
		LEFT JOIN groups o ON s.owner = o.id
		WHERE a.group_id = ? AND s.deleted_at IS NULL AND s.current IS NOT NULL
		ORDER BY s.name
		"#,
	)
	.bind(group_id)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(row_to_series).collect()
}

/// Clients reachable from a series through the inverse join.
pub async fn clients_with_access(
	conn: &mut SqliteConnection,
	secret_series_id: i64,
) -> Result<Vec<Client>> {
	let rows = sqlx::query(
		r#"
		SELECT DISTINCT c.*
		FROM clients c
		JOIN memberships m ON m.client_id = c.id
		JOIN accessgrants a ON a.group_id = m.group_id
		WHERE a.secret_series_id = ?
		ORDER BY c.name
		"#,
	)
	.bind(secret_series_id)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(row_to_client).collect()
}

/// Groups holding a grant on a series.
pub async fn groups_granting(conn: &mut SqliteConnection, secret_series_id: i64) -> Result<Vec<Group>> {
	let rows = sqlx::query(
		r#"
		SELECT g.* FROM groups g
		JOIN accessgrants a ON a.group_id = g.id
		WHERE a.secret_series_id = ?
		ORDER BY g.name
		"#,
	)
	.bind(secret_series_id)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(row_to_group).collect()
}

/// Groups a client belongs to.
pub async fn groups_for_client(conn: &mut SqliteConnection, client_id: i64) -> Result<Vec<Group>> {
	let rows = sqlx::query(
		r#"
		SELECT g.* FROM groups g
		JOIN memberships m ON m.group_id = g.id
		WHERE m.client_id = ?
		ORDER BY g.name
		"#,
	)
	.bind(client_id)
	.fetch_all(&mut *conn)
	.await?;
	rows.iter().map(row_to_group).collect()
}

/// Whether any membership x grant path authorizes the client on the
/// series.
pub async fn client_can_access(
	conn: &mut SqliteConnection,
	client_id: i64,
	secret_series_id: i64,
) -> Result<bool> {
	let n: i64 = sqlx::query_scalar(
		r#"
		SELECT EXISTS(
			SELECT 1 FROM memberships m
			JOIN accessgrants a ON a.group_id = m.group_id
			WHERE m.client_id = ? AND a.secret_series_id = ?
		)
		"#,
	)
	.bind(client_id)
	.bind(secret_series_id)
	.fetch_one(&mut *conn)
	.await?;
	Ok(n != 0)
}

/// Group of the series' oldest access grant, the inference source for
/// ownership backfill. Ties on created_at break by group id for
/// determinism.
pub async fn oldest_grant_group(
	conn: &mut SqliteConnection,
	secret_series_id: i64,
) -> Result<Option<i64>> {
	let row = sqlx::query(
		r#"
		SELECT group_id FROM accessgrants
		WHERE secret_series_id = ?
		ORDER BY created_at ASC, group_id ASC
		LIMIT 1
		"#,
	)
	.bind(secret_series_id)
	.fetch_optional(&mut *conn)
	.await?;
	Ok(row.map(|r| r.try_get("group_id")).transpose()?)
}
