// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Store functions for the `groups` registry.

use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use warden_core::model::{AuditStamp, Group};

use crate::conv::{map_to_json, parse_datetime, parse_map};
use crate::error::{DbError, Result};

pub(crate) fn row_to_group(row: &SqliteRow) -> Result<Group> {
	Ok(Group {
		id: row.try_get("id")?,
		name: row.try_get("name")?,
		description: row.try_get("description")?,
		metadata: parse_map(&row.try_get::<String, _>("metadata")?)?,
		created_at: parse_datetime(&row.try_get::<String, _>("created_at")?)?,
		created_by: row.try_get("created_by")?,
		updated_at: parse_datetime(&row.try_get::<String, _>("updated_at")?)?,
		updated_by: row.try_get("updated_by")?,
	})
}

/// # Errors
/// `DbError::Conflict` if the group name is taken.
#[tracing::instrument(skip(conn, metadata, audit), fields(name = %name))]
pub async fn create(
	conn: &mut SqliteConnection,
	name: &str,
	description: &str,
	metadata: &BTreeMap<String, String>,
	audit: &AuditStamp,
) -> Result<i64> {
	let at = audit.at.to_rfc3339();
	let result = sqlx::query(
		r#"
		INSERT INTO groups (name, description, metadata, created_at, created_by, updated_at, updated_by)
		VALUES (?, ?, ?, ?, ?, ?, ?)
		"#,
	)
	.bind(name)
	.bind(description)
	.bind(map_to_json(metadata)?)
	.bind(&at)
	.bind(&audit.actor)
	.bind(&at)
	.bind(&audit.actor)
	.execute(&mut *conn)
	.await
	.map_err(|e| DbError::from_unique(e, format!("group `{name}` already exists")))?;

	tracing::debug!(group_id = result.last_insert_rowid(), "group created");
	Ok(result.last_insert_rowid())
}

pub async fn get_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Group>> {
	let row = sqlx::query("SELECT * FROM groups WHERE id = ?")
		.bind(id)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_group(&r)).transpose()
}

pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Group>> {
	let row = sqlx::query("SELECT * FROM groups WHERE name = ?")
		.bind(name)
		.fetch_optional(&mut *conn)
		.await?;
	row.map(|r| row_to_group(&r)).transpose()
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Group>> {
	let rows = sqlx::query("SELECT * FROM groups ORDER BY name")
		.fetch_all(&mut *conn)
		.await?;
	rows.iter().map(row_to_group).collect()
}

/// Delete a group. Memberships and access grants cascade; series owned
/// by the group fall back to unowned.
#[tracing::instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<u64> {
	let result = sqlx::query("DELETE FROM groups WHERE id = ?")
		.bind(id)
		.execute(&mut *conn)
		.await?;
	Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_warden_test_pool;

	fn audit() -> AuditStamp {
		AuditStamp::now("tester")
	}

	#[tokio::test]
	async fn test_create_get_list() {
		let pool = create_warden_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		let id = create(&mut conn, "sre", "site reliability", &BTreeMap::new(), &audit())
			.await
			.unwrap();

		let by_id = get_by_id(&mut conn, id).await.unwrap().unwrap();
		let by_name = get_by_name(&mut conn, "sre").await.unwrap().unwrap();
		assert_eq!(by_id, by_name);
		assert_eq!(by_id.description, "site reliability");

		create(&mut conn, "dba", "", &BTreeMap::new(), &audit()).await.unwrap();
		let all = list(&mut conn).await.unwrap();
		assert_eq!(all.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(), vec!["dba", "sre"]);
	}

	#[tokio::test]
	async fn test_duplicate_name_conflicts() {
		let pool = create_warden_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		create(&mut conn, "sre", "", &BTreeMap::new(), &audit()).await.unwrap();
		let err = create(&mut conn, "sre", "", &BTreeMap::new(), &audit()).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_delete() {
		let pool = create_warden_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		let id = create(&mut conn, "gone", "", &BTreeMap::new(), &audit()).await.unwrap();
		assert_eq!(delete(&mut conn, id).await.unwrap(), 1);
		assert!(get_by_id(&mut conn, id).await.unwrap().is_none());
		assert_eq!(delete(&mut conn, id).await.unwrap(), 0);
	}
}
