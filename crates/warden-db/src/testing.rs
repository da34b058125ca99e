// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory pools and schema helpers for tests.
//!
//! The schema here mirrors the production migrations. Pools are pinned
//! to a single connection because each in-memory SQLite connection is
//! its own database.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true)
		.create_if_missing(true);

	SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool")
}

pub async fn create_groups_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS groups (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL UNIQUE,
			description TEXT NOT NULL DEFAULT '',
			metadata TEXT NOT NULL DEFAULT '{}',
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			updated_by TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_clients_table(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS clients (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL UNIQUE,
			description TEXT NOT NULL DEFAULT '',
			spiffe_id TEXT,
			enabled INTEGER NOT NULL DEFAULT 1,
			automation_allowed INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			updated_by TEXT NOT NULL,
			last_seen_at TEXT,
			expires_at TEXT
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_secrets_tables(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS secrets (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL,
			description TEXT NOT NULL DEFAULT '',
			secret_type TEXT,
			options TEXT NOT NULL DEFAULT '{}',
			owner INTEGER REFERENCES groups(id) ON DELETE SET NULL,
			current INTEGER,
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			updated_by TEXT NOT NULL,
			deleted_at TEXT
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	// Name uniqueness holds among live rows only; a soft-deleted series
	// frees its name for reuse.
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_secrets_live_name ON secrets(name) WHERE deleted_at IS NULL",
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS secrets_content (
			id INTEGER PRIMARY KEY,
			secret_series_id INTEGER NOT NULL REFERENCES secrets(id) ON DELETE CASCADE,
			encrypted_content TEXT NOT NULL,
			content_hmac TEXT NOT NULL,
			metadata TEXT NOT NULL DEFAULT '{}',
			expiry INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			updated_by TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_secrets_content_series ON secrets_content(secret_series_id)",
	)
	.execute(pool)
	.await
	.unwrap();
}

pub async fn create_acl_tables(pool: &SqlitePool) {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS memberships (
			group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
			client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
			created_at TEXT NOT NULL,
			PRIMARY KEY (group_id, client_id)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS accessgrants (
			group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
			secret_series_id INTEGER NOT NULL REFERENCES secrets(id) ON DELETE CASCADE,
			created_at TEXT NOT NULL,
			PRIMARY KEY (group_id, secret_series_id)
		)
		"#,
	)
	.execute(pool)
	.await
	.unwrap();
}

/// Pool with the full Warden schema, for service-level tests.
pub async fn create_warden_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	create_groups_table(&pool).await;
	create_clients_table(&pool).await;
	create_secrets_tables(&pool).await;
	create_acl_tables(&pool).await;
	pool
}
