// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Ownership backfill: infer an owner for historical secrets created
//! before ownership existed.
//!
//! Each unowned live series is assigned the group of its oldest access
//! grant; series with no grants stay unowned. The assignment is guarded
//! with `owner IS NULL` so a concurrent explicit owner-set always wins.

use std::time::Duration;

use sqlx::SqlitePool;

use warden_db::{acl, series};

use crate::error::{Result, ServiceError};

/// Counters from one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
	pub batches: u64,
	/// Unowned series inspected.
	pub examined: u64,
	/// Series that actually received an owner.
	pub assigned: u64,
}

#[derive(Clone)]
pub struct OwnershipBackfill {
	pool: SqlitePool,
}

impl OwnershipBackfill {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Sweep unowned live series in id order, one transaction per
	/// batch, pausing `delay` between batches. Re-running is a no-op
	/// for rows already filled.
	#[tracing::instrument(skip(self))]
	pub async fn run(&self, batch_size: u32, delay: Duration) -> Result<BackfillSummary> {
		if batch_size == 0 {
			return Err(ServiceError::InvalidArgument("batch_size must be positive".to_string()));
		}
		let mut summary = BackfillSummary::default();
		// Keyset pagination: grant-less series stay unowned, so an
		// offset-free `owner IS NULL` scan would revisit them forever.
		let mut last_id = 0i64;
		loop {
			let mut tx = self.pool.begin().await?;
			let ids = series::ids_without_owner_after(&mut tx, last_id, i64::from(batch_size)).await?;
			if ids.is_empty() {
				break;
			}
			for id in &ids {
				summary.examined += 1;
				if let Some(group_id) = acl::oldest_grant_group(&mut tx, *id).await? {
					summary.assigned += series::set_owner_if_unset(&mut tx, *id, group_id).await?;
				}
			}
			tx.commit().await?;
			summary.batches += 1;
			last_id = ids[ids.len() - 1];
			tracing::debug!(
				batch = summary.batches,
				examined = summary.examined,
				assigned = summary.assigned,
				"ownership backfill batch committed"
			);
			if ids.len() < batch_size as usize {
				break;
			}
			tokio::time::sleep(delay).await;
		}
		Ok(summary)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use std::collections::BTreeMap;
	use warden_core::model::AuditStamp;
	use warden_core::version::{VersionStamp, VERSION_EPOCH_MS};
	use warden_db::testing::create_warden_test_pool;
	use warden_db::{content, group};

	fn audit() -> AuditStamp {
		AuditStamp::now("tester")
	}

	async fn make_secret(pool: &SqlitePool, name: &str, owner: Option<i64>) -> i64 {
		let mut conn = pool.acquire().await.unwrap();
		let id = series::create(&mut conn, name, owner, "", None, &BTreeMap::new(), &audit())
			.await
			.unwrap();
		let stamp = VersionStamp::from_parts(VERSION_EPOCH_MS + 1_000 + id, 1);
		content::insert(&mut conn, stamp, id, "ct", "mac", &BTreeMap::new(), 0, &audit())
			.await
			.unwrap();
		series::set_current_version(&mut conn, id, stamp, &audit()).await.unwrap();
		id
	}

	#[tokio::test]
	async fn test_assigns_oldest_grant_group() {
		let pool = create_warden_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let g1 = group::create(&mut conn, "g1", "", &BTreeMap::new(), &audit()).await.unwrap();
		let g2 = group::create(&mut conn, "g2", "", &BTreeMap::new(), &audit()).await.unwrap();
		drop(conn);

		let s = make_secret(&pool, "s", None).await;
		let mut conn = pool.acquire().await.unwrap();
		let earlier = Utc::now() - chrono::Duration::hours(1);
		acl::grant(&mut conn, g2, s, earlier).await.unwrap();
		acl::grant(&mut conn, g1, s, Utc::now()).await.unwrap();
		drop(conn);

		let summary = OwnershipBackfill::new(pool.clone()).run(10, Duration::ZERO).await.unwrap();
		assert_eq!(summary.examined, 1);
		assert_eq!(summary.assigned, 1);

		let mut conn = pool.acquire().await.unwrap();
		let restored = series::get_by_id(&mut conn, s).await.unwrap().unwrap();
		assert_eq!(restored.owner.as_deref(), Some("g2"));
	}

	#[tokio::test]
	async fn test_never_overwrites_existing_owner() {
		let pool = create_warden_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let g1 = group::create(&mut conn, "g1", "", &BTreeMap::new(), &audit()).await.unwrap();
		let g2 = group::create(&mut conn, "g2", "", &BTreeMap::new(), &audit()).await.unwrap();
		drop(conn);

		let owned = make_secret(&pool, "owned", Some(g1)).await;
		let mut conn = pool.acquire().await.unwrap();
		acl::grant(&mut conn, g2, owned, Utc::now()).await.unwrap();
		drop(conn);

		let summary = OwnershipBackfill::new(pool.clone()).run(10, Duration::ZERO).await.unwrap();
		assert_eq!(summary.examined, 0);
		assert_eq!(summary.assigned, 0);

		let mut conn = pool.acquire().await.unwrap();
		let series = series::get_by_id(&mut conn, owned).await.unwrap().unwrap();
		assert_eq!(series.owner.as_deref(), Some("g1"));
	}

	#[tokio::test]
	async fn test_grant_less_series_stay_unowned_and_run_terminates() {
		let pool = create_warden_test_pool().await;
		for i in 0..5 {
			make_secret(&pool, &format!("s{i}"), None).await;
		}

		// Batch size 2 forces several keyset pages over rows that never
		// leave the unowned set.
		let summary = OwnershipBackfill::new(pool.clone()).run(2, Duration::ZERO).await.unwrap();
		assert_eq!(summary.examined, 5);
		assert_eq!(summary.assigned, 0);
		assert_eq!(summary.batches, 3);
	}

	#[tokio::test]
	async fn test_rerun_is_noop() {
		let pool = create_warden_test_pool().await;
		let mut conn = pool.acquire().await.unwrap();
		let g = group::create(&mut conn, "g", "", &BTreeMap::new(), &audit()).await.unwrap();
		drop(conn);

		let s = make_secret(&pool, "s", None).await;
		let mut conn = pool.acquire().await.unwrap();
		acl::grant(&mut conn, g, s, Utc::now()).await.unwrap();
		drop(conn);

		let backfill = OwnershipBackfill::new(pool.clone());
		let first = backfill.run(10, Duration::ZERO).await.unwrap();
		assert_eq!(first.assigned, 1);
		let second = backfill.run(10, Duration::ZERO).await.unwrap();
		assert_eq!(second.examined, 0);
		assert_eq!(second.assigned, 0);
	}

	#[tokio::test]
	async fn test_zero_batch_size_rejected() {
		let pool = create_warden_test_pool().await;
		let err = OwnershipBackfill::new(pool).run(0, Duration::ZERO).await.unwrap_err();
		assert!(matches!(err, ServiceError::InvalidArgument(_)));
	}
}
