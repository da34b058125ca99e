// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Batched create-or-update with caller-selected atomicity.

use warden_core::model::AuditStamp;
use warden_core::update::{BatchItem, BatchItemStatus, BatchMode, BatchReport, CreateOrUpdate};

use crate::error::Result;
use crate::lifecycle::SecretLifecycle;

#[derive(Clone)]
pub struct BatchCoordinator {
	lifecycle: SecretLifecycle,
}

impl BatchCoordinator {
	pub fn new(lifecycle: SecretLifecycle) -> Self {
		Self { lifecycle }
	}

	/// Apply a batch of create-or-update items under the given mode.
	///
	/// Only storage atomicity differs between modes; each item's
	/// validation and write path is exactly the single-item operation.
	/// The report always carries one entry per input item, in order.
	#[tracing::instrument(skip(self, items, audit), fields(count = items.len(), mode = ?mode))]
	pub async fn batch_create_or_update(
		&self,
		items: &[CreateOrUpdate],
		mode: BatchMode,
		audit: &AuditStamp,
	) -> Result<BatchReport> {
		let items_report = match mode {
			BatchMode::AllOrNone => self.apply_all_or_none(items, audit).await?,
			BatchMode::BestEffort => self.apply_best_effort(items, audit).await?,
			BatchMode::FailFast => self.apply_fail_fast(items, audit).await?,
		};
		Ok(BatchReport { mode, items: items_report })
	}

	/// One transaction for the whole batch. The first failure rolls
	/// back everything already applied and stops processing.
	async fn apply_all_or_none(
		&self,
		items: &[CreateOrUpdate],
		audit: &AuditStamp,
	) -> Result<Vec<BatchItem>> {
		let mut tx = self.lifecycle.pool().begin().await?;
		let mut report: Vec<BatchItem> = Vec::with_capacity(items.len());
		let mut failure = None;

		for item in items {
			match self.lifecycle.create_or_update_in(&mut tx, item, audit).await {
				Ok(_) => report.push(BatchItem {
					name: item.name.clone(),
					status: BatchItemStatus::Applied,
				}),
				Err(err) => {
					failure = Some((item.name.clone(), err.to_string()));
					break;
				}
			}
		}

		match failure {
			None => {
				tx.commit().await?;
				Ok(report)
			}
			Some((failed_name, error)) => {
				tx.rollback().await?;
				tracing::warn!(name = %failed_name, %error, "all-or-none batch rolled back");
				for item in &mut report {
					item.status = BatchItemStatus::RolledBack;
				}
				report.push(BatchItem { name: failed_name, status: BatchItemStatus::Failed { error } });
				for item in &items[report.len()..] {
					report.push(BatchItem {
						name: item.name.clone(),
						status: BatchItemStatus::NotAttempted,
					});
				}
				Ok(report)
			}
		}
	}

	/// Every item in its own transaction; failures are collected, not
	/// propagated.
	async fn apply_best_effort(
		&self,
		items: &[CreateOrUpdate],
		audit: &AuditStamp,
	) -> Result<Vec<BatchItem>> {
		let mut report = Vec::with_capacity(items.len());
		for item in items {
			let status = match self.lifecycle.create_or_update(item, audit).await {
				Ok(_) => BatchItemStatus::Applied,
				Err(err) => BatchItemStatus::Failed { error: err.to_string() },
			};
			report.push(BatchItem { name: item.name.clone(), status });
		}
		Ok(report)
	}

	/// In-order per-item transactions, stopping at the first failure.
	/// Earlier successes stay committed.
	async fn apply_fail_fast(
		&self,
		items: &[CreateOrUpdate],
		audit: &AuditStamp,
	) -> Result<Vec<BatchItem>> {
		let mut report = Vec::with_capacity(items.len());
		let mut stopped = false;
		for item in items {
			if stopped {
				report.push(BatchItem {
					name: item.name.clone(),
					status: BatchItemStatus::NotAttempted,
				});
				continue;
			}
			match self.lifecycle.create_or_update(item, audit).await {
				Ok(_) => report.push(BatchItem {
					name: item.name.clone(),
					status: BatchItemStatus::Applied,
				}),
				Err(err) => {
					tracing::warn!(name = %item.name, error = %err, "fail-fast batch stopped");
					report.push(BatchItem {
						name: item.name.clone(),
						status: BatchItemStatus::Failed { error: err.to_string() },
					});
					stopped = true;
				}
			}
		}
		Ok(report)
	}
}
