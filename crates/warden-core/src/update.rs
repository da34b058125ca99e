// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Partial-update and batch mutation request types.
//!
//! A partial update must distinguish "field not supplied" from "field
//! explicitly cleared". [`FieldUpdate`] makes the three states
//! unrepresentable as anything else: a nullable-plus-flag pair cannot be
//! smuggled in, so the classic owner-clearing bug cannot be written.

use std::collections::BTreeMap;

/// Tri-state update for one mutable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
	/// Field was not supplied; the stored value stays untouched.
	#[default]
	Absent,
	/// Field was supplied as null; the stored value is cleared.
	Clear,
	/// Field was supplied with a value.
	Set(T),
}

impl<T> FieldUpdate<T> {
	pub fn is_absent(&self) -> bool {
		matches!(self, FieldUpdate::Absent)
	}

	pub fn as_ref(&self) -> FieldUpdate<&T> {
		match self {
			FieldUpdate::Absent => FieldUpdate::Absent,
			FieldUpdate::Clear => FieldUpdate::Clear,
			FieldUpdate::Set(v) => FieldUpdate::Set(v),
		}
	}

	/// Resolve against the currently stored value.
	pub fn resolve(self, current: Option<T>) -> Option<T> {
		match self {
			FieldUpdate::Absent => current,
			FieldUpdate::Clear => None,
			FieldUpdate::Set(v) => Some(v),
		}
	}

	/// Resolve for fields whose cleared state is a default value rather
	/// than null (description, metadata, expiry).
	pub fn resolve_or(self, current: T, cleared: T) -> T {
		match self {
			FieldUpdate::Absent => current,
			FieldUpdate::Clear => cleared,
			FieldUpdate::Set(v) => v,
		}
	}
}

/// Field-selective update of an existing secret.
///
/// Applying any of these always appends a new content version; content
/// rows themselves stay immutable.
#[derive(Debug, Clone, Default)]
pub struct PartialUpdate {
	/// Base64-encoded replacement payload. `Clear` is rejected: a secret
	/// cannot have empty content.
	pub content: FieldUpdate<String>,
	pub description: FieldUpdate<String>,
	pub metadata: FieldUpdate<BTreeMap<String, String>>,
	pub secret_type: FieldUpdate<String>,
	/// Epoch seconds; cleared means no expiry.
	pub expiry: FieldUpdate<i64>,
	/// Owning group, referenced by name.
	pub owner: FieldUpdate<String>,
}

/// One create-or-update request, also the per-item payload of a batch.
#[derive(Debug, Clone)]
pub struct CreateOrUpdate {
	pub name: String,
	/// Base64-encoded plaintext.
	pub content: String,
	pub description: Option<String>,
	pub metadata: BTreeMap<String, String>,
	pub secret_type: Option<String>,
	/// Epoch seconds; 0 means no expiry.
	pub expiry: i64,
	/// Owning group by name. Absent preserves an existing owner on
	/// update and leaves a new secret unowned.
	pub owner: Option<String>,
}

impl CreateOrUpdate {
	pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			content: content.into(),
			description: None,
			metadata: BTreeMap::new(),
			secret_type: None,
			expiry: 0,
			owner: None,
		}
	}
}

/// Atomicity policy for a batched mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
	/// Every item in one transaction; any failure rolls back all items.
	AllOrNone,
	/// Items applied independently; failures collected per item.
	BestEffort,
	/// In-order application stopping at the first failure.
	FailFast,
}

/// Outcome of one batch item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItemStatus {
	Applied,
	Failed { error: String },
	/// Processing stopped before this item was reached.
	NotAttempted,
	/// Item applied but undone because another item in an all-or-none
	/// batch failed.
	RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
	pub name: String,
	pub status: BatchItemStatus,
}

/// Per-item report for a whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
	pub mode: BatchMode,
	pub items: Vec<BatchItem>,
}

impl BatchReport {
	pub fn succeeded(&self) -> bool {
		self.items
			.iter()
			.all(|item| item.status == BatchItemStatus::Applied)
	}

	/// First failed item, if any.
	pub fn first_failure(&self) -> Option<&BatchItem> {
		self.items
			.iter()
			.find(|item| matches!(item.status, BatchItemStatus::Failed { .. }))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_absent_preserves_current() {
		let update: FieldUpdate<String> = FieldUpdate::Absent;
		assert_eq!(update.resolve(Some("g1".to_string())), Some("g1".to_string()));
	}

	#[test]
	fn test_clear_nulls_current() {
		let update: FieldUpdate<String> = FieldUpdate::Clear;
		assert_eq!(update.resolve(Some("g1".to_string())), None);
	}

	#[test]
	fn test_set_replaces_current() {
		let update = FieldUpdate::Set("g2".to_string());
		assert_eq!(update.resolve(Some("g1".to_string())), Some("g2".to_string()));
	}

	#[test]
	fn test_resolve_or_uses_cleared_default() {
		assert_eq!(FieldUpdate::<i64>::Absent.resolve_or(5, 0), 5);
		assert_eq!(FieldUpdate::<i64>::Clear.resolve_or(5, 0), 0);
		assert_eq!(FieldUpdate::Set(9i64).resolve_or(5, 0), 9);
	}

	#[test]
	fn test_default_is_absent() {
		assert!(FieldUpdate::<String>::default().is_absent());
		let update = PartialUpdate::default();
		assert!(update.content.is_absent());
		assert!(update.owner.is_absent());
	}

	#[test]
	fn test_report_first_failure() {
		let report = BatchReport {
			mode: BatchMode::FailFast,
			items: vec![
				BatchItem { name: "a".into(), status: BatchItemStatus::Applied },
				BatchItem {
					name: "b".into(),
					status: BatchItemStatus::Failed { error: "bad base64".into() },
				},
				BatchItem { name: "c".into(), status: BatchItemStatus::NotAttempted },
			],
		};
		assert!(!report.succeeded());
		assert_eq!(report.first_failure().unwrap().name, "b");
	}
}
