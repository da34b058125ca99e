// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Column conversion helpers shared by the row mappers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::DbError;

pub(crate) fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp `{raw}`: {e}")))
}

pub(crate) fn parse_opt_datetime(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, DbError> {
	raw.map(parse_datetime).transpose()
}

pub(crate) fn parse_map(raw: &str) -> Result<BTreeMap<String, String>, DbError> {
	Ok(serde_json::from_str(raw)?)
}

pub(crate) fn map_to_json(map: &BTreeMap<String, String>) -> Result<String, DbError> {
	Ok(serde_json::to_string(map)?)
}
