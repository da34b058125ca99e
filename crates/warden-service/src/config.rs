// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Service configuration loaded from TOML with environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read config file: {0}")]
	Io(#[from] std::io::Error),

	#[error("Failed to parse config file: {0}")]
	Parse(#[from] toml::de::Error),
}

/// Tuning for a long-running maintenance sweep: how many rows per
/// transaction and how long to pause between transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTuning {
	pub batch_size: u32,
	pub delay_ms: u64,
}

impl BatchTuning {
	pub fn delay(&self) -> Duration {
		Duration::from_millis(self.delay_ms)
	}
}

fn default_purge() -> BatchTuning {
	BatchTuning { batch_size: 1000, delay_ms: 0 }
}

fn default_backfill() -> BatchTuning {
	BatchTuning { batch_size: 1, delay_ms: 0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenConfig {
	pub database_url: String,

	#[serde(default = "default_purge")]
	pub purge: BatchTuning,

	#[serde(default = "default_backfill")]
	pub backfill: BatchTuning,
}

impl Default for WardenConfig {
	fn default() -> Self {
		Self {
			database_url: "sqlite:warden.db".to_string(),
			purge: default_purge(),
			backfill: default_backfill(),
		}
	}
}

impl WardenConfig {
	/// Load from a TOML file, then apply environment overrides.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		let mut config: Self = toml::from_str(&contents)?;
		config.apply_env_overrides();
		Ok(config)
	}

	/// `WARDEN_DATABASE_URL` wins over the file, so deployments can point
	/// the same config at different databases.
	pub fn apply_env_overrides(&mut self) {
		if let Ok(url) = std::env::var("WARDEN_DATABASE_URL") {
			if !url.is_empty() {
				self.database_url = url;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_defaults() {
		let config = WardenConfig::default();
		assert_eq!(config.database_url, "sqlite:warden.db");
		assert_eq!(config.purge.batch_size, 1000);
		assert_eq!(config.backfill.batch_size, 1);
		assert_eq!(config.backfill.delay(), Duration::ZERO);
	}

	#[test]
	fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
			database_url = "sqlite:/var/lib/warden/warden.db"

			[purge]
			batch_size = 250
			delay_ms = 50
			"#
		)
		.unwrap();

		let config = WardenConfig::load(file.path()).unwrap();
		assert_eq!(config.database_url, "sqlite:/var/lib/warden/warden.db");
		assert_eq!(config.purge.batch_size, 250);
		assert_eq!(config.purge.delay(), Duration::from_millis(50));
		// Missing section falls back to its default.
		assert_eq!(config.backfill, BatchTuning { batch_size: 1, delay_ms: 0 });
	}

	#[test]
	fn test_missing_database_url_is_an_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[purge]\nbatch_size = 10\ndelay_ms = 0").unwrap();
		assert!(matches!(WardenConfig::load(file.path()), Err(ConfigError::Parse(_))));
	}
}
