//! Service configuration, read from a TOML file.
//!
//! Every section and field has a default, so a file only needs to name the master contract. The
//! file path comes from the first command-line argument or `MARKETPLACE_SYNC_CONFIG`.

use crate::cell::Address;
use crate::model::OpCodes;
use crate::notify::NotificationConfig;
use crate::sync::{EngineConfig, RetryPolicy, RunnerConfig};
use crate::translate::TranslationConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "MARKETPLACE_SYNC_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("Invalid config: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub chain: ChainConfig,
	pub store: StoreConfig,
	pub sync: SyncConfig,
	pub notifications: NotificationsConfig,
	pub translation: TranslationSection,
	pub logging: LoggingConfig,
}

/// Chain RPC access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
	pub endpoint: String,
	pub api_key: Option<String>,
	/// Master (collection) contract, raw or user-friendly form.
	pub master_address: String,
	pub timeout_secs: u64,
	/// Order op code overrides, keyed by operation name (e.g. `complete_order`).
	pub order_ops: BTreeMap<String, u32>,
}

impl Default for ChainConfig {
	fn default() -> Self {
		Self {
			endpoint: "https://toncenter.com/api/v2".to_string(),
			api_key: None,
			master_address: String::new(),
			timeout_secs: 30,
			order_ops: BTreeMap::new(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
	pub path: PathBuf,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			path: PathBuf::from("marketplace-sync.db"),
		}
	}
}

/// Queue draining, change detection and the task runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	pub batch_size: usize,
	pub engine_interval_ms: u64,
	pub engine_busy_interval_ms: u64,
	pub detector_interval_ms: u64,
	/// Per-item retry delays in seconds, indexed by retry count.
	pub retry_steps_secs: Vec<u64>,
	pub backoff_initial_ms: u64,
	pub backoff_max_secs: u64,
	pub failure_threshold: u32,
	/// Rebuild the RPC client after this many consecutive transient failures.
	pub recycle_after: u32,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			batch_size: 20,
			engine_interval_ms: 10_000,
			engine_busy_interval_ms: 200,
			detector_interval_ms: 3_000,
			retry_steps_secs: vec![5, 15, 30, 60, 300, 900, 3600],
			backoff_initial_ms: 1_000,
			backoff_max_secs: 60,
			failure_threshold: 10,
			recycle_after: 5,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
	/// Webhook receiving order activity. Delivery is disabled when unset.
	pub webhook_url: Option<String>,
	/// Activity older than this is never delivered. Only used to initialise the stored cutoff.
	pub ignore_before: Option<DateTime<Utc>>,
	pub batch_size: usize,
	pub interval_ms: u64,
	pub busy_interval_ms: u64,
	pub timeout_secs: u64,
}

impl Default for NotificationsConfig {
	fn default() -> Self {
		Self {
			webhook_url: None,
			ignore_before: None,
			batch_size: 50,
			interval_ms: 30_000,
			busy_interval_ms: 500,
			timeout_secs: 10,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSection {
	/// Translation service. Translation is disabled when unset.
	pub endpoint: Option<String>,
	pub batch_size: usize,
	pub interval_secs: u64,
	pub busy_interval_ms: u64,
	pub timeout_secs: u64,
	/// Give up retrying one request after this long.
	pub max_elapsed_secs: u64,
}

impl Default for TranslationSection {
	fn default() -> Self {
		Self {
			endpoint: None,
			batch_size: 10,
			interval_secs: 60,
			busy_interval_ms: 1_000,
			timeout_secs: 30,
			max_elapsed_secs: 120,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
	/// `EnvFilter` directive used when `RUST_LOG` is not set.
	pub filter: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			filter: "info".to_string(),
		}
	}
}

impl Config {
	/// Config path from the first argument, else from `MARKETPLACE_SYNC_CONFIG`.
	pub fn path_from(mut args: impl Iterator<Item = String>, env: Option<String>) -> Option<PathBuf> {
		args.nth(1).or(env).map(PathBuf::from)
	}

	/// Load and validate a config file. Without a path, defaults are validated instead.
	pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
		let config = match path {
			Some(path) => {
				let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
					path: path.to_path_buf(),
					source,
				})?;
				Self::parse(&content)?
			}
			None => Self::default(),
		};
		config.validate()?;
		Ok(config)
	}

	pub fn parse(content: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(content)?)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.chain.master_address.is_empty() {
			return Err(ConfigError::Invalid("chain.master_address is required".to_string()));
		}
		self.master_address()?;
		self.retry_policy()?;
		self.op_codes()?;
		if self.sync.batch_size == 0 || self.notifications.batch_size == 0 || self.translation.batch_size == 0 {
			return Err(ConfigError::Invalid("batch sizes must be positive".to_string()));
		}
		Ok(())
	}

	/// Master address in raw form.
	pub fn master_address(&self) -> Result<String, ConfigError> {
		Address::parse(&self.chain.master_address)
			.map(|a| a.to_raw())
			.map_err(|e| ConfigError::Invalid(format!("chain.master_address: {}", e)))
	}

	pub fn chain_timeout(&self) -> Duration {
		Duration::from_secs(self.chain.timeout_secs)
	}

	pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
		let steps = self
			.sync
			.retry_steps_secs
			.iter()
			.map(|s| Duration::from_secs(*s))
			.collect();
		RetryPolicy::new(steps).map_err(|e| ConfigError::Invalid(format!("sync.retry_steps_secs: {}", e)))
	}

	pub fn op_codes(&self) -> Result<OpCodes, ConfigError> {
		OpCodes::with_overrides(&self.chain.order_ops)
			.map_err(|e| ConfigError::Invalid(format!("chain.order_ops: {}", e)))
	}

	pub fn engine(&self) -> Result<EngineConfig, ConfigError> {
		Ok(EngineConfig {
			batch_size: self.sync.batch_size,
			default_interval: Duration::from_millis(self.sync.engine_interval_ms),
			busy_interval: Duration::from_millis(self.sync.engine_busy_interval_ms),
			op_codes: self.op_codes()?,
		})
	}

	pub fn detector_interval(&self) -> Duration {
		Duration::from_millis(self.sync.detector_interval_ms)
	}

	pub fn runner(&self) -> RunnerConfig {
		RunnerConfig {
			initial_backoff: Duration::from_millis(self.sync.backoff_initial_ms),
			max_backoff: Duration::from_secs(self.sync.backoff_max_secs),
			failure_threshold: self.sync.failure_threshold,
			recycle_after: self.sync.recycle_after,
		}
	}

	pub fn notification(&self) -> NotificationConfig {
		NotificationConfig {
			batch_size: self.notifications.batch_size,
			default_interval: Duration::from_millis(self.notifications.interval_ms),
			busy_interval: Duration::from_millis(self.notifications.busy_interval_ms),
		}
	}

	pub fn translation(&self) -> TranslationConfig {
		TranslationConfig {
			batch_size: self.translation.batch_size,
			default_interval: Duration::from_secs(self.translation.interval_secs),
			busy_interval: Duration::from_millis(self.translation.busy_interval_ms),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::OrderOp;

	const MASTER: &str = "0:1111111111111111111111111111111111111111111111111111111111111111";

	#[test]
	fn test_defaults() {
		let config = Config::parse(&format!("[chain]\nmaster_address = \"{MASTER}\"\n")).unwrap();
		config.validate().unwrap();
		assert_eq!(config.chain.endpoint, "https://toncenter.com/api/v2");
		assert_eq!(config.store.path, PathBuf::from("marketplace-sync.db"));
		assert_eq!(config.engine().unwrap().batch_size, 20);
		assert_eq!(config.detector_interval(), Duration::from_secs(3));
		assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
		assert!(config.notifications.webhook_url.is_none());
		assert!(config.translation.endpoint.is_none());
		assert_eq!(config.logging.filter, "info");
		assert_eq!(config.master_address().unwrap(), MASTER);
	}

	#[test]
	fn test_overrides() {
		let config = Config::parse(&format!(
			r#"
[chain]
master_address = "{MASTER}"
api_key = "secret"


[chain.order_ops]
complete_order = 66

[sync]
batch_size = 5
retry_steps_secs = [1, 2, 2]

[notifications]
webhook_url = "http://localhost:9000/hook"
ignore_before = "2024-01-01T00:00:00Z"
"#
		))
		.unwrap();
		config.validate().unwrap();
		assert_eq!(config.chain.api_key.as_deref(), Some("secret"));
		assert_eq!(config.engine().unwrap().batch_size, 5);
		assert_eq!(config.retry_policy().unwrap().steps().len(), 3);
		assert_eq!(config.engine().unwrap().op_codes.op(66), OrderOp::CompleteOrder);
		assert_eq!(
			config.notifications.ignore_before.map(|t| t.timestamp()),
			Some(1_704_067_200)
		);
	}

	#[test]
	fn test_invalid_configs() {
		assert!(matches!(Config::default().validate(), Err(ConfigError::Invalid(_))));

		let bad_steps = Config::parse(&format!(
			"[chain]\nmaster_address = \"{MASTER}\"\n[sync]\nretry_steps_secs = [30, 5]\n"
		))
		.unwrap();
		assert!(bad_steps.validate().is_err());

		let bad_op = Config::parse(&format!(
			"[chain]\nmaster_address = \"{MASTER}\"\n[chain.order_ops]\nrefund = 1\n"
		))
		.unwrap();
		assert!(matches!(bad_op.validate(), Err(ConfigError::Invalid(_))));

		let bad_address = Config::parse("[chain]\nmaster_address = \"nope\"\n").unwrap();
		assert!(bad_address.validate().is_err());

		assert!(matches!(Config::parse("[sync]\nbatch_size = \"x\"\n"), Err(ConfigError::Parse(_))));
	}

	#[test]
	fn test_path_resolution() {
		let args = || vec!["marketplace-sync".to_string(), "a.toml".to_string()].into_iter();
		assert_eq!(Config::path_from(args(), Some("b.toml".to_string())), Some(PathBuf::from("a.toml")));
		let no_args = || vec!["marketplace-sync".to_string()].into_iter();
		assert_eq!(Config::path_from(no_args(), Some("b.toml".to_string())), Some(PathBuf::from("b.toml")));
		assert_eq!(Config::path_from(no_args(), None), None);
	}
}
