//! Monitor options and layered application configuration.
//!
//! # Configuration Hierarchy
//!
//! The binary loads configuration in this order (later overrides
//! earlier):
//!
//! 1. **Compiled defaults**: hardcoded in the `Default`/serde
//!    implementations below.
//! 2. **Config file**: TOML file passed on the command line.
//! 3. **Environment variables**: `CHAINWATCH_*` overrides
//!    (`CHAINWATCH_MONITOR__WITH_LOGS=true`,
//!    `CHAINWATCH_PROVIDER__URL=…`).
//!
//! Configuration is validated at load time; zero intervals, zero
//! retention, and malformed topic hashes are rejected rather than
//! failing later inside the run loop.
//!
//! # Example
//!
//! ```toml
//! [provider]
//! url = "https://eth-mainnet.example.com"
//!
//! [monitor]
//! polling_interval_ms = 1000
//! block_retention_limit = 200
//! with_logs = true
//! log_topics = ["0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"]
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use crate::types::TopicHash;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The underlying loader failed (missing file, bad TOML, bad env).
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Options controlling the chain monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Base poll cadence in milliseconds. Defaults to `1000`.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// Per-RPC deadline in seconds. Defaults to `20`.
    #[serde(default = "default_rpc_timeout_seconds")]
    pub rpc_timeout_seconds: u64,

    /// Block number to begin monitoring from. `None` starts at the
    /// provider's latest block; a negative value starts that many
    /// blocks behind the latest.
    #[serde(default)]
    pub start_block_number: Option<i64>,

    /// When true, the chain must be seeded via
    /// [`Monitor::bootstrap`](crate::monitor::Monitor::bootstrap)
    /// before `run`; takes precedence over `start_block_number`.
    #[serde(default)]
    pub bootstrap: bool,

    /// Number of blocks to trail behind the head before broadcasting
    /// to subscribers. Defaults to `0` (publish immediately).
    #[serde(default)]
    pub trail_num_blocks_behind_head: u64,

    /// Number of blocks kept on the canonical chain cache. The
    /// effective retention adds the trail distance. Defaults to `200`.
    #[serde(default = "default_block_retention_limit")]
    pub block_retention_limit: usize,

    /// Attach event logs to published blocks.
    #[serde(default)]
    pub with_logs: bool,

    /// Topic hashes to filter logs by, as `0x`-prefixed hex. Empty
    /// means all logs.
    #[serde(default)]
    pub log_topics: Vec<String>,

    /// Raise the binary's log level to debug.
    #[serde(default)]
    pub debug_logging: bool,
}

fn default_polling_interval_ms() -> u64 {
    1000
}

fn default_rpc_timeout_seconds() -> u64 {
    20
}

fn default_block_retention_limit() -> usize {
    200
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: default_polling_interval_ms(),
            rpc_timeout_seconds: default_rpc_timeout_seconds(),
            start_block_number: None,
            bootstrap: false,
            trail_num_blocks_behind_head: 0,
            block_retention_limit: default_block_retention_limit(),
            with_logs: false,
            log_topics: Vec::new(),
            debug_logging: false,
        }
    }
}

impl MonitorConfig {
    /// Base poll cadence.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Per-RPC deadline.
    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }

    /// Cache depth actually retained: the configured limit plus the
    /// trail distance, so trailed blocks never force evictions of
    /// blocks subscribers have yet to see.
    #[must_use]
    pub fn effective_retention(&self) -> usize {
        self.block_retention_limit
            .saturating_add(self.trail_num_blocks_behind_head as usize)
    }

    /// Parses `log_topics` into hashes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for anything that is not a
    /// 32-byte hex string.
    pub fn log_topic_hashes(&self) -> Result<Vec<TopicHash>, ConfigError> {
        self.log_topics
            .iter()
            .map(|topic| {
                let stripped = topic.strip_prefix("0x").unwrap_or(topic);
                let mut hash = [0u8; 32];
                hex::decode_to_slice(stripped, &mut hash)
                    .map_err(|_| ConfigError::Invalid(format!("bad log topic: {topic}")))?;
                Ok(hash)
            })
            .collect()
    }

    /// Validates the option set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for zero intervals or zero
    /// retention, and for malformed topic hashes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "polling_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.rpc_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "rpc_timeout_seconds must be non-zero".to_string(),
            ));
        }
        if self.block_retention_limit == 0 {
            return Err(ConfigError::Invalid(
                "block_retention_limit must be non-zero".to_string(),
            ));
        }
        self.log_topic_hashes()?;
        Ok(())
    }
}

/// Connection settings for the upstream JSON-RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// HTTP(S) endpoint URL.
    pub url: String,
}

/// Logging settings consumed by the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level: `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Full application configuration for the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub provider: ProviderSettings,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from an optional TOML file plus
    /// `CHAINWATCH_*` environment overrides, then validates it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("CHAINWATCH").separator("__"))
            .build()?;
        let app: Self = settings.try_deserialize()?;
        app.monitor.validate()?;
        Ok(app)
    }

    /// Loads configuration from a TOML string; used by embedders and
    /// tests.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        let app: Self = settings.try_deserialize()?;
        app.monitor.validate()?;
        Ok(app)
    }
}
