//! Runtime configuration.

use crate::errors::ConfigError;
use crate::pipeline::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment variable read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "INFRAFLOW_";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
    /// Include the event target in each line.
    #[serde(default = "default_with_target")]
    pub with_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_with_target() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            with_target: default_with_target(),
        }
    }
}

impl LogConfig {
    /// Sets the default filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Configuration of a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which backends create per-task working directories.
    #[serde(default = "default_workdir_root")]
    pub workdir_root: PathBuf,
    /// Wall-clock limit for a whole run; unlimited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
    /// Retry policy for control-plane calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

fn default_workdir_root() -> PathBuf {
    std::env::temp_dir().join("infraflow")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workdir_root: default_workdir_root(),
            time_limit_secs: None,
            retry: RetryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the workdir root.
    #[must_use]
    pub fn with_workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workdir_root = root.into();
        self
    }

    /// Sets the run time limit.
    #[must_use]
    pub fn with_time_limit_secs(mut self, secs: u64) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Returns the run time limit.
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs)
    }

    /// Loads defaults overlaid with `INFRAFLOW_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads defaults overlaid with values from `lookup`.
    ///
    /// Recognized keys, each prefixed with [`ENV_PREFIX`]: `WORKDIR`,
    /// `TIME_LIMIT_SECS`, `RETRY_MAX_ATTEMPTS`, `RETRY_BASE_DELAY_MS`,
    /// `RETRY_MAX_DELAY_MS`, `LOG_LEVEL`, `LOG_JSON`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            let var = format!("{ENV_PREFIX}{key}");
            lookup(&var).map(|value| (var, value))
        };
        let mut config = Self::default();

        if let Some((_, value)) = get("WORKDIR") {
            config.workdir_root = PathBuf::from(value);
        }
        if let Some((var, value)) = get("TIME_LIMIT_SECS") {
            config.time_limit_secs = Some(parse(&var, &value)?);
        }
        if let Some((var, value)) = get("RETRY_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse(&var, &value)?;
        }
        if let Some((var, value)) = get("RETRY_BASE_DELAY_MS") {
            config.retry.base_delay_ms = parse(&var, &value)?;
        }
        if let Some((var, value)) = get("RETRY_MAX_DELAY_MS") {
            config.retry.max_delay_ms = parse(&var, &value)?;
        }
        if let Some((_, value)) = get("LOG_LEVEL") {
            config.log.level = value;
        }
        if let Some((var, value)) = get("LOG_JSON") {
            config.log.json = parse(&var, &value)?;
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}
