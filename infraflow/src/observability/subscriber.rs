//! Global tracing subscriber setup.

use crate::config::LogConfig;
use crate::errors::ConfigError;
use tracing_subscriber::EnvFilter;

/// Builds the event filter: `RUST_LOG` when set, otherwise `config.level`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if the configured directive does not parse.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|_| ConfigError::InvalidValue {
        var: "log.level".to_string(),
        value: config.level.clone(),
    })
}

/// Installs a global `fmt` subscriber.
///
/// # Errors
///
/// Returns [`ConfigError::Subscriber`] if a global subscriber is already set.
pub fn init_tracing(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::Subscriber(e.to_string()))
}
