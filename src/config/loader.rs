//! Configuration loading
//!
//! This module handles loading configuration from files and environment variables.

use std::path::Path;

use tracing::{debug, info};

use super::types::BridgeConfig;
use crate::error::ConfigError;

/// Environment variable overriding `buffer.capacity`
pub const ENV_BUFFER_CAPACITY: &str = "WG_BRIDGE_BUFFER_CAPACITY";

/// Environment variable overriding `session.index_policy`
pub const ENV_INDEX_POLICY: &str = "WG_BRIDGE_INDEX_POLICY";

/// Environment variable overriding `log.level`
pub const ENV_LOG_LEVEL: &str = "WG_BRIDGE_LOG_LEVEL";

/// Load configuration from a JSON file
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: impl AsRef<Path>) -> Result<BridgeConfig, ConfigError> {
    let path = path.as_ref();

    debug!("Loading configuration from {:?}", path);

    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let contents = std::fs::read_to_string(path)?;

    let config: BridgeConfig = serde_json::from_str(&contents).map_err(|e| {
        ConfigError::ParseError(format!("Failed to parse JSON: {e} at {path:?}"))
    })?;

    config.validate()?;

    info!(
        "Configuration loaded: buffer capacity={}, index policy={}",
        config.buffer.capacity, config.session.index_policy
    );

    Ok(config)
}

/// Load configuration from a JSON string
///
/// # Errors
///
/// Returns `ConfigError` if parsing or validation fails.
pub fn load_config_str(json: &str) -> Result<BridgeConfig, ConfigError> {
    let config: BridgeConfig =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.validate()?;

    Ok(config)
}

/// Load configuration with environment variable overrides
///
/// Environment variables:
/// - `WG_BRIDGE_BUFFER_CAPACITY`: Override output buffer capacity
/// - `WG_BRIDGE_INDEX_POLICY`: Override peer index policy
/// - `WG_BRIDGE_LOG_LEVEL`: Override log level
///
/// # Errors
///
/// Returns `ConfigError` if loading, parsing, or an override fails.
pub fn load_config_with_env(path: impl AsRef<Path>) -> Result<BridgeConfig, ConfigError> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Apply overrides from a variable lookup, then re-validate
///
/// `lookup` returns the value of a variable if it is set.
///
/// # Errors
///
/// Returns `ConfigError::EnvError` for unparseable values and
/// `ConfigError::ValidationError` if the result no longer validates.
pub fn apply_env_overrides<F>(config: &mut BridgeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(capacity) = lookup(ENV_BUFFER_CAPACITY) {
        config.buffer.capacity = capacity.trim().parse().map_err(|_| ConfigError::EnvError {
            name: ENV_BUFFER_CAPACITY.into(),
            reason: format!("Invalid number: {capacity}"),
        })?;
        debug!("Buffer capacity overridden to {}", config.buffer.capacity);
    }

    if let Some(policy) = lookup(ENV_INDEX_POLICY) {
        config.session.index_policy = policy.parse().map_err(|_| ConfigError::EnvError {
            name: ENV_INDEX_POLICY.into(),
            reason: format!("Invalid index policy: {policy}"),
        })?;
        debug!("Index policy overridden to {}", config.session.index_policy);
    }

    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.log.level = level;
        debug!("Log level overridden to {}", config.log.level);
    }

    config.validate()
}

/// Create a default configuration file at the given path
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be written.
pub fn create_default_config(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let config = BridgeConfig::default();
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {e}")))?;

    std::fs::write(path, json)?;
    Ok(())
}
