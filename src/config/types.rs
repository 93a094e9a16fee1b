//! Configuration types for wg-bridge
//!
//! Configuration is loaded from JSON files and validated before a
//! [`Bridge`](crate::Bridge) is built from it.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SessionError};

/// Size of a `WireGuard` handshake initiation, the largest control message.
///
/// The output buffer must always be able to hold one.
pub const MIN_OUTPUT_CAPACITY: usize = 148;

/// Largest output buffer the bridge accepts (one UDP datagram)
pub const MAX_OUTPUT_CAPACITY: usize = 65535;

/// Default output buffer capacity in bytes
pub const DEFAULT_OUTPUT_CAPACITY: usize = 2000;

/// Default keep-alive interval in seconds
pub const DEFAULT_KEEP_ALIVE: u16 = 25;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Output buffer configuration
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Session construction policy
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

impl BridgeConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.buffer.validate()?;
        self.session.validate()?;
        self.log.validate()?;
        Ok(())
    }

    /// Set the output buffer capacity
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer.capacity = capacity;
        self
    }

    /// Set the peer index policy
    #[must_use]
    pub fn with_index_policy(mut self, policy: IndexPolicy) -> Self {
        self.session.index_policy = policy;
        self
    }
}

/// Output buffer configuration
///
/// Every data-plane call hands the engine a zeroed buffer of this size.
/// The right ceiling depends on the transport MTU, so it is not baked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BufferConfig {
    /// Output buffer capacity in bytes
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl BufferConfig {
    /// Validate buffer configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < MIN_OUTPUT_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "buffer.capacity must be at least {MIN_OUTPUT_CAPACITY} bytes, got {}",
                self.capacity
            )));
        }
        if self.capacity > MAX_OUTPUT_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "buffer.capacity must be at most {MAX_OUTPUT_CAPACITY} bytes, got {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_OUTPUT_CAPACITY,
        }
    }
}

/// Policy applied to the peer index at session construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Accept any value that fits in an `i32`; the engine decides the rest
    #[default]
    AnyI32,
    /// Additionally reject values below 1
    PositiveOnly,
}

impl IndexPolicy {
    /// Check an index against this policy
    ///
    /// Returns the index as the engine sees it: the two's complement bit
    /// pattern of the `i32`, as a `u32`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidIndex` if the value is rejected.
    pub fn check(self, index: i64) -> Result<u32, SessionError> {
        let value = i32::try_from(index)
            .map_err(|_| SessionError::index(index, "must fit in a signed 32-bit integer"))?;

        if self == Self::PositiveOnly && value < 1 {
            return Err(SessionError::index(index, "must be at least 1"));
        }

        #[allow(clippy::cast_sign_loss)]
        Ok(value as u32)
    }

    /// Configuration name of this policy
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnyI32 => "any_i32",
            Self::PositiveOnly => "positive_only",
        }
    }
}

impl std::str::FromStr for IndexPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any_i32" | "any" => Ok(Self::AnyI32),
            "positive_only" | "positive" => Ok(Self::PositiveOnly),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown index policy '{other}', expected any_i32 or positive_only"
            ))),
        }
    }
}

impl std::fmt::Display for IndexPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session construction configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How peer indices are validated
    #[serde(default)]
    pub index_policy: IndexPolicy,

    /// Keep-alive used by [`Peer`](crate::peer::Peer) when none is given
    #[serde(default = "default_keep_alive")]
    pub default_keep_alive: u16,
}

impl SessionConfig {
    /// Validate session configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_keep_alive == 0 {
            return Err(ConfigError::ValidationError(
                "session.default_keep_alive must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            index_policy: IndexPolicy::default(),
            default_keep_alive: DEFAULT_KEEP_ALIVE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include target (module path)
    #[serde(default = "default_true")]
    pub target: bool,
}

impl LogConfig {
    /// Validate logging configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown log level '{other}'"
                )))
            }
        }
        match self.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown log format '{other}', expected json or text"
            ))),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_capacity() -> usize {
    DEFAULT_OUTPUT_CAPACITY
}

const fn default_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}
