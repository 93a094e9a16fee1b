//! Error types for wg-bridge
//!
//! Errors are split by subsystem and folded into [`BridgeError`]. Every
//! variant falls into one of three buckets that callers can query:
//!
//! - **user errors**: the caller passed something malformed and can fix it
//! - **contract violations**: the tunnel engine returned something outside
//!   its documented contract
//! - **environment errors**: configuration files, registry state

use std::io;

use thiserror::Error;

/// Top-level error type for wg-bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Session construction and argument validation errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Tunnel engine contract violations
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Reference registry lookup errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Key utility errors
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Configuration errors (file parsing, validation)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// Whether the caller can fix this error by changing its input
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Session(e) => e.is_validation(),
            Self::Key(_) => true,
            Self::Engine(_) | Self::Registry(_) | Self::Config(_) => false,
        }
    }

    /// Whether the tunnel engine broke its side of the contract
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

/// Tunnel session errors
///
/// Validation variants are raised before the engine is touched, in the
/// order the constructor checks its arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Private key is not a base64 encoded 32-byte X25519 key
    #[error("Invalid private key input")]
    InvalidPrivateKey,

    /// Peer public key is not a base64 encoded 32-byte X25519 key
    #[error("Invalid public key input")]
    InvalidPublicKey,

    /// Non-empty pre-shared key is not a base64 encoded 32-byte key
    #[error("Invalid pre-shared key input")]
    InvalidPresharedKey,

    /// Keep-alive interval outside 1..=65535 seconds
    #[error("Invalid keep-alive {0}: must be between 1 and 65535 seconds")]
    InvalidKeepAlive(i64),

    /// Peer index rejected by the configured index policy
    #[error("Invalid index {value}: {reason}")]
    InvalidIndex { value: i64, reason: &'static str },

    /// Engine refused to create a tunnel for otherwise valid arguments
    #[error("Cannot create tunnel")]
    TunnelCreationFailed,
}

impl SessionError {
    /// Whether this error came from argument validation
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::TunnelCreationFailed)
    }

    /// Create an index error
    pub const fn index(value: i64, reason: &'static str) -> Self {
        Self::InvalidIndex { value, reason }
    }
}

/// Tunnel engine contract violations
///
/// These are never produced by bad caller input. They mean the engine
/// reported an outcome the bridge has no mapping for.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Outcome tag outside the closed set of known tags
    #[error("Engine returned unknown outcome tag {tag}")]
    UnknownTag { tag: u32 },

    /// Engine reported more output than the buffer can hold
    #[error("Engine reported {size} bytes for a {capacity}-byte output buffer")]
    LengthOverflow { size: usize, capacity: usize },
}

/// Reference registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No entry stored under the key
    #[error("Reference not found: {key}")]
    NotFound { key: String },

    /// Entry exists but holds a handle of another type
    #[error("Reference {key} does not hold a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

impl RegistryError {
    /// Create a not-found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }
}

/// Key utility errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Raw key buffer is not exactly 32 bytes
    #[error("Key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Key string is not valid base64
    #[error("Invalid base64 key: {0}")]
    InvalidBase64(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found or inaccessible
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Validation error (invalid values)
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Environment variable error
    #[error("Environment variable error: {name}: {reason}")]
    EnvError { name: String, reason: String },

    /// I/O error while reading config
    #[error("I/O error reading configuration: {0}")]
    IoError(#[from] io::Error),
}
