//! Configuration module for wg-bridge
//!
//! This module provides configuration types and loading utilities.
//!
//! # Example
//!
//! ```no_run
//! use wg_bridge::config::load_config;
//!
//! let config = load_config("/etc/wg-bridge/config.json").unwrap();
//! println!("Output buffer: {} bytes", config.buffer.capacity);
//! ```

mod loader;
mod types;

pub use loader::{
    apply_env_overrides, create_default_config, load_config, load_config_str,
    load_config_with_env, ENV_BUFFER_CAPACITY, ENV_INDEX_POLICY, ENV_LOG_LEVEL,
};
pub use types::{
    BridgeConfig, BufferConfig, IndexPolicy, LogConfig, SessionConfig, DEFAULT_KEEP_ALIVE,
    DEFAULT_OUTPUT_CAPACITY, MAX_OUTPUT_CAPACITY, MIN_OUTPUT_CAPACITY,
};
