//! wg-bridge: `WireGuard` tunnel sessions over an external engine
//!
//! This crate exposes an already-implemented `WireGuard` engine (boringtun
//! by default) to a host as tunnel session objects plus a handful of key
//! utilities. It never opens a socket; every operation takes and returns
//! byte buffers.
//!
//! # Features
//!
//! - **Tunnel Sessions**: validated construction, encapsulate, decapsulate,
//!   timers and forced handshakes, release on drop
//! - **Result Protocol**: every call yields a [`ResultEnvelope`] telling
//!   the host to do nothing, send to the network, or deliver to the tunnel
//! - **Key Utilities**: X25519 key generation, derivation and validation
//! - **Log Forwarding**: engine log lines routed to a host handler
//! - **Peer Routing**: endpoint tracking and allowed-IP matching
//!
//! # Architecture
//!
//! ```text
//! host → Bridge → TunnelSession → TunnelEngine (boringtun)
//!          ↓            ↓
//!   ReferenceRegistry  dispatch → ResultEnvelope
//!          ↓
//!   log handler ← forward_engine_log ← engine
//! ```
//!
//! # Quick Start
//!
//! ```
//! use wg_bridge::config::BridgeConfig;
//! use wg_bridge::{Bridge, ResultStatus};
//!
//! let bridge = Bridge::boringtun(BridgeConfig::default()).unwrap();
//! let pair = bridge.generate_key_pair();
//! let peer = bridge.generate_key_pair();
//!
//! let mut session = bridge
//!     .create_session(&pair.private_key, &peer.public_key, "", 25, 1)
//!     .unwrap();
//! let envelope = session.tick().unwrap();
//! assert_ne!(envelope.status(), ResultStatus::Error);
//! ```
//!
//! # Modules
//!
//! - [`bridge`]: Host-facing entry point
//! - [`config`]: Configuration types and loading
//! - [`engine`]: Engine contract, boringtun engine, scripted engine
//! - [`error`]: Error types
//! - [`keys`]: Key utilities
//! - [`logging`]: Engine log forwarding
//! - [`peer`]: Peer routing helper
//! - [`registry`]: Reference registry
//! - [`tunnel`]: Tunnel sessions and result dispatch

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod logging;
pub mod peer;
pub mod registry;
pub mod tunnel;

// Re-export commonly used types at the crate root
pub use bridge::{Bridge, SESSION_CLASS_KEY};
pub use config::BridgeConfig;
pub use engine::{BoringtunEngine, TunnelEngine};
pub use error::{BridgeError, ConfigError, EngineError, KeyError, RegistryError, SessionError};
pub use keys::{
    check_base64_encoded_x25519_key, generate_secret_key, generate_secret_key_base64,
    public_key_from, KeyPair,
};
pub use logging::{set_logging_function, LOG_HANDLER_KEY};
pub use peer::{Peer, Route};
pub use registry::ReferenceRegistry;
pub use tunnel::{ResultEnvelope, ResultStatus, TunnelSession};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
