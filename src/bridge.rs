//! Host-facing bridge
//!
//! [`Bridge`] is the entry point a host binds to. It owns the engine and
//! the [`ReferenceRegistry`], registers the session class on construction,
//! and exposes session creation, instance checks, key utilities and log
//! forwarding.
//!
//! # Example
//!
//! ```
//! use wg_bridge::config::BridgeConfig;
//! use wg_bridge::{Bridge, ResultStatus};
//!
//! let bridge = Bridge::boringtun(BridgeConfig::default()).unwrap();
//! let private_key = bridge.generate_secret_key_base64();
//! let peer = bridge.generate_secret_key_base64();
//! let peer_public = bridge.public_key_from_base64(&peer).unwrap();
//!
//! let mut session = bridge
//!     .create_session(&private_key, &peer_public, "", 25, 1)
//!     .unwrap();
//! let envelope = session.force_handshake().unwrap();
//! assert_eq!(envelope.status(), ResultStatus::WriteToNetwork);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::BridgeConfig;
use crate::engine::{BoringtunEngine, TunnelEngine, KEY_LEN};
use crate::error::{BridgeError, KeyError, RegistryError};
use crate::keys::{self, KeyPair};
use crate::logging;
use crate::registry::{ContextId, ReferenceRegistry};
use crate::tunnel::{SessionClass, TunnelSession};

/// Registry key of the session class
pub const SESSION_CLASS_KEY: &str = "WireguardTunnel";

/// Context IDs handed to bridges
static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Bridge between a host and a tunnel engine
pub struct Bridge<E: TunnelEngine> {
    engine: Arc<E>,
    registry: Arc<ReferenceRegistry>,
    context: ContextId,
}

impl Bridge<BoringtunEngine> {
    /// Bridge backed by boringtun
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Config` if the configuration is invalid.
    pub fn boringtun(config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::new(Arc::new(BoringtunEngine::new()), config)
    }
}

impl<E: TunnelEngine> Bridge<E> {
    /// Create a bridge and register its session class
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Config` if the configuration is invalid.
    pub fn new(engine: Arc<E>, config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;

        let context = ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed));
        let registry = Arc::new(ReferenceRegistry::new());
        info!(
            "Bridge {context} initialized: engine={}, buffer={} bytes, index policy={}",
            engine.name(),
            config.buffer.capacity,
            config.session.index_policy
        );

        let class = Arc::new(SessionClass::new(Arc::clone(&engine), config));
        registry.set(SESSION_CLASS_KEY, class, context);

        Ok(Self {
            engine,
            registry,
            context,
        })
    }

    /// Engine driven by this bridge
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Registry owned by this bridge
    pub fn registry(&self) -> &Arc<ReferenceRegistry> {
        &self.registry
    }

    /// Context ID of this bridge
    pub const fn context(&self) -> ContextId {
        self.context
    }

    /// Session class registered by this bridge
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` if the class entry was removed or replaced
    /// with something else.
    pub fn session_class(&self) -> Result<Arc<SessionClass<E>>, RegistryError> {
        self.registry.get_as::<SessionClass<E>>(SESSION_CLASS_KEY)
    }

    /// Create a tunnel session
    ///
    /// See [`TunnelSession::new`] for the argument rules.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Session` for invalid arguments or an engine
    /// refusal, `BridgeError::Registry` if the session class is missing.
    pub fn create_session(
        &self,
        private_key: &str,
        peer_public_key: &str,
        preshared_key: &str,
        keep_alive: i64,
        index: i64,
    ) -> Result<TunnelSession<E>, BridgeError> {
        let class = self.session_class()?;
        let session = TunnelSession::new(
            &class,
            private_key,
            peer_public_key,
            preshared_key,
            keep_alive,
            index,
        )?;
        Ok(session)
    }

    /// Whether `session` was created by this bridge
    pub fn owns(&self, session: &TunnelSession<E>) -> bool {
        self.session_class()
            .is_ok_and(|class| Arc::ptr_eq(&class, session.class()))
    }

    /// Route engine log lines to `handler`
    ///
    /// Returns whether the engine accepted the sink.
    pub fn set_logging_function<F>(&self, handler: F) -> bool
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        logging::set_logging_function(
            &self.registry,
            self.engine.as_ref(),
            Arc::new(handler),
            self.context,
        )
    }

    /// Generate a raw private key
    pub fn generate_secret_key(&self) -> [u8; KEY_LEN] {
        keys::generate_secret_key(self.engine.as_ref())
    }

    /// Generate a base64 private key
    pub fn generate_secret_key_base64(&self) -> String {
        keys::generate_secret_key_base64(self.engine.as_ref())
    }

    /// Generate a base64 key pair
    pub fn generate_key_pair(&self) -> KeyPair {
        keys::generate_key_pair(self.engine.as_ref())
    }

    /// Derive the base64 public key of a raw private key
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidKeyLength` unless the key is 32 bytes.
    pub fn public_key_from(&self, private_key: &[u8]) -> Result<String, KeyError> {
        keys::public_key_from(self.engine.as_ref(), private_key)
    }

    /// Derive the base64 public key of a base64 private key
    ///
    /// # Errors
    ///
    /// Returns `KeyError` if the key does not decode to 32 bytes.
    pub fn public_key_from_base64(&self, private_key: &str) -> Result<String, KeyError> {
        keys::public_key_from_base64(self.engine.as_ref(), private_key)
    }

    /// Whether `key` is a base64 encoded X25519 key
    pub fn check_base64_encoded_x25519_key(&self, key: &str) -> bool {
        keys::check_base64_encoded_x25519_key(self.engine.as_ref(), key)
    }
}

impl<E: TunnelEngine> fmt::Debug for Bridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("engine", &self.engine.name())
            .field("context", &self.context)
            .field("registry", &self.registry)
            .finish()
    }
}
