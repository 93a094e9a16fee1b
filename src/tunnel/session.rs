//! Tunnel sessions
//!
//! A [`TunnelSession`] owns exactly one engine tunnel. Construction
//! validates every argument before the engine is touched; the data-plane
//! operations zero a fixed-size output buffer, call the engine and classify
//! the outcome with [`dispatch`](super::dispatch::dispatch).
//!
//! Sessions are created through a [`SessionClass`], which carries the
//! engine and configuration they share. The class is what a
//! [`Bridge`](crate::Bridge) keeps in its registry for instance checks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::dispatch::{dispatch, OutputBuffer, ResultEnvelope};
use super::handle::OwnedHandle;
use crate::config::BridgeConfig;
use crate::engine::{RawOutcome, TunnelEngine, TunnelParams, TunnelStats};
use crate::error::{EngineError, SessionError};

/// Session IDs, unique for the life of the process
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Engine and configuration shared by a family of sessions
pub struct SessionClass<E: TunnelEngine> {
    engine: Arc<E>,
    config: BridgeConfig,
}

impl<E: TunnelEngine> SessionClass<E> {
    /// Create a session class
    pub fn new(engine: Arc<E>, config: BridgeConfig) -> Self {
        Self { engine, config }
    }

    /// Engine used by sessions of this class
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Configuration applied to sessions of this class
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl<E: TunnelEngine> fmt::Debug for SessionClass<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClass")
            .field("engine", &self.engine.name())
            .field("config", &self.config)
            .finish()
    }
}

/// One `WireGuard` tunnel
///
/// The session is the only owner of its engine handle. Dropping it, or
/// calling [`close`](Self::close), releases the handle exactly once.
pub struct TunnelSession<E: TunnelEngine> {
    id: u64,
    private_key: String,
    peer_public_key: String,
    preshared_key: Option<String>,
    keep_alive: u16,
    index: u32,
    class: Arc<SessionClass<E>>,
    handle: OwnedHandle<E>,
    output: OutputBuffer,
}

impl<E: TunnelEngine> TunnelSession<E> {
    /// Validate the arguments and create the engine tunnel
    ///
    /// An empty `preshared_key` means no pre-shared key. `keep_alive` is in
    /// seconds and must be in `1..=65535`. `index` is checked against the
    /// class's [`IndexPolicy`](crate::config::IndexPolicy).
    ///
    /// # Errors
    ///
    /// Returns the first failing check, in argument order, or
    /// `SessionError::TunnelCreationFailed` if the engine refuses.
    pub fn new(
        class: &Arc<SessionClass<E>>,
        private_key: &str,
        peer_public_key: &str,
        preshared_key: &str,
        keep_alive: i64,
        index: i64,
    ) -> Result<Self, SessionError> {
        let engine = class.engine();

        if !engine.check_base64_key(private_key) {
            return Err(SessionError::InvalidPrivateKey);
        }
        if !engine.check_base64_key(peer_public_key) {
            return Err(SessionError::InvalidPublicKey);
        }
        let preshared_key = if preshared_key.is_empty() {
            None
        } else if engine.check_base64_key(preshared_key) {
            Some(preshared_key.to_string())
        } else {
            return Err(SessionError::InvalidPresharedKey);
        };
        let keep_alive = u16::try_from(keep_alive)
            .ok()
            .filter(|&k| k >= 1)
            .ok_or(SessionError::InvalidKeepAlive(keep_alive))?;
        let index = class.config().session.index_policy.check(index)?;

        let params = TunnelParams {
            private_key,
            peer_public_key,
            preshared_key: preshared_key.as_deref(),
            keep_alive,
            index,
        };
        let Some(handle) = engine.new_tunnel(&params) else {
            warn!("{} engine refused to create tunnel (index {index})", engine.name());
            return Err(SessionError::TunnelCreationFailed);
        };

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Created tunnel session {id} (index {index}, keep-alive {keep_alive}s, psk {})",
            preshared_key.is_some()
        );

        Ok(Self {
            id,
            private_key: private_key.to_string(),
            peer_public_key: peer_public_key.to_string(),
            preshared_key,
            keep_alive,
            index,
            class: Arc::clone(class),
            handle: OwnedHandle::new(Arc::clone(engine), handle),
            output: OutputBuffer::new(class.config().buffer.capacity),
        })
    }

    /// Process-unique session ID
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Own private key as supplied (base64)
    #[must_use]
    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    /// Peer public key as supplied (base64)
    #[must_use]
    pub fn peer_public_key(&self) -> &str {
        &self.peer_public_key
    }

    /// Pre-shared key, if one was given
    #[must_use]
    pub fn preshared_key(&self) -> Option<&str> {
        self.preshared_key.as_deref()
    }

    /// Keep-alive interval in seconds
    #[must_use]
    pub const fn keep_alive(&self) -> u16 {
        self.keep_alive
    }

    /// Peer index as handed to the engine
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Class this session was created from
    #[must_use]
    pub fn class(&self) -> &Arc<SessionClass<E>> {
        &self.class
    }

    /// Output buffer capacity in bytes
    #[must_use]
    pub fn output_capacity(&self) -> usize {
        self.output.capacity()
    }

    /// Encapsulate an outbound IP packet
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn write(&mut self, packet: &[u8]) -> Result<ResultEnvelope, EngineError> {
        self.run("write", |engine, handle, dst| engine.write(handle, packet, dst))
    }

    /// Decapsulate a datagram received from the network
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn read(&mut self, datagram: &[u8]) -> Result<ResultEnvelope, EngineError> {
        self.run("read", |engine, handle, dst| engine.read(handle, datagram, dst))
    }

    /// Drive the tunnel timers
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn tick(&mut self) -> Result<ResultEnvelope, EngineError> {
        self.run("tick", |engine, handle, dst| engine.tick(handle, dst))
    }

    /// Start a handshake now
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn force_handshake(&mut self) -> Result<ResultEnvelope, EngineError> {
        self.run("force_handshake", |engine, handle, dst| {
            engine.force_handshake(handle, dst)
        })
    }

    /// Tunnel counters
    #[must_use]
    pub fn stats(&self) -> TunnelStats {
        self.handle.engine().stats(self.handle.get())
    }

    /// Close the session and release its tunnel
    pub fn close(self) {
        debug!("Closing tunnel session {}", self.id);
    }

    fn run<F>(&mut self, op: &'static str, call: F) -> Result<ResultEnvelope, EngineError>
    where
        F: FnOnce(&E, &mut E::Handle, &mut [u8]) -> RawOutcome,
    {
        let dst = self.output.prepare();
        let (engine, handle) = self.handle.parts_mut();
        let outcome = call(engine, handle, dst);

        match dispatch(outcome, self.output.as_slice()) {
            Ok(envelope) => {
                trace!(
                    "Session {} {op}: {} ({} bytes)",
                    self.id,
                    envelope.status(),
                    envelope.len()
                );
                Ok(envelope)
            }
            Err(e) => {
                warn!("Session {} {op}: {e}", self.id);
                Err(e)
            }
        }
    }
}

impl<E: TunnelEngine> fmt::Debug for TunnelSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelSession")
            .field("id", &self.id)
            .field("peer_public_key", &self.peer_public_key)
            .field("preshared_key", &self.preshared_key.as_ref().map(|_| "<redacted>"))
            .field("keep_alive", &self.keep_alive)
            .field("index", &self.index)
            .field("output_capacity", &self.output.capacity())
            .finish_non_exhaustive()
    }
}
