//! Tunnel engine contract
//!
//! The bridge never touches `WireGuard` cryptography itself. Everything it
//! needs from the protocol implementation goes through [`TunnelEngine`]
//! (tunnel lifecycle and data plane) and [`KeyPrimitives`] (X25519 and
//! base64 helpers).
//!
//! Outcomes come back as a raw `(tag, size)` pair, exactly as a C engine
//! would report them. Classification into statuses happens on the bridge
//! side, in [`crate::tunnel::dispatch`], so an engine that reports an
//! unknown tag is caught rather than trusted.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use boringtun::x25519::{PublicKey, StaticSecret};
use rand::RngCore;
use serde::Serialize;

/// Nothing to do
pub const TAG_DONE: u32 = 0;

/// Output buffer holds a datagram for the network
pub const TAG_WRITE_TO_NETWORK: u32 = 1;

/// Operation failed inside the engine
pub const TAG_ERROR: u32 = 2;

/// Output buffer holds a decrypted IPv4 packet
pub const TAG_WRITE_TO_TUNNEL_IPV4: u32 = 4;

/// Output buffer holds a decrypted IPv6 packet
pub const TAG_WRITE_TO_TUNNEL_IPV6: u32 = 6;

/// Length of an X25519 key in bytes
pub const KEY_LEN: usize = 32;

/// Process-wide log sink the engine calls with one formatted line
pub type LogSink = fn(&str);

/// Raw outcome of one engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOutcome {
    /// Outcome tag, one of the `TAG_*` constants for a well-behaved engine
    pub tag: u32,
    /// Number of bytes written at the start of the output buffer
    pub size: usize,
}

impl RawOutcome {
    /// Create an outcome
    #[must_use]
    pub const fn new(tag: u32, size: usize) -> Self {
        Self { tag, size }
    }

    /// Nothing to do
    #[must_use]
    pub const fn done() -> Self {
        Self::new(TAG_DONE, 0)
    }

    /// Engine-side failure
    #[must_use]
    pub const fn error() -> Self {
        Self::new(TAG_ERROR, 0)
    }
}

/// Arguments for creating one tunnel
///
/// Keys are passed as the base64 strings the host supplied; they have
/// already passed [`KeyPrimitives::check_base64_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelParams<'a> {
    /// Own private key (base64)
    pub private_key: &'a str,
    /// Peer public key (base64)
    pub peer_public_key: &'a str,
    /// Pre-shared key (base64), `None` when absent
    pub preshared_key: Option<&'a str>,
    /// Persistent keep-alive interval in seconds
    pub keep_alive: u16,
    /// Peer index
    pub index: u32,
}

/// Per-tunnel counters reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TunnelStats {
    /// Time since the last completed handshake
    pub time_since_last_handshake: Option<Duration>,
    /// Bytes sent through the tunnel
    pub tx_bytes: u64,
    /// Bytes received through the tunnel
    pub rx_bytes: u64,
    /// Estimated packet loss ratio
    pub estimated_loss: f32,
    /// Estimated round-trip time in milliseconds
    pub estimated_rtt_ms: Option<u32>,
}

/// X25519 key primitives
///
/// The default methods use boringtun's X25519 implementation, so engines
/// normally only implement the tunnel side.
pub trait KeyPrimitives {
    /// Generate a fresh random private key
    fn secret_key(&self) -> [u8; KEY_LEN] {
        let mut key_bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        let secret = StaticSecret::from(key_bytes);
        *secret.as_bytes()
    }

    /// Derive the public key for a private key
    fn public_key(&self, secret: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
        let secret = StaticSecret::from(*secret);
        *PublicKey::from(&secret).as_bytes()
    }

    /// Encode a key as standard padded base64
    fn key_to_base64(&self, key: &[u8; KEY_LEN]) -> String {
        BASE64.encode(key)
    }

    /// Whether `key` is base64 that decodes to exactly 32 bytes
    fn check_base64_key(&self, key: &str) -> bool {
        decode_key(key).is_some()
    }
}

/// Tunnel engine contract
///
/// A handle is created by [`new_tunnel`](Self::new_tunnel) and released by
/// [`free`](Self::free), which takes it by value. Callers never see the
/// handle directly; [`crate::tunnel::OwnedHandle`] is the only owner.
///
/// Data-plane calls write their output at the start of `dst` and report
/// how much they wrote. `dst` is zeroed by the caller before every call.
pub trait TunnelEngine: KeyPrimitives + Send + Sync + 'static {
    /// Opaque per-tunnel state
    type Handle: Send + 'static;

    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Create a tunnel, or `None` if the engine refuses
    fn new_tunnel(&self, params: &TunnelParams<'_>) -> Option<Self::Handle>;

    /// Encapsulate an outbound packet
    fn write(&self, handle: &mut Self::Handle, src: &[u8], dst: &mut [u8]) -> RawOutcome;

    /// Decapsulate a datagram received from the network
    fn read(&self, handle: &mut Self::Handle, src: &[u8], dst: &mut [u8]) -> RawOutcome;

    /// Drive timers (keep-alive, rekey, expiry)
    fn tick(&self, handle: &mut Self::Handle, dst: &mut [u8]) -> RawOutcome;

    /// Start a handshake immediately
    fn force_handshake(&self, handle: &mut Self::Handle, dst: &mut [u8]) -> RawOutcome;

    /// Report tunnel counters
    fn stats(&self, handle: &Self::Handle) -> TunnelStats;

    /// Release a tunnel
    fn free(&self, handle: Self::Handle);

    /// Install the process-wide log sink
    ///
    /// Returns `false` if the engine could not wire its logging to the
    /// sink (for example because another global logger owns the output).
    fn set_log_sink(&self, sink: LogSink) -> bool;
}

/// Decode a base64 X25519 key
pub(crate) fn decode_key(key: &str) -> Option<[u8; KEY_LEN]> {
    let bytes = BASE64.decode(key).ok()?;
    <[u8; KEY_LEN]>::try_from(bytes.as_slice()).ok()
}
