//! Peer routing
//!
//! [`Peer`] pairs a [`TunnelSession`] with the peer's UDP endpoint and
//! allowed IPs, and turns every envelope into a [`Route`]. It never does
//! I/O; the caller sends datagrams and delivers packets as told.

use std::net::{IpAddr, SocketAddr};

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::config::DEFAULT_KEEP_ALIVE;
use crate::engine::{TunnelEngine, TunnelStats};
use crate::error::{BridgeError, ConfigError, EngineError};
use crate::tunnel::{ResultEnvelope, ResultStatus, TunnelSession};

/// `WireGuard` message type of a handshake initiation
const HANDSHAKE_INITIATION: u32 = 1;

/// Datagrams at or below this length are never handshake initiations
const HANDSHAKE_MIN_EXCLUSIVE: usize = 90;

/// Peer definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeerConfig {
    /// Own private key (base64)
    pub private_key: String,

    /// Peer public key (base64)
    pub public_key: String,

    /// Pre-shared key (base64)
    #[serde(default)]
    pub preshared_key: Option<String>,

    /// Comma separated CIDRs or bare addresses
    pub allowed_ips: String,

    /// Keep-alive in seconds, the session default when absent
    #[serde(default)]
    pub keep_alive: Option<u16>,

    /// Peer index
    #[serde(default)]
    pub index: i64,

    /// Known endpoint, if any
    #[serde(default)]
    pub endpoint: Option<SocketAddr>,
}

/// Parse a comma separated allowed-IPs list
///
/// Bare addresses become host routes (`/32` or `/128`).
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` naming the first bad entry.
pub fn parse_allowed_ips(list: &str) -> Result<Vec<IpNet>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                .map_err(|_| {
                    ConfigError::ValidationError(format!("Invalid allowed IP '{entry}'"))
                })
        })
        .collect()
}

/// Why a result was not forwarded anywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Network output with no known endpoint
    NoEndpoint,
    /// Decrypted IPv6 packet
    Ipv6Unsupported,
    /// Engine reported an error
    EngineError,
}

impl DropReason {
    /// Short description for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoEndpoint => "no endpoint",
            Self::Ipv6Unsupported => "IPv6 not supported",
            Self::EngineError => "engine error",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Nothing to send or deliver
    Nothing,
    /// Send `data` to `endpoint` over UDP
    ToNetwork { endpoint: SocketAddr, data: Vec<u8> },
    /// Deliver `data` to the local IPv4 stack
    ToIpv4(Vec<u8>),
    /// Result discarded
    Dropped(DropReason),
}

/// Whether a datagram looks like a handshake initiation
fn is_handshake_initiation(datagram: &[u8]) -> bool {
    datagram.len() > HANDSHAKE_MIN_EXCLUSIVE
        && datagram
            .get(..4)
            .and_then(|b| <[u8; 4]>::try_from(b).ok())
            .is_some_and(|b| u32::from_le_bytes(b) == HANDSHAKE_INITIATION)
}

/// One `WireGuard` peer
#[derive(Debug)]
pub struct Peer<E: TunnelEngine> {
    session: TunnelSession<E>,
    allowed_ips: Vec<IpNet>,
    endpoint: Option<SocketAddr>,
}

impl<E: TunnelEngine> Peer<E> {
    /// Wrap an existing session
    pub fn new(
        session: TunnelSession<E>,
        allowed_ips: Vec<IpNet>,
        endpoint: Option<SocketAddr>,
    ) -> Self {
        Self {
            session,
            allowed_ips,
            endpoint,
        }
    }

    /// Build a peer and its session from a definition
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Config` for bad allowed IPs and the session
    /// errors of [`Bridge::create_session`].
    pub fn from_config(bridge: &Bridge<E>, config: &PeerConfig) -> Result<Self, BridgeError> {
        let allowed_ips = parse_allowed_ips(&config.allowed_ips)?;
        let keep_alive = match config.keep_alive {
            Some(keep_alive) => keep_alive,
            None => bridge
                .session_class()
                .map_or(DEFAULT_KEEP_ALIVE, |class| {
                    class.config().session.default_keep_alive
                }),
        };

        let session = bridge.create_session(
            &config.private_key,
            &config.public_key,
            config.preshared_key.as_deref().unwrap_or_default(),
            i64::from(keep_alive),
            config.index,
        )?;

        info!(
            "Peer ready: {} allowed IPs, endpoint {:?}",
            allowed_ips.len(),
            config.endpoint
        );
        Ok(Self::new(session, allowed_ips, config.endpoint))
    }

    /// Current endpoint
    pub const fn endpoint(&self) -> Option<SocketAddr> {
        self.endpoint
    }

    /// Replace the endpoint, returning the previous one
    pub fn set_endpoint(&mut self, endpoint: SocketAddr) -> Option<SocketAddr> {
        self.endpoint.replace(endpoint)
    }

    /// Allowed IPs
    pub fn allowed_ips(&self) -> &[IpNet] {
        &self.allowed_ips
    }

    /// Whether `ip` falls inside the allowed IPs
    pub fn matches(&self, ip: IpAddr) -> bool {
        self.allowed_ips.iter().any(|net| net.contains(&ip))
    }

    /// Underlying session
    pub const fn session(&self) -> &TunnelSession<E> {
        &self.session
    }

    /// Tunnel counters
    pub fn stats(&self) -> TunnelStats {
        self.session.stats()
    }

    /// Release the peer, returning its session
    pub fn into_session(self) -> TunnelSession<E> {
        self.session
    }

    /// Decide where an envelope goes
    pub fn route(&self, envelope: ResultEnvelope) -> Route {
        let status = envelope.status();
        match status {
            ResultStatus::Done => Route::Nothing,
            ResultStatus::WriteToNetwork => match self.endpoint {
                Some(endpoint) => Route::ToNetwork {
                    endpoint,
                    data: envelope.into_data().unwrap_or_default(),
                },
                None => Route::Dropped(DropReason::NoEndpoint),
            },
            ResultStatus::WriteToTunnelIpv4 => {
                Route::ToIpv4(envelope.into_data().unwrap_or_default())
            }
            ResultStatus::WriteToTunnelIpv6 => {
                warn!("Dropping IPv6 packet from peer session {}", self.session.id());
                Route::Dropped(DropReason::Ipv6Unsupported)
            }
            ResultStatus::Error => {
                warn!("Engine error on peer session {}", self.session.id());
                Route::Dropped(DropReason::EngineError)
            }
        }
    }

    /// Handle a datagram received from `from`
    ///
    /// A handshake initiation that the engine accepts moves the endpoint
    /// to `from`. Initiations the engine rejects leave it untouched, so a
    /// forged initiation cannot redirect traffic. The flag is `false` when
    /// the engine rejected the datagram.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn read(
        &mut self,
        datagram: &[u8],
        from: Option<SocketAddr>,
    ) -> Result<(Route, bool), EngineError> {
        let envelope = self.session.read(datagram)?;
        let accepted = envelope.status() != ResultStatus::Error;

        if let Some(from) = from {
            if accepted && is_handshake_initiation(datagram) {
                let previous = self.set_endpoint(from);
                if previous != Some(from) {
                    debug!("Peer endpoint updated: {previous:?} -> {from}");
                }
            }
        }

        Ok((self.route(envelope), accepted))
    }

    /// Encapsulate an outbound IP packet
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn write(&mut self, packet: &[u8]) -> Result<Route, EngineError> {
        let envelope = self.session.write(packet)?;
        Ok(self.route(envelope))
    }

    /// Drive timers
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn tick(&mut self) -> Result<Route, EngineError> {
        let envelope = self.session.tick()?;
        Ok(self.route(envelope))
    }

    /// Start a handshake now
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the engine breaks the outcome contract.
    pub fn force_handshake(&mut self) -> Result<Route, EngineError> {
        let envelope = self.session.force_handshake()?;
        Ok(self.route(envelope))
    }
}
