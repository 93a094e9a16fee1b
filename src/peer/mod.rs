//! Peer helper
//!
//! Routing decisions for a single `WireGuard` peer on top of a
//! [`TunnelSession`](crate::tunnel::TunnelSession).

mod routing;

pub use routing::{parse_allowed_ips, DropReason, Peer, PeerConfig, Route};
