//! Tunnel engines
//!
//! The bridge drives an external `WireGuard` implementation through the
//! [`TunnelEngine`] trait. Two engines ship with the crate:
//!
//! - [`BoringtunEngine`]: the production engine, backed by boringtun
//! - [`ScriptedEngine`]: a deterministic double that replays queued
//!   outcomes and records what it was asked to do

mod boringtun_engine;
mod scripted;
mod traits;

pub use boringtun_engine::{BoringtunEngine, DATA_OVERHEAD};
pub use scripted::{RecordedParams, ScriptedCall, ScriptedEngine, ScriptedHandle, ScriptedOutcome};
pub use traits::{
    KeyPrimitives, LogSink, RawOutcome, TunnelEngine, TunnelParams, TunnelStats, KEY_LEN,
    TAG_DONE, TAG_ERROR, TAG_WRITE_TO_NETWORK, TAG_WRITE_TO_TUNNEL_IPV4, TAG_WRITE_TO_TUNNEL_IPV6,
};

pub(crate) use traits::decode_key;
