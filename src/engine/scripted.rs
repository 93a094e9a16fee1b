//! Scripted tunnel engine
//!
//! A deterministic [`TunnelEngine`] that replays queued outcomes instead of
//! running `WireGuard`. It records every tunnel creation and data-plane
//! call, counts handle releases, and checks that each output buffer it is
//! handed arrives zeroed. Used by the unit and integration tests.
//!
//! # Example
//!
//! ```
//! use wg_bridge::engine::{ScriptedEngine, ScriptedOutcome};
//!
//! let engine = ScriptedEngine::new();
//! engine.push(ScriptedOutcome::network(vec![0xab; 148]));
//! assert_eq!(engine.pending(), 1);
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::traits::{
    KeyPrimitives, LogSink, RawOutcome, TunnelEngine, TunnelParams, TunnelStats, TAG_DONE,
    TAG_ERROR, TAG_WRITE_TO_NETWORK, TAG_WRITE_TO_TUNNEL_IPV4, TAG_WRITE_TO_TUNNEL_IPV6,
};

/// One queued engine reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedOutcome {
    /// Tag reported to the caller
    pub tag: u32,
    /// Bytes written into the output buffer (truncated to its capacity)
    pub payload: Vec<u8>,
    /// Size reported to the caller; defaults to the payload length
    pub reported_size: Option<usize>,
}

impl ScriptedOutcome {
    /// Nothing to do
    #[must_use]
    pub const fn done() -> Self {
        Self::raw(TAG_DONE, Vec::new())
    }

    /// Engine-side failure
    #[must_use]
    pub const fn error() -> Self {
        Self::raw(TAG_ERROR, Vec::new())
    }

    /// Datagram for the network
    #[must_use]
    pub const fn network(payload: Vec<u8>) -> Self {
        Self::raw(TAG_WRITE_TO_NETWORK, payload)
    }

    /// Decrypted IPv4 packet
    #[must_use]
    pub const fn ipv4(payload: Vec<u8>) -> Self {
        Self::raw(TAG_WRITE_TO_TUNNEL_IPV4, payload)
    }

    /// Decrypted IPv6 packet
    #[must_use]
    pub const fn ipv6(payload: Vec<u8>) -> Self {
        Self::raw(TAG_WRITE_TO_TUNNEL_IPV6, payload)
    }

    /// Arbitrary tag, including ones outside the contract
    #[must_use]
    pub const fn raw(tag: u32, payload: Vec<u8>) -> Self {
        Self {
            tag,
            payload,
            reported_size: None,
        }
    }

    /// Network outcome that claims `size` bytes without writing them
    #[must_use]
    pub const fn overflow(size: usize) -> Self {
        Self {
            tag: TAG_WRITE_TO_NETWORK,
            payload: Vec::new(),
            reported_size: Some(size),
        }
    }
}

/// Creation arguments as the engine received them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedParams {
    pub private_key: String,
    pub peer_public_key: String,
    pub preshared_key: Option<String>,
    pub keep_alive: u16,
    pub index: u32,
}

impl From<&TunnelParams<'_>> for RecordedParams {
    fn from(params: &TunnelParams<'_>) -> Self {
        Self {
            private_key: params.private_key.to_string(),
            peer_public_key: params.peer_public_key.to_string(),
            preshared_key: params.preshared_key.map(str::to_string),
            keep_alive: params.keep_alive,
            index: params.index,
        }
    }
}

/// Data-plane call kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedCall {
    Write,
    Read,
    Tick,
    ForceHandshake,
}

impl ScriptedCall {
    const fn name(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Read => "read",
            Self::Tick => "tick",
            Self::ForceHandshake => "force_handshake",
        }
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    script: VecDeque<ScriptedOutcome>,
    created: Vec<RecordedParams>,
    calls: Vec<(ScriptedCall, Vec<u8>)>,
    freed: usize,
    dirty_buffers: usize,
    refuse_creation: bool,
    next_handle: u64,
    sink: Option<LogSink>,
}

/// Scripted engine state shared by all tunnels it creates
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    state: Mutex<ScriptState>,
}

/// Handle issued by [`ScriptedEngine`]
#[derive(Debug, PartialEq, Eq)]
pub struct ScriptedHandle(u64);

impl ScriptedHandle {
    /// Sequence number of this handle, starting at 1
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl ScriptedEngine {
    /// Create an engine with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply for the next data-plane call
    pub fn push(&self, outcome: ScriptedOutcome) {
        self.state.lock().script.push_back(outcome);
    }

    /// Number of replies not yet consumed
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().script.len()
    }

    /// Make subsequent `new_tunnel` calls fail
    pub fn refuse_creation(&self, refuse: bool) {
        self.state.lock().refuse_creation = refuse;
    }

    /// Arguments of every successful or refused creation call
    #[must_use]
    pub fn created(&self) -> Vec<RecordedParams> {
        self.state.lock().created.clone()
    }

    /// Number of creation calls
    #[must_use]
    pub fn creation_count(&self) -> usize {
        self.state.lock().created.len()
    }

    /// Number of handles released
    #[must_use]
    pub fn freed_count(&self) -> usize {
        self.state.lock().freed
    }

    /// Data-plane calls in order, with their input bytes
    #[must_use]
    pub fn calls(&self) -> Vec<(ScriptedCall, Vec<u8>)> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded data-plane calls
    pub fn clear_history(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of calls that received a non-zeroed output buffer
    #[must_use]
    pub fn dirty_buffer_count(&self) -> usize {
        self.state.lock().dirty_buffers
    }

    fn play(&self, call: ScriptedCall, src: &[u8], dst: &mut [u8]) -> RawOutcome {
        let (outcome, sink) = {
            let mut state = self.state.lock();
            if dst.iter().any(|&b| b != 0) {
                state.dirty_buffers += 1;
            }
            state.calls.push((call, src.to_vec()));
            let outcome = state.script.pop_front().unwrap_or_else(ScriptedOutcome::done);
            (outcome, state.sink)
        };

        let written = outcome.payload.len().min(dst.len());
        dst[..written].copy_from_slice(&outcome.payload[..written]);

        // Log after releasing the state lock, the sink may call back in.
        if let Some(sink) = sink {
            sink(&format!("scripted {} -> tag {}", call.name(), outcome.tag));
        }

        RawOutcome::new(
            outcome.tag,
            outcome.reported_size.unwrap_or(outcome.payload.len()),
        )
    }
}

impl KeyPrimitives for ScriptedEngine {}

impl TunnelEngine for ScriptedEngine {
    type Handle = ScriptedHandle;

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn new_tunnel(&self, params: &TunnelParams<'_>) -> Option<Self::Handle> {
        let mut state = self.state.lock();
        state.created.push(params.into());
        if state.refuse_creation {
            return None;
        }
        state.next_handle += 1;
        Some(ScriptedHandle(state.next_handle))
    }

    fn write(&self, _handle: &mut Self::Handle, src: &[u8], dst: &mut [u8]) -> RawOutcome {
        self.play(ScriptedCall::Write, src, dst)
    }

    fn read(&self, _handle: &mut Self::Handle, src: &[u8], dst: &mut [u8]) -> RawOutcome {
        self.play(ScriptedCall::Read, src, dst)
    }

    fn tick(&self, _handle: &mut Self::Handle, dst: &mut [u8]) -> RawOutcome {
        self.play(ScriptedCall::Tick, &[], dst)
    }

    fn force_handshake(&self, _handle: &mut Self::Handle, dst: &mut [u8]) -> RawOutcome {
        self.play(ScriptedCall::ForceHandshake, &[], dst)
    }

    fn stats(&self, _handle: &Self::Handle) -> TunnelStats {
        TunnelStats::default()
    }

    fn free(&self, _handle: Self::Handle) {
        self.state.lock().freed += 1;
    }

    fn set_log_sink(&self, sink: LogSink) -> bool {
        self.state.lock().sink = Some(sink);
        true
    }
}
