//! Outcome classification
//!
//! Turns the raw `(tag, size)` an engine reports into a [`ResultEnvelope`].
//!
//! | tag | status | data |
//! |-----|--------|------|
//! | 0 | [`ResultStatus::Done`] | no |
//! | 1 | [`ResultStatus::WriteToNetwork`] | yes |
//! | 2 | [`ResultStatus::Error`] | no |
//! | 4 | [`ResultStatus::WriteToTunnelIpv4`] | yes |
//! | 6 | [`ResultStatus::WriteToTunnelIpv6`] | yes |
//!
//! Any other tag, and any size larger than the output buffer, is an
//! [`EngineError`]. Nothing is coerced into a normal status.

use serde::Serialize;

use crate::engine::{
    RawOutcome, TAG_DONE, TAG_ERROR, TAG_WRITE_TO_NETWORK, TAG_WRITE_TO_TUNNEL_IPV4,
    TAG_WRITE_TO_TUNNEL_IPV6,
};
use crate::error::EngineError;

/// Classified outcome of a data-plane call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultStatus {
    /// Nothing to do
    #[serde(rename = "WIREGUARD_DONE")]
    Done,
    /// Send the data to the peer endpoint
    #[serde(rename = "WRITE_TO_NETWORK")]
    WriteToNetwork,
    /// The engine rejected the input or failed internally
    #[serde(rename = "WIREGUARD_ERROR")]
    Error,
    /// Deliver the data to the local IPv4 stack
    #[serde(rename = "WRITE_TO_TUNNEL_IPV4")]
    WriteToTunnelIpv4,
    /// Deliver the data to the local IPv6 stack
    #[serde(rename = "WRITE_TO_TUNNEL_IPV6")]
    WriteToTunnelIpv6,
}

impl ResultStatus {
    /// All statuses
    pub const ALL: [Self; 5] = [
        Self::Done,
        Self::WriteToNetwork,
        Self::Error,
        Self::WriteToTunnelIpv4,
        Self::WriteToTunnelIpv6,
    ];

    /// Map an engine tag, `None` if the tag is outside the contract
    #[must_use]
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            TAG_DONE => Some(Self::Done),
            TAG_WRITE_TO_NETWORK => Some(Self::WriteToNetwork),
            TAG_ERROR => Some(Self::Error),
            TAG_WRITE_TO_TUNNEL_IPV4 => Some(Self::WriteToTunnelIpv4),
            TAG_WRITE_TO_TUNNEL_IPV6 => Some(Self::WriteToTunnelIpv6),
            _ => None,
        }
    }

    /// Engine tag for this status
    #[must_use]
    pub const fn tag(self) -> u32 {
        match self {
            Self::Done => TAG_DONE,
            Self::WriteToNetwork => TAG_WRITE_TO_NETWORK,
            Self::Error => TAG_ERROR,
            Self::WriteToTunnelIpv4 => TAG_WRITE_TO_TUNNEL_IPV4,
            Self::WriteToTunnelIpv6 => TAG_WRITE_TO_TUNNEL_IPV6,
        }
    }

    /// Symbolic name exposed to hosts
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Done => "WIREGUARD_DONE",
            Self::WriteToNetwork => "WRITE_TO_NETWORK",
            Self::Error => "WIREGUARD_ERROR",
            Self::WriteToTunnelIpv4 => "WRITE_TO_TUNNEL_IPV4",
            Self::WriteToTunnelIpv6 => "WRITE_TO_TUNNEL_IPV6",
        }
    }

    /// Whether envelopes with this status carry output bytes
    #[must_use]
    pub const fn carries_data(self) -> bool {
        matches!(
            self,
            Self::WriteToNetwork | Self::WriteToTunnelIpv4 | Self::WriteToTunnelIpv6
        )
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one data-plane call
///
/// `data` is present exactly when [`ResultStatus::carries_data`] holds, and
/// is an owned copy of what the engine wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEnvelope {
    #[serde(rename = "type")]
    status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Vec<u8>>,
}

impl ResultEnvelope {
    /// Status of the call
    #[must_use]
    pub const fn status(&self) -> ResultStatus {
        self.status
    }

    /// Output bytes, if the status carries any
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Take the output bytes
    #[must_use]
    pub fn into_data(self) -> Option<Vec<u8>> {
        self.data
    }

    /// Number of output bytes (0 when there is no data)
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Whether there are no output bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-capacity output buffer reused across calls
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

impl OutputBuffer {
    /// Allocate a zeroed buffer
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
        }
    }

    /// Buffer capacity in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Zero the buffer and hand it out for one engine call
    pub fn prepare(&mut self) -> &mut [u8] {
        self.buf.fill(0);
        &mut self.buf
    }

    /// Current contents
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Classify an engine outcome
///
/// `output` is the buffer the engine wrote into; its length is the
/// capacity the reported size is checked against.
///
/// # Errors
///
/// Returns `EngineError::UnknownTag` for a tag outside the contract and
/// `EngineError::LengthOverflow` when the size exceeds the buffer.
pub fn dispatch(outcome: RawOutcome, output: &[u8]) -> Result<ResultEnvelope, EngineError> {
    let status =
        ResultStatus::from_tag(outcome.tag).ok_or(EngineError::UnknownTag { tag: outcome.tag })?;

    if outcome.size > output.len() {
        return Err(EngineError::LengthOverflow {
            size: outcome.size,
            capacity: output.len(),
        });
    }

    let data = status
        .carries_data()
        .then(|| output[..outcome.size].to_vec());

    Ok(ResultEnvelope { status, data })
}
