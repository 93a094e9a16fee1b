//! boringtun-backed tunnel engine
//!
//! Each handle is a boxed [`boringtun::noise::Tunn`]. boringtun hands back
//! its output as a [`TunnResult`] borrowing the destination buffer; this
//! module flattens that into the `(tag, size)` contract, moving the packet
//! to the front of the buffer if boringtun placed it elsewhere.
//!
//! boringtun logs through `tracing`. [`BoringtunEngine::set_log_sink`]
//! installs (once per process) a `tracing_subscriber` whose writer
//! forwards every formatted line to the current sink.

use std::io;

use boringtun::noise::{Tunn, TunnResult};
use boringtun::x25519::{PublicKey, StaticSecret};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use tracing_subscriber::EnvFilter;

use super::traits::{
    decode_key, KeyPrimitives, LogSink, RawOutcome, TunnelEngine, TunnelParams, TunnelStats,
    TAG_DONE, TAG_ERROR, TAG_WRITE_TO_NETWORK, TAG_WRITE_TO_TUNNEL_IPV4,
    TAG_WRITE_TO_TUNNEL_IPV6,
};

/// Sink currently receiving engine log lines
static ENGINE_SINK: RwLock<Option<LogSink>> = parking_lot::const_rwlock(None);

/// Whether our forwarding subscriber owns the global dispatcher
static FORWARDER_INSTALLED: OnceCell<bool> = OnceCell::new();

/// Directive selecting which events reach the sink
const FORWARD_FILTER: &str = "boringtun=debug";

/// Bytes a data message adds to the packet it carries: the 16-byte
/// header plus the 16-byte AEAD tag
pub const DATA_OVERHEAD: usize = 32;

/// `WireGuard` engine backed by boringtun
#[derive(Debug, Default, Clone, Copy)]
pub struct BoringtunEngine;

impl BoringtunEngine {
    /// Create the engine
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl KeyPrimitives for BoringtunEngine {}

impl TunnelEngine for BoringtunEngine {
    type Handle = Box<Tunn>;

    fn name(&self) -> &'static str {
        "boringtun"
    }

    fn new_tunnel(&self, params: &TunnelParams<'_>) -> Option<Self::Handle> {
        let static_private = decode_key(params.private_key)?;
        let peer_public = decode_key(params.peer_public_key)?;
        let preshared_key = match params.preshared_key {
            Some(key) => Some(decode_key(key)?),
            None => None,
        };

        let tunn = Tunn::new(
            StaticSecret::from(static_private),
            PublicKey::from(peer_public),
            preshared_key,
            Some(params.keep_alive),
            params.index,
            None,
        );

        match tunn {
            Ok(tunn) => Some(Box::new(tunn)),
            Err(e) => {
                warn!("boringtun refused tunnel (index {}): {e}", params.index);
                None
            }
        }
    }

    fn write(&self, handle: &mut Self::Handle, src: &[u8], dst: &mut [u8]) -> RawOutcome {
        // boringtun panics when the sealed packet does not fit, and a packet
        // queued before the handshake is sealed later into the same buffer.
        if src.len() + DATA_OVERHEAD > dst.len() {
            debug!(
                "Packet of {} bytes exceeds output capacity {} after encapsulation",
                src.len(),
                dst.len()
            );
            return RawOutcome::error();
        }

        let base = dst.as_ptr() as usize;
        let placed = Placed::from_result(handle.encapsulate(src, dst), base);
        placed.settle(dst)
    }

    fn read(&self, handle: &mut Self::Handle, src: &[u8], dst: &mut [u8]) -> RawOutcome {
        let base = dst.as_ptr() as usize;
        let placed = Placed::from_result(handle.decapsulate(None, src, dst), base);
        placed.settle(dst)
    }

    fn tick(&self, handle: &mut Self::Handle, dst: &mut [u8]) -> RawOutcome {
        let base = dst.as_ptr() as usize;
        let placed = Placed::from_result(handle.update_timers(dst), base);
        placed.settle(dst)
    }

    fn force_handshake(&self, handle: &mut Self::Handle, dst: &mut [u8]) -> RawOutcome {
        let base = dst.as_ptr() as usize;
        let placed = Placed::from_result(handle.format_handshake_initiation(dst, true), base);
        placed.settle(dst)
    }

    fn stats(&self, handle: &Self::Handle) -> TunnelStats {
        let (time_since_last_handshake, tx_bytes, rx_bytes, estimated_loss, estimated_rtt_ms) =
            handle.stats();
        TunnelStats {
            time_since_last_handshake,
            tx_bytes: tx_bytes as u64,
            rx_bytes: rx_bytes as u64,
            estimated_loss,
            estimated_rtt_ms,
        }
    }

    fn free(&self, handle: Self::Handle) {
        drop(handle);
    }

    fn set_log_sink(&self, sink: LogSink) -> bool {
        *ENGINE_SINK.write() = Some(sink);

        *FORWARDER_INSTALLED.get_or_init(|| {
            let installed = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(FORWARD_FILTER))
                .with_writer(SinkWriter::default)
                .with_ansi(false)
                .without_time()
                .try_init()
                .is_ok();
            if !installed {
                debug!("Global tracing subscriber already set; engine log forwarding disabled");
            }
            installed
        })
    }
}

/// Where boringtun put its output inside the destination buffer
struct Placed {
    tag: u32,
    offset: usize,
    len: usize,
}

impl Placed {
    fn bare(tag: u32) -> Self {
        Self {
            tag,
            offset: 0,
            len: 0,
        }
    }

    fn packet(tag: u32, packet: &[u8], base: usize) -> Self {
        Self {
            tag,
            offset: (packet.as_ptr() as usize).saturating_sub(base),
            len: packet.len(),
        }
    }

    fn from_result(result: TunnResult<'_>, base: usize) -> Self {
        match result {
            TunnResult::Done => Self::bare(TAG_DONE),
            TunnResult::Err(e) => {
                trace!("boringtun operation failed: {e:?}");
                Self::bare(TAG_ERROR)
            }
            TunnResult::WriteToNetwork(packet) => Self::packet(TAG_WRITE_TO_NETWORK, packet, base),
            TunnResult::WriteToTunnelV4(packet, _) => {
                Self::packet(TAG_WRITE_TO_TUNNEL_IPV4, packet, base)
            }
            TunnResult::WriteToTunnelV6(packet, _) => {
                Self::packet(TAG_WRITE_TO_TUNNEL_IPV6, packet, base)
            }
        }
    }

    /// Move the packet to the front of `dst` and report it
    fn settle(self, dst: &mut [u8]) -> RawOutcome {
        if self.offset != 0 && self.len != 0 {
            dst.copy_within(self.offset..self.offset + self.len, 0);
        }
        RawOutcome::new(self.tag, self.len)
    }
}

/// Collects one formatted event and hands it to the sink when dropped
#[derive(Default)]
struct SinkWriter {
    line: Vec<u8>,
}

impl io::Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        if self.line.is_empty() {
            return;
        }
        // Copy the pointer out so the sink runs without the lock held.
        let sink = *ENGINE_SINK.read();
        if let Some(sink) = sink {
            let line = String::from_utf8_lossy(&self.line);
            sink(line.trim_end());
        }
    }
}
