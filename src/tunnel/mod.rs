//! `WireGuard` tunnel sessions
//!
//! This module owns the lifecycle of engine tunnels and the result
//! protocol spoken back to the host.
//!
//! # Overview
//!
//! - [`TunnelSession`]: one tunnel, validated construction, four
//!   data-plane operations, release on drop
//! - [`ResultEnvelope`] / [`ResultStatus`]: the classified outcome of a
//!   data-plane call
//! - [`OwnedHandle`]: the single owner of an engine handle
//!
//! # Data Flow
//!
//! ```text
//! host -> TunnelSession::write/read/tick/force_handshake
//!           |
//!           v
//!      OutputBuffer::prepare (zeroed)
//!           |
//!           v
//!      TunnelEngine call -> RawOutcome { tag, size }
//!           |
//!           v
//!      dispatch -> ResultEnvelope { status, data? }
//! ```

pub mod dispatch;
mod handle;
mod session;

pub use dispatch::{dispatch, OutputBuffer, ResultEnvelope, ResultStatus};
pub use handle::OwnedHandle;
pub use session::{SessionClass, TunnelSession};
