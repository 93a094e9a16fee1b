//! Engine log forwarding
//!
//! Engines accept a single process-wide sink, a bare `fn(&str)`, so the
//! sink cannot capture anything. [`set_logging_function`] stores the host's
//! handler in a [`ReferenceRegistry`] and points a process-wide weak anchor
//! at that registry; [`forward_engine_log`] resolves the handler through
//! the anchor for every line.
//!
//! The last registration wins, both for the handler and for the anchor.
//! Lines are dropped silently when no registry or handler is reachable.
//!
//! The handler is cloned out of the registry and every lock is released
//! before it runs, so a handler may log again, or install a new handler,
//! from inside its own call.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::engine::TunnelEngine;
use crate::registry::{ContextId, ReferenceRegistry};

/// Registry key of the active log handler
pub const LOG_HANDLER_KEY: &str = "WireguardLogFunction";

/// Host log handler
pub type LogHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Registry that received the most recent handler
static ANCHOR: RwLock<Option<Weak<ReferenceRegistry>>> = parking_lot::const_rwlock(None);

/// Registry entry wrapping a [`LogHandler`]
struct StoredHandler(LogHandler);

impl fmt::Debug for StoredHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoredHandler")
    }
}

/// Make `handler` the sole destination of engine log lines
///
/// Replaces any handler previously stored in `registry` and re-points the
/// process-wide anchor at `registry`. Returns whether the engine accepted
/// the sink.
pub fn set_logging_function<E: TunnelEngine + ?Sized>(
    registry: &Arc<ReferenceRegistry>,
    engine: &E,
    handler: LogHandler,
    context: ContextId,
) -> bool {
    registry.set(LOG_HANDLER_KEY, Arc::new(StoredHandler(handler)), context);
    *ANCHOR.write() = Some(Arc::downgrade(registry));

    let installed = engine.set_log_sink(forward_engine_log);
    debug!("Engine log handler registered for {context} (sink installed: {installed})");
    installed
}

/// Remove the handler stored in `registry`
///
/// Later lines are dropped until a new handler is registered.
pub fn clear_logging_function(registry: &ReferenceRegistry) -> bool {
    registry.remove(LOG_HANDLER_KEY)
}

/// Process-wide sink handed to engines
///
/// Looks the handler up and calls it with `line`. Every failure along the
/// way drops the line.
pub fn forward_engine_log(line: &str) {
    let anchor = ANCHOR.read().clone();
    let Some(registry) = anchor.as_ref().and_then(Weak::upgrade) else {
        return;
    };
    let Ok(handler) = registry.get_as::<StoredHandler>(LOG_HANDLER_KEY) else {
        return;
    };
    drop(registry);

    (handler.0)(line);
}
