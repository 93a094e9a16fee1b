//! Owned engine handle
//!
//! [`OwnedHandle`] is the only place a tunnel handle lives. It pairs the
//! handle with the engine that created it and releases it on drop, so a
//! handle is freed exactly once on every path: normal close, early return,
//! or unwinding.

use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use tracing::debug;

use crate::engine::TunnelEngine;

/// RAII wrapper around one engine tunnel handle
pub struct OwnedHandle<E: TunnelEngine> {
    engine: Arc<E>,
    handle: ManuallyDrop<E::Handle>,
}

impl<E: TunnelEngine> OwnedHandle<E> {
    /// Take ownership of a freshly created handle
    pub fn new(engine: Arc<E>, handle: E::Handle) -> Self {
        Self {
            engine,
            handle: ManuallyDrop::new(handle),
        }
    }

    /// Engine that owns the handle
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Shared access to the handle
    pub fn get(&self) -> &E::Handle {
        &self.handle
    }

    /// Engine and exclusive access to the handle, borrowed together
    pub fn parts_mut(&mut self) -> (&E, &mut E::Handle) {
        (&*self.engine, &mut *self.handle)
    }
}

impl<E: TunnelEngine> Drop for OwnedHandle<E> {
    fn drop(&mut self) {
        // SAFETY: `handle` is only taken here, and `drop` runs at most once.
        // Nothing reads the field after this point.
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        self.engine.free(handle);
        debug!("Released {} tunnel handle", self.engine.name());
    }
}

impl<E: TunnelEngine> fmt::Debug for OwnedHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("engine", &self.engine.name())
            .finish_non_exhaustive()
    }
}
