//! Reference registry
//!
//! Keyed store for long-lived handles that must outlive any single call:
//! the session class used for instance checks and the active log handler.
//!
//! # Guarantees
//!
//! - At most one entry per key.
//! - [`ReferenceRegistry::set`] releases the previous handle before the
//!   new one is stored, and outside the map's shard lock, so a handle
//!   whose drop touches the registry cannot deadlock.
//! - Lookups clone the handle out; callers never hold a lock while using
//!   it.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::RegistryError;

/// Type-erased shared handle
pub type AnyHandle = Arc<dyn Any + Send + Sync>;

/// Host context a handle belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// One stored handle
#[derive(Clone)]
pub struct Reference {
    handle: AnyHandle,
    context: ContextId,
}

impl Reference {
    /// The stored handle
    #[must_use]
    pub fn handle(&self) -> &AnyHandle {
        &self.handle
    }

    /// Context the handle belongs to
    #[must_use]
    pub const fn context(&self) -> ContextId {
        self.context
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Keyed store of long-lived handles
#[derive(Default)]
pub struct ReferenceRegistry {
    entries: DashMap<String, Reference>,
}

impl ReferenceRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handle, replacing and releasing any previous one
    pub fn set(&self, key: impl Into<String>, handle: AnyHandle, context: ContextId) {
        let key = key.into();

        // `remove` hands the old entry back by value, so it is dropped here
        // with no shard lock held.
        if let Some((_, previous)) = self.entries.remove(&key) {
            debug!("Replacing reference {key} ({})", previous.context);
            drop(previous);
        }

        // A concurrent `set` may have raced us; release whatever it stored.
        if let Some(raced) = self.entries.insert(key, Reference { handle, context }) {
            drop(raced);
        }
    }

    /// Look up a handle
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if nothing is stored under `key`.
    pub fn get(&self, key: &str) -> Result<AnyHandle, RegistryError> {
        self.reference(key).map(|r| r.handle)
    }

    /// Look up a handle and its context
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if nothing is stored under `key`.
    pub fn reference(&self, key: &str) -> Result<Reference, RegistryError> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::not_found(key))
    }

    /// Look up a handle of a known type
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` if nothing is stored under `key`
    /// and `RegistryError::TypeMismatch` if the handle is not a `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, RegistryError> {
        self.get(key)?
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                key: key.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Whether a handle is stored under `key`
    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove and release a handle, returning whether one was stored
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Stored keys
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of stored handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ReferenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
