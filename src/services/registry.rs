//! Connection registry
//!
//! Holds the shared database handle for one backend. A registry is an
//! ordinary value: it is constructed once at startup, cloned into the
//! managers and query modules that need it, and invalidated at shutdown.
//! Clones share the same slot.

use std::sync::{Arc, RwLock};

use sqlx::AnyPool;

use crate::error::{Error, Result};
use crate::transaction::batch::BatchClient;

/// A handle that can live in a [`Registry`]
pub trait Handle: Clone + Send + Sync + 'static {
    /// Name used in log messages
    const KIND: &'static str;

    /// Error returned by [`Registry::get`] when nothing is registered
    fn not_initialized() -> Error;
}

impl Handle for AnyPool {
    const KIND: &'static str = "dialector";

    fn not_initialized() -> Error {
        Error::DialectorNotInitialized
    }
}

impl Handle for Arc<dyn BatchClient> {
    const KIND: &'static str = "batch client";

    fn not_initialized() -> Error {
        Error::ClientNotInitialized
    }
}

pub struct Registry<H: Handle> {
    slot: Arc<RwLock<Option<H>>>,
}

/// Registry for the relational backend
pub type DialectorRegistry = Registry<AnyPool>;

/// Registry for the batch backend
pub type ClientRegistry = Registry<Arc<dyn BatchClient>>;

impl<H: Handle> Registry<H> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a registry that already holds `handle`
    pub fn with_handle(handle: H) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(handle))),
        }
    }

    /// Store `handle` unless one is already registered.
    ///
    /// Returns `false` (and keeps the existing handle) on a repeat call.
    pub fn initialize(&self, handle: H) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            log::warn!("{} already initialized, ignoring", H::KIND);
            return false;
        }
        *slot = Some(handle);
        log::debug!("{} initialized", H::KIND);
        true
    }

    /// Clear the registered handle and hand it back for teardown
    pub fn invalidate(&self) -> Option<H> {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        let previous = slot.take();
        if previous.is_none() {
            log::warn!("{} is not initialized, nothing to invalidate", H::KIND);
        } else {
            log::debug!("{} invalidated", H::KIND);
        }
        previous
    }

    pub fn get(&self) -> Result<H> {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(H::not_initialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl<H: Handle> Clone for Registry<H> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<H: Handle> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle> std::fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &H::KIND)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
