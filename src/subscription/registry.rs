//! Keyed listener registry.
//!
//! A registry maps a key (event type or entity id) to an ordered list of
//! listener handles, and each handle to its callback. Dispatch snapshots
//! the callbacks registered for a key and runs each one on the tokio
//! blocking pool, so a slow or panicking listener never blocks the caller,
//! the event loop, or the other listeners.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::identifiers::ListenerHandle;

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Receives a shared reference to the dispatched payload.
pub type Listener<P> = Arc<dyn Fn(Arc<P>) + Send + Sync>;

struct RegistryInner<P> {
    /// Last handle issued; handles start at 1.
    last_handle: u32,
    /// Callbacks by handle.
    listeners: FxHashMap<ListenerHandle, Listener<P>>,
    /// Handles by key, in subscription order.
    keys: FxHashMap<String, Vec<ListenerHandle>>,
    /// Key of each live handle.
    handle_keys: FxHashMap<ListenerHandle, String>,
}

// ============================================================================
// Registry
// ============================================================================

/// Thread-safe keyed listener registry.
pub struct Registry<P> {
    inner: Mutex<RegistryInner<P>>,
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                last_handle: 0,
                listeners: FxHashMap::default(),
                keys: FxHashMap::default(),
                handle_keys: FxHashMap::default(),
            }),
        }
    }
}

impl<P> Registry<P> {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` under `key`.
    ///
    /// Returns a handle that is unique within this registry and never
    /// reused. The callback is synchronous and may block; it runs on a
    /// blocking-pool thread, never on a runtime worker.
    pub fn subscribe<F>(&self, key: impl Into<String>, listener: F) -> ListenerHandle
    where
        F: Fn(Arc<P>) + Send + Sync + 'static,
    {
        let key = key.into();
        let mut inner = self.inner.lock();

        inner.last_handle += 1;
        let handle = ListenerHandle::new(inner.last_handle);

        inner.listeners.insert(handle, Arc::new(listener));
        inner.keys.entry(key.clone()).or_default().push(handle);
        inner.handle_keys.insert(handle, key);

        handle
    }

    /// Removes a listener.
    ///
    /// Unknown or already removed handles are ignored. Returns `true` if a
    /// listener was removed.
    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        let mut inner = self.inner.lock();

        if inner.listeners.remove(&handle).is_none() {
            return false;
        }

        if let Some(key) = inner.handle_keys.remove(&handle)
            && let Some(handles) = inner.keys.get_mut(&key)
        {
            handles.retain(|h| *h != handle);
            if handles.is_empty() {
                inner.keys.remove(&key);
            }
        }

        true
    }

    /// Returns the callbacks registered for `key`, in subscription order.
    #[must_use]
    pub fn snapshot(&self, key: &str) -> Vec<Listener<P>> {
        let inner = self.inner.lock();
        inner
            .keys
            .get(key)
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|handle| inner.listeners.get(handle).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of listeners registered for `key`.
    #[must_use]
    pub fn listener_count(&self, key: &str) -> usize {
        self.inner.lock().keys.get(key).map_or(0, Vec::len)
    }

    /// Returns the total number of live listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P: Send + Sync + 'static> Registry<P> {
    /// Delivers `payload` to every listener registered for `key`.
    ///
    /// Each callback runs via [`tokio::task::spawn_blocking`]. Returns the
    /// number of listeners scheduled. Must be called from within a tokio
    /// runtime.
    pub fn dispatch(&self, key: &str, payload: P) -> usize {
        let listeners = self.snapshot(key);
        if listeners.is_empty() {
            trace!(key, "No listeners for key");
            return 0;
        }

        let payload = Arc::new(payload);
        let count = listeners.len();
        for listener in listeners {
            let payload = Arc::clone(&payload);
            tokio::task::spawn_blocking(move || listener(payload));
        }

        trace!(key, count, "Dispatched to listeners");
        count
    }
}

// ============================================================================
// Tests
// ============================================================================
