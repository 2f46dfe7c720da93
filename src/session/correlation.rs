//! Pending command table.
//!
//! Maps the identifier of every outstanding command to the one-shot slot
//! its caller is waiting on. Identifier `1` is reserved for the global
//! subscription, so allocation starts at `2`.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::ResultMessage;

// ============================================================================
// Types
// ============================================================================

/// Slot resolved with the command's result.
pub type ResultSlot = oneshot::Sender<Result<ResultMessage>>;

struct CorrelationInner {
    /// Last identifier handed out.
    last_id: CommandId,
    /// Outstanding slots by identifier.
    slots: FxHashMap<CommandId, ResultSlot>,
}

// ============================================================================
// CorrelationTable
// ============================================================================

/// Thread-safe table of outstanding commands.
pub struct CorrelationTable {
    inner: Mutex<CorrelationInner>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self {
            inner: Mutex::new(CorrelationInner {
                last_id: CommandId::SUBSCRIPTION,
                slots: FxHashMap::default(),
            }),
        }
    }
}

impl CorrelationTable {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next identifier.
    ///
    /// Identifiers are strictly increasing and never reused.
    pub fn allocate(&self) -> CommandId {
        let mut inner = self.inner.lock();
        inner.last_id = inner.last_id.next();
        inner.last_id
    }

    /// Records the slot waiting for `id`.
    ///
    /// Slots whose caller stopped waiting are pruned first.
    pub fn register(&self, id: CommandId, slot: ResultSlot) {
        let mut inner = self.inner.lock();

        let before = inner.slots.len();
        inner.slots.retain(|_, slot| !slot.is_closed());
        let pruned = before - inner.slots.len();
        if pruned > 0 {
            debug!(pruned, "Pruned abandoned command slots");
        }

        debug_assert!(!inner.slots.contains_key(&id), "identifier {id} reused");
        inner.slots.insert(id, slot);
    }

    /// Resolves the slot matching the result's identifier.
    ///
    /// Returns `false` if no command is waiting for it (stale or duplicate
    /// result); other slots are untouched.
    pub fn resolve(&self, result: ResultMessage) -> bool {
        let id = result.id;
        let slot = self.inner.lock().slots.remove(&id);

        match slot {
            Some(slot) => {
                if slot.send(Ok(result)).is_err() {
                    trace!(%id, "Caller stopped waiting for result");
                }
                true
            }
            None => {
                debug!(%id, "Dropping result for unknown command");
                false
            }
        }
    }

    /// Fails the slot waiting for `id` with `error`.
    ///
    /// Used when a result arrives but cannot be decoded. Returns `false` if
    /// no command is waiting for `id`.
    pub fn fail(&self, id: CommandId, error: Error) -> bool {
        let slot = self.inner.lock().slots.remove(&id);

        match slot {
            Some(slot) => {
                let _ = slot.send(Err(error));
                true
            }
            None => {
                debug!(%id, "No command waiting for failed result");
                false
            }
        }
    }

    /// Fails every outstanding slot with [`Error::ConnectionClosed`].
    ///
    /// Returns the number of cancelled commands.
    pub fn cancel_all(&self) -> usize {
        let pending: Vec<_> = self.inner.lock().slots.drain().collect();
        let count = pending.len();

        for (_, slot) in pending {
            let _ = slot.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Cancelled pending commands");
        }
        count
    }

    /// Returns the number of outstanding commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Returns `true` if no command is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
