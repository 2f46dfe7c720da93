//! Listener registries for pushed notifications.
//!
//! Two independent registries exist per client:
//!
//! | Registry | Key | Payload |
//! |----------|-----|---------|
//! | [`EventRegistry`] | event type | [`Event`] |
//! | [`StateRegistry`] | entity id | [`StateChangedData`] |
//!
//! Handles issued by one registry mean nothing to the other.

// ============================================================================
// Submodules
// ============================================================================

/// Generic keyed registry.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{Listener, Registry};

use crate::protocol::{Event, StateChangedData};

/// Listeners keyed by event type.
pub type EventRegistry = Registry<Event>;

/// Listeners keyed by entity id.
///
/// Keeps its own per-entity handle lists, independent of [`EventRegistry`].
pub type StateRegistry = Registry<StateChangedData>;
