//! Type-safe identifiers for session entities.
//!
//! Newtype wrappers keep command identifiers and listener handles from
//! being mixed up with each other or with plain integers.
//!
//! | Type | Scope | Allocation |
//! |------|-------|------------|
//! | [`CommandId`] | one session | strictly increasing, `1` reserved |
//! | [`ListenerHandle`] | one registry | strictly increasing, never reused |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// CommandId
// ============================================================================

/// Identifier correlating a command with its `result` message.
///
/// Values are positive and strictly increasing within a session.
/// Identifier `1` is reserved for the global event subscription that the
/// session issues once authentication succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// The reserved identifier of the global event subscription.
    pub const SUBSCRIPTION: CommandId = CommandId(1);

    /// Creates an identifier from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is the reserved subscription identifier.
    #[inline]
    #[must_use]
    pub const fn is_subscription(self) -> bool {
        self.0 == Self::SUBSCRIPTION.0
    }

    /// Returns the identifier following this one.
    #[inline]
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ListenerHandle
// ============================================================================

/// Opaque token returned when a listener is subscribed.
///
/// Handles are unique within the registry that issued them. The event and
/// state registries number their handles independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerHandle(u32);

impl ListenerHandle {
    /// Creates a handle from a raw value.
    #[inline]
    #[must_use]
    pub(crate) const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
