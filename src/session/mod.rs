//! Session protocol engine.
//!
//! The session drives the authentication handshake, establishes the global
//! event subscription, and routes every inbound message either to the
//! correlation table (command results) or to a listener registry (events).
//!
//! # State Machine
//!
//! ```text
//!  Init ──auth_required──► AuthSent ──auth_ok──► SubscribeSent ──result{id=1}──► Listening
//!                            │                        │
//!                       auth_invalid            result{id=1,
//!                            │                  success=false}
//!                            ▼                        ▼
//!                          Closed ◄──────────────── Closed
//! ```
//!
//! Any state may move to `Closed` when the connection ends.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `correlation` | Pending command table |
//! | `machine` | Handshake and routing state machine |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Submodules
// ============================================================================

/// Pending command table.
pub mod correlation;

/// Session state machine.
pub mod machine;

// ============================================================================
// Re-exports
// ============================================================================

pub use correlation::CorrelationTable;
pub use machine::{ReadyCallback, SessionMachine};

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Connected, waiting for `auth_required`.
    #[default]
    Init,
    /// Access token sent, waiting for the verdict.
    AuthSent,
    /// Global subscription sent, waiting for its result.
    SubscribeSent,
    /// Handshake complete; events and command results are routed.
    Listening,
    /// Session ended.
    Closed,
}

impl SessionState {
    /// Returns `true` once the session has ended.
    #[inline]
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns `true` while commands may be issued.
    #[inline]
    #[must_use]
    pub const fn is_listening(self) -> bool {
        matches!(self, Self::Listening)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::AuthSent => "auth_sent",
            Self::SubscribeSent => "subscribe_sent",
            Self::Listening => "listening",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// CloseReason
// ============================================================================

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client asked to close.
    Requested,
    /// The server closed the connection.
    RemoteClosed,
    /// The access token was rejected.
    AuthInvalid {
        /// Message supplied by the server.
        message: String,
    },
    /// The global event subscription was rejected.
    SubscribeFailed {
        /// Description of the failure.
        message: String,
    },
    /// Reading or writing a frame failed.
    Transport {
        /// Description of the transport failure.
        message: String,
    },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("closed by client"),
            Self::RemoteClosed => f.write_str("closed by server"),
            Self::AuthInvalid { message } => write!(f, "authentication failed: {message}"),
            Self::SubscribeFailed { message } => write!(f, "event subscription failed: {message}"),
            Self::Transport { message } => write!(f, "transport failure: {message}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
