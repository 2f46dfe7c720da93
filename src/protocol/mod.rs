//! WebSocket protocol message types.
//!
//! This module owns the wire schema of the Home Assistant WebSocket API
//! and the codec that maps frames to typed messages.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `auth_required` / `auth` / `auth_ok` / `auth_invalid` | both | Handshake |
//! | `subscribe_events`, `call_service`, `get_states` | Client → Server | Commands |
//! | `result` | Server → Client | Command answer |
//! | `event` | Server → Client | Subscription notification |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Handshake and command payloads |
//! | `event` | Event envelope and state change data |
//! | `message` | Tagged union and codec |
//! | `result` | Command results and error codes |
//! | `state` | Entity state records |
//! | `timestamp` | Wire timestamp format |

// ============================================================================
// Submodules
// ============================================================================

/// Handshake and command payloads.
pub mod command;

/// Event message types.
pub mod event;

/// Message union and codec.
pub mod message;

/// Command results.
pub mod result;

/// Entity states.
pub mod state;

/// Timestamp format.
pub mod timestamp;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Auth, AuthInvalid, CallService, GetStates, SubscribeEvents};
pub use event::{Event, EventData, EventMessage, STATE_CHANGED, StateChangedData};
pub use message::Message;
pub use result::{ResultError, ResultMessage, ResultPayload, describe_code};
pub use state::State;
pub use timestamp::Timestamp;
