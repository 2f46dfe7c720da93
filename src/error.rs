//! Error types for the Home Assistant session client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use hago::{Client, Result};
//!
//! async fn turn_on(client: &Client) -> Result<()> {
//!     client.call_service("light", "turn_on", Default::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::NotConnected`], [`Error::AlreadyConnected`] |
//! | Protocol | [`Error::Protocol`], [`Error::Decode`], [`Error::UnknownMessageType`], [`Error::UnexpectedMessage`], [`Error::UnknownChannel`], [`Error::NotReady`] |
//! | Handshake | [`Error::AuthInvalid`], [`Error::SubscribeFailed`] |
//! | Command | [`Error::Command`] |
//! | Session | [`Error::SessionClosed`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::CommandId;
use crate::protocol::ResultError;
use crate::session::{CloseReason, SessionState};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the connection cannot be established or a frame
    /// cannot be written.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// WebSocket connection closed while a command was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires a connection that was never opened.
    #[error("Not connected")]
    NotConnected,

    /// `connect` was called on a client that already has a live session.
    #[error("Already connected")]
    AlreadyConnected,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// A frame could not be decoded into a protocol message.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the malformed payload.
        message: String,
    },

    /// A frame carried a `type` discriminator this client does not know.
    #[error("Unknown message type: {message_type}")]
    UnknownMessageType {
        /// The unrecognized discriminator.
        message_type: String,
    },

    /// A message arrived that is not valid in the current session state.
    #[error("Unexpected message type {message_type} in state {state}")]
    UnexpectedMessage {
        /// Session state at the time of arrival.
        state: SessionState,
        /// Discriminator of the offending message.
        message_type: &'static str,
    },

    /// An event arrived on an identifier other than the global subscription.
    #[error("Unknown event channel: {id}")]
    UnknownChannel {
        /// Identifier carried by the event.
        id: CommandId,
    },

    /// A command was issued before the handshake completed.
    #[error("Session not ready (state {state})")]
    NotReady {
        /// Session state at the time of the call.
        state: SessionState,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// The server rejected the access token. Fatal.
    #[error("Authentication failed: {message}")]
    AuthInvalid {
        /// Message supplied by the server.
        message: String,
    },

    /// The global event subscription was rejected. Fatal.
    #[error("Event subscription failed: {message}")]
    SubscribeFailed {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// A command completed with `success: false`.
    #[error("Command failed: {0}")]
    Command(ResultError),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The session closed before the awaited condition was reached.
    #[error("Session closed: {reason}")]
    SessionClosed {
        /// Why the session ended.
        reason: CloseReason,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an unknown message type error.
    #[inline]
    pub fn unknown_message_type(message_type: impl Into<String>) -> Self {
        Self::UnknownMessageType {
            message_type: message_type.into(),
        }
    }

    /// Creates an unexpected message error.
    #[inline]
    pub fn unexpected_message(state: SessionState, message_type: &'static str) -> Self {
        Self::UnexpectedMessage {
            state,
            message_type,
        }
    }

    /// Creates an unknown channel error.
    #[inline]
    pub fn unknown_channel(id: CommandId) -> Self {
        Self::UnknownChannel { id }
    }

    /// Creates a not ready error.
    #[inline]
    pub fn not_ready(state: SessionState) -> Self {
        Self::NotReady { state }
    }

    /// Creates an authentication failure.
    #[inline]
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::AuthInvalid {
            message: message.into(),
        }
    }

    /// Creates a subscription failure.
    #[inline]
    pub fn subscribe_failed(message: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            message: message.into(),
        }
    }

    /// Creates a session closed error.
    #[inline]
    pub fn session_closed(reason: CloseReason) -> Self {
        Self::SessionClosed { reason }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error ends the session.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthInvalid { .. } | Self::SubscribeFailed { .. }
        )
    }

    /// Returns `true` if this is a protocol error.
    ///
    /// Protocol errors are reported but do not end the session.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. }
                | Self::Decode { .. }
                | Self::UnknownMessageType { .. }
                | Self::UnexpectedMessage { .. }
                | Self::UnknownChannel { .. }
                | Self::Json(_)
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::SessionClosed { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if a command reached the server and was rejected.
    #[inline]
    #[must_use]
    pub fn is_command_error(&self) -> bool {
        matches!(self, Self::Command(_))
    }

    /// Returns the server error payload of a rejected command.
    #[inline]
    #[must_use]
    pub fn as_command_error(&self) -> Option<&ResultError> {
        match self {
            Self::Command(error) => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("missing token");
        assert_eq!(err.to_string(), "Configuration error: missing token");
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::auth_invalid("bad token").is_fatal());
        assert!(Error::subscribe_failed("rejected").is_fatal());
        assert!(!Error::unknown_channel(CommandId::new(4)).is_fatal());
        assert!(!Error::ConnectionClosed.is_fatal());
    }

    #[test]
    fn test_is_protocol_error() {
        assert!(Error::unknown_channel(CommandId::new(4)).is_protocol_error());
        assert!(Error::unknown_message_type("pong").is_protocol_error());
        assert!(
            Error::unexpected_message(SessionState::Listening, "auth_ok").is_protocol_error()
        );
        assert!(!Error::auth_invalid("x").is_protocol_error());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::session_closed(CloseReason::Requested).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_command_error() {
        let err = Error::Command(ResultError::new(3, "x"));
        assert!(err.is_command_error());
        assert_eq!(err.as_command_error().map(ResultError::code), Some(3));
        assert!(Error::ConnectionClosed.as_command_error().is_none());
    }

    #[test]
    fn test_unexpected_message_display() {
        let err = Error::unexpected_message(SessionState::Listening, "auth_ok");
        assert_eq!(
            err.to_string(),
            "Unexpected message type auth_ok in state listening"
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_websocket_error() {
        let err: Error = WsError::ConnectionClosed.into();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.is_connection_error());
        assert!(!err.is_fatal());
    }
}
