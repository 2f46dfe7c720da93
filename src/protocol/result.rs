//! Command results.
//!
//! Every command issued with an identifier is answered by exactly one
//! `result` message carrying the same identifier.
//!
//! # Format
//!
//! Success:
//! ```json
//! { "type": "result", "id": 3, "success": true, "result": [ ... ] }
//! ```
//!
//! Error:
//! ```json
//! { "type": "result", "id": 3, "success": false,
//!   "error": { "code": 3, "message": "Service not found." } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

use super::State;

// ============================================================================
// Error Codes
// ============================================================================

/// A non-increasing identifier has been supplied.
pub const ERR_ID_REUSE: i64 = 1;

/// Received message is not in expected format.
pub const ERR_INVALID_FORMAT: i64 = 2;

/// Requested item cannot be found.
pub const ERR_NOT_FOUND: i64 = 3;

/// Resolves a known error code to its description.
#[must_use]
pub fn describe_code(code: i64) -> &'static str {
    match code {
        ERR_ID_REUSE => "A non-increasing identifier has been supplied.",
        ERR_INVALID_FORMAT => "Received message is not in expected format (voluptuous validation error).",
        ERR_NOT_FOUND => "Requested item cannot be found.",
        _ => "unknown",
    }
}

// ============================================================================
// ResultMessage
// ============================================================================

/// Answer to a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMessage {
    /// Identifier of the answered command.
    pub id: CommandId,

    /// Whether the command succeeded.
    pub success: bool,

    /// Failure details (only when `success` is false).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,

    /// Typed result (only when the command returns data).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
}

impl ResultMessage {
    /// Creates a successful result.
    #[inline]
    #[must_use]
    pub fn success(id: CommandId, result: Option<ResultPayload>) -> Self {
        Self {
            id,
            success: true,
            error: None,
            result,
        }
    }

    /// Creates a failed result.
    #[inline]
    #[must_use]
    pub fn failure(id: CommandId, error: ResultError) -> Self {
        Self {
            id,
            success: false,
            error: Some(error),
            result: None,
        }
    }

    /// Converts into the payload, or the error if the command failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] if `success` is false. A failure without an
    /// error object is reported with code `0`.
    pub fn into_result(self) -> Result<Option<ResultPayload>> {
        if self.success {
            return Ok(self.result);
        }
        let error = self
            .error
            .unwrap_or_else(|| ResultError::new(0, "no error details supplied"));
        Err(Error::Command(error))
    }
}

#[derive(Deserialize)]
struct RawResultMessage {
    id: CommandId,
    success: bool,
    #[serde(default)]
    error: Option<ResultError>,
    #[serde(default)]
    result: Option<Box<RawValue>>,
}

impl<'de> Deserialize<'de> for ResultMessage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawResultMessage::deserialize(deserializer)?;
        let result = raw
            .result
            .as_deref()
            .map(|payload| ResultPayload::decode(payload.get()))
            .transpose()
            .map_err(serde::de::Error::custom)?;

        Ok(Self {
            id: raw.id,
            success: raw.success,
            error: raw.error,
            result,
        })
    }
}

// ============================================================================
// ResultPayload
// ============================================================================

/// Data returned by a successful command.
///
/// The variant is chosen by the outer JSON shape: an array decodes as a
/// list of [`State`] records, an object as an open map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    /// Entity states (answer to `get_states`).
    States(Vec<State>),
    /// Any other object-shaped result.
    Map(Map<String, Value>),
}

impl ResultPayload {
    /// Decodes a raw payload, selecting the variant by its first
    /// non-whitespace byte.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload is neither an array nor an
    /// object, or does not match the selected shape.
    pub fn decode(raw: &str) -> Result<Self> {
        let first = raw.bytes().find(|b| !b.is_ascii_whitespace());
        match first {
            Some(b'[') => serde_json::from_str(raw)
                .map(Self::States)
                .map_err(|e| Error::decode(format!("result states: {e}"))),
            Some(b'{') => serde_json::from_str(raw)
                .map(Self::Map)
                .map_err(|e| Error::decode(format!("result map: {e}"))),
            _ => Err(Error::decode(format!(
                "result payload must be an array or object, got {raw}"
            ))),
        }
    }

    /// Returns the states if this is a state list.
    #[inline]
    #[must_use]
    pub fn as_states(&self) -> Option<&[State]> {
        match self {
            Self::States(states) => Some(states),
            Self::Map(_) => None,
        }
    }

    /// Consumes into the state list, if this is one.
    #[inline]
    #[must_use]
    pub fn into_states(self) -> Option<Vec<State>> {
        match self {
            Self::States(states) => Some(states),
            Self::Map(_) => None,
        }
    }
}

// ============================================================================
// ResultError
// ============================================================================

/// Failure details of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message from the server.
    pub message: String,
}

impl ResultError {
    /// Creates an error payload.
    #[inline]
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub fn code(&self) -> i64 {
        self.code
    }

    /// Returns the server message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the description of the code, or `"unknown"`.
    #[inline]
    #[must_use]
    pub fn description(&self) -> &'static str {
        describe_code(self.code)
    }
}

impl fmt::Display for ResultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code {} ({}): {}",
            self.code,
            self.description(),
            self.message
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHT: &str = r#"{"entity_id":"light.kitchen","state":"on","attributes":{},"last_changed":"2020-04-06T15:12:03.123456+00:00","last_updated":"2020-04-06T15:12:03.123456+00:00"}"#;

    #[test]
    fn test_describe_code() {
        assert_eq!(describe_code(3), "Requested item cannot be found.");
        assert_eq!(describe_code(1), "A non-increasing identifier has been supplied.");
        assert_eq!(describe_code(42), "unknown");
    }

    #[test]
    fn test_success_without_payload() {
        let json = r#"{"id": 5, "success": true, "result": null}"#;
        let result: ResultMessage = serde_json::from_str(json).expect("parse");
        assert_eq!(result.id, CommandId::new(5));
        assert!(result.success);
        assert!(result.result.is_none());
        assert_eq!(result.into_result().expect("success"), None);
    }

    #[test]
    fn test_array_payload_selects_states() {
        let json = format!(r#"{{"id": 2, "success": true, "result": [{LIGHT}]}}"#);
        let result: ResultMessage = serde_json::from_str(&json).expect("parse");
        let states = result.result.and_then(ResultPayload::into_states).expect("states");
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].entity_id, "light.kitchen");
    }

    #[test]
    fn test_object_payload_selects_map() {
        let json = r#"{"id": 2, "success": true, "result": {"context": {"id": "x"}}}"#;
        let result: ResultMessage = serde_json::from_str(json).expect("parse");
        match result.result {
            Some(ResultPayload::Map(map)) => assert!(map.contains_key("context")),
            other => panic!("expected map payload, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_skips_leading_whitespace() {
        let payload = ResultPayload::decode("  \n\t[]").expect("decode");
        assert_eq!(payload, ResultPayload::States(Vec::new()));
    }

    #[test]
    fn test_scalar_payload_is_decode_error() {
        let err = ResultPayload::decode("42").expect_err("scalar");
        assert!(matches!(err, Error::Decode { .. }));

        let json = r#"{"id": 2, "success": true, "result": "ok"}"#;
        assert!(serde_json::from_str::<ResultMessage>(json).is_err());
    }

    #[test]
    fn test_failure_into_command_error() {
        let json = r#"{"id": 9, "success": false, "error": {"code": 3, "message": "x"}}"#;
        let result: ResultMessage = serde_json::from_str(json).expect("parse");
        let err = result.into_result().expect_err("failure");
        let details = err.as_command_error().expect("command error");
        assert_eq!(details.code(), 3);
        assert_eq!(details.description(), "Requested item cannot be found.");
        assert_eq!(details.message(), "x");
        assert!(err.to_string().contains("Requested item cannot be found."));
        assert!(err.to_string().contains('x'));
    }

    #[test]
    fn test_failure_without_details() {
        let err = ResultMessage {
            id: CommandId::new(4),
            success: false,
            error: None,
            result: None,
        }
        .into_result()
        .expect_err("failure");
        assert_eq!(err.as_command_error().map(ResultError::description), Some("unknown"));
    }
}
