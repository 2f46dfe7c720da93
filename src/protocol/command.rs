//! Handshake and command payloads.
//!
//! # Message Kinds
//!
//! | Kind | Direction | Identifier |
//! |------|-----------|------------|
//! | `auth_required` | Server → Client | none |
//! | `auth` | Client → Server | none |
//! | `auth_ok` | Server → Client | none |
//! | `auth_invalid` | Server → Client | none |
//! | `subscribe_events` | Client → Server | assigned on send |
//! | `call_service` | Client → Server | assigned on send |
//! | `get_states` | Client → Server | assigned on send |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::CommandId;

// ============================================================================
// Handshake
// ============================================================================

/// Access token presented in answer to `auth_required`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    /// Long-lived access token.
    pub access_token: String,
}

/// Rejection of the presented access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInvalid {
    /// Reason supplied by the server.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Commands
// ============================================================================

/// Subscribe to one event type, or to every event when `event_type` is
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubscribeEvents {
    /// Command identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,

    /// Event type filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// Call a service in a domain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CallService {
    /// Command identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,

    /// Service domain, e.g. `light`.
    pub domain: String,

    /// Service name, e.g. `turn_on`.
    pub service: String,

    /// Service arguments.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub service_data: Map<String, Value>,
}

impl CallService {
    /// Creates an unidentified service call.
    #[inline]
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: Map<String, Value>,
    ) -> Self {
        Self {
            id: None,
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }
}

/// Fetch the state of every entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GetStates {
    /// Command identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CommandId>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_subscribe_all_omits_event_type() {
        let command = SubscribeEvents {
            id: Some(CommandId::SUBSCRIPTION),
            event_type: None,
        };
        let json = serde_json::to_string(&command).expect("serialize");
        assert_eq!(json, r#"{"id":1}"#);
    }

    #[test]
    fn test_unassigned_id_is_omitted() {
        let json = serde_json::to_string(&GetStates::default()).expect("serialize");
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_call_service_omits_empty_data() {
        let command = CallService::new("light", "turn_off", Map::new());
        let json = serde_json::to_string(&command).expect("serialize");
        assert_eq!(json, r#"{"domain":"light","service":"turn_off"}"#);
    }

    #[test]
    fn test_call_service_with_data() {
        let data = json!({ "entity_id": "light.kitchen" });
        let Value::Object(data) = data else {
            panic!("object literal");
        };
        let mut command = CallService::new("light", "turn_on", data);
        command.id = Some(CommandId::new(4));

        let json = serde_json::to_string(&command).expect("serialize");
        assert_eq!(
            json,
            r#"{"id":4,"domain":"light","service":"turn_on","service_data":{"entity_id":"light.kitchen"}}"#
        );
    }
}
