//! Event message types.
//!
//! Events are notifications pushed by the server on the global subscription
//! channel. The `data` payload is decoded in a second pass: for
//! `state_changed` events it becomes a [`StateChangedData`], otherwise it
//! stays an open map.
//!
//! # Format
//!
//! ```json
//! {
//!   "type": "event",
//!   "id": 1,
//!   "event": {
//!     "event_type": "call_service",
//!     "time_fired": "2020-04-06T15:12:03.123456+00:00",
//!     "origin": "LOCAL",
//!     "data": { ... }
//!   }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::identifiers::CommandId;

use super::State;
use super::timestamp::{self, Timestamp};

// ============================================================================
// Constants
// ============================================================================

/// Event type whose data decodes into [`StateChangedData`].
pub const STATE_CHANGED: &str = "state_changed";

// ============================================================================
// EventMessage
// ============================================================================

/// Envelope of an event pushed on a subscription channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// Identifier of the subscription that produced the event.
    pub id: CommandId,

    /// The event itself.
    pub event: Event,
}

// ============================================================================
// Event
// ============================================================================

/// A fired event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Event type, e.g. `state_changed` or `call_service`.
    pub event_type: String,

    /// When the event fired.
    #[serde(with = "timestamp")]
    pub time_fired: Timestamp,

    /// `LOCAL` or `REMOTE`.
    pub origin: String,

    /// Event payload.
    pub data: EventData,
}

impl Event {
    /// Returns `true` if this is a state change.
    #[inline]
    #[must_use]
    pub fn is_state_changed(&self) -> bool {
        self.event_type == STATE_CHANGED
    }

    /// Returns the state change payload, if any.
    #[inline]
    #[must_use]
    pub fn state_changed(&self) -> Option<&StateChangedData> {
        match &self.data {
            EventData::StateChanged(data) => Some(data),
            EventData::Other(_) => None,
        }
    }

    /// Gets a field of an open data payload.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.data {
            EventData::Other(map) => map.get(key),
            EventData::StateChanged(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    event_type: String,
    #[serde(with = "timestamp")]
    time_fired: Timestamp,
    #[serde(default)]
    origin: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawEvent::deserialize(deserializer)?;
        let data = EventData::decode(&raw.event_type, raw.data.as_deref())
            .map_err(serde::de::Error::custom)?;

        Ok(Self {
            event_type: raw.event_type,
            time_fired: raw.time_fired,
            origin: raw.origin,
            data,
        })
    }
}

// ============================================================================
// EventData
// ============================================================================

/// Event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    /// Payload of a `state_changed` event.
    StateChanged(Box<StateChangedData>),
    /// Payload of any other event type.
    Other(Map<String, Value>),
}

impl EventData {
    /// Second decode pass over the raw `data` field.
    fn decode(event_type: &str, raw: Option<&RawValue>) -> Result<Self, serde_json::Error> {
        match (event_type, raw) {
            (STATE_CHANGED, Some(raw)) => {
                serde_json::from_str(raw.get()).map(|data| Self::StateChanged(Box::new(data)))
            }
            (STATE_CHANGED, None) => Err(serde::de::Error::missing_field("data")),
            (_, Some(raw)) => serde_json::from_str::<Option<Map<String, Value>>>(raw.get())
                .map(|map| Self::Other(map.unwrap_or_default())),
            (_, None) => Ok(Self::Other(Map::new())),
        }
    }
}

// ============================================================================
// StateChangedData
// ============================================================================

/// Payload of a `state_changed` event.
///
/// `old_state` is `None` when the entity was just created and `new_state`
/// is `None` when it was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangedData {
    /// Entity that changed.
    pub entity_id: String,

    /// State before the change.
    pub old_state: Option<State>,

    /// State after the change.
    pub new_state: Option<State>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state_json(entity_id: &str, state: &str) -> String {
        format!(
            r#"{{"entity_id":"{entity_id}","state":"{state}","attributes":{{}},"last_changed":"2020-04-06T15:12:03.123456+00:00","last_updated":"2020-04-06T15:12:03.123456+00:00"}}"#
        )
    }

    #[test]
    fn test_state_changed_parsing() {
        let json = format!(
            r#"{{
                "event_type": "state_changed",
                "time_fired": "2020-04-06T15:12:03.123456+00:00",
                "origin": "LOCAL",
                "data": {{
                    "entity_id": "light.kitchen",
                    "old_state": {},
                    "new_state": {}
                }}
            }}"#,
            state_json("light.kitchen", "off"),
            state_json("light.kitchen", "on"),
        );

        let event: Event = serde_json::from_str(&json).expect("parse event");
        assert!(event.is_state_changed());

        let data = event.state_changed().expect("state changed data");
        assert_eq!(data.entity_id, "light.kitchen");
        assert_eq!(data.old_state.as_ref().map(|s| s.state.as_str()), Some("off"));
        assert_eq!(data.new_state.as_ref().map(|s| s.state.as_str()), Some("on"));
    }

    #[test]
    fn test_state_changed_entity_created() {
        let json = format!(
            r#"{{
                "event_type": "state_changed",
                "time_fired": "2020-04-06T15:12:03.123456+00:00",
                "origin": "LOCAL",
                "data": {{"entity_id": "sensor.new", "old_state": null, "new_state": {}}}
            }}"#,
            state_json("sensor.new", "12"),
        );

        let event: Event = serde_json::from_str(&json).expect("parse event");
        let data = event.state_changed().expect("state changed data");
        assert!(data.old_state.is_none());
        assert!(data.new_state.is_some());
    }

    #[test]
    fn test_other_event_keeps_open_map() {
        let json = r#"{
            "event_type": "call_service",
            "time_fired": "2020-04-06T15:12:03.123456+00:00",
            "origin": "LOCAL",
            "data": {"domain": "light", "service": "turn_on"}
        }"#;

        let event: Event = serde_json::from_str(json).expect("parse event");
        assert!(!event.is_state_changed());
        assert!(event.state_changed().is_none());
        assert_eq!(event.get("domain").and_then(Value::as_str), Some("light"));
    }

    #[test]
    fn test_data_shaped_like_state_change_is_not_specialized() {
        let json = format!(
            r#"{{
                "event_type": "custom_event",
                "time_fired": "2020-04-06T15:12:03.123456+00:00",
                "origin": "REMOTE",
                "data": {{"entity_id": "light.kitchen", "old_state": null, "new_state": {}}}
            }}"#,
            state_json("light.kitchen", "on"),
        );

        let event: Event = serde_json::from_str(&json).expect("parse event");
        assert!(matches!(event.data, EventData::Other(_)));
    }

    #[test]
    fn test_malformed_state_change_is_error() {
        let json = r#"{
            "event_type": "state_changed",
            "time_fired": "2020-04-06T15:12:03.123456+00:00",
            "origin": "LOCAL",
            "data": {"old_state": null}
        }"#;

        assert!(serde_json::from_str::<Event>(json).is_err());
    }

    #[test]
    fn test_event_message_envelope() {
        let json = r#"{
            "id": 1,
            "event": {
                "event_type": "homeassistant_start",
                "time_fired": "2020-04-06T15:12:03.123456+00:00",
                "origin": "LOCAL",
                "data": {}
            }
        }"#;

        let message: EventMessage = serde_json::from_str(json).expect("parse");
        assert!(message.id.is_subscription());
        assert_eq!(message.event.event_type, "homeassistant_start");
    }
}
