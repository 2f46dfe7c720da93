//! Entity state records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::timestamp::{self, Timestamp};

// ============================================================================
// State
// ============================================================================

/// Snapshot of one entity.
///
/// # Format
///
/// ```json
/// {
///   "entity_id": "light.kitchen",
///   "state": "on",
///   "attributes": { "brightness": 180 },
///   "last_changed": "2020-04-06T15:12:03.123456+00:00",
///   "last_updated": "2020-04-06T15:12:03.123456+00:00"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Entity identifier, `<domain>.<object_id>`.
    pub entity_id: String,

    /// Current state value.
    pub state: String,

    /// Free-form attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// When the state value last changed.
    #[serde(with = "timestamp")]
    pub last_changed: Timestamp,

    /// When the state or its attributes last changed.
    #[serde(with = "timestamp")]
    pub last_updated: Timestamp,
}

impl State {
    /// Returns the domain part of the entity id (`light` for `light.kitchen`).
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    /// Gets an attribute by name.
    #[inline]
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

// ============================================================================
// Tests
// ============================================================================
