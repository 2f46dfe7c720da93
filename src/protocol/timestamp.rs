//! Wire timestamp format.
//!
//! Home Assistant timestamps carry microsecond precision and an explicit
//! UTC offset, e.g. `2020-04-06T15:12:03.123456+00:00`. Any other shape is
//! rejected on decode.
//!
//! Used as a serde `with` module:
//!
//! ```ignore
//! #[serde(with = "crate::protocol::timestamp")]
//! pub last_changed: Timestamp,
//! ```

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::Error;

/// Timestamp type used by every timestamped wire field.
pub type Timestamp = DateTime<FixedOffset>;

/// `YYYY-MM-DDTHH:MM:SS.ffffff±HH:MM`
pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Byte length of a timestamp in [`FORMAT`].
const WIRE_LEN: usize = 32;

/// Parses a wire timestamp.
///
/// # Errors
///
/// Returns [`Error::Decode`] if `value` is not in [`FORMAT`]. The fraction
/// must have exactly six digits.
pub fn parse(value: &str) -> crate::error::Result<Timestamp> {
    // chrono treats the fraction as optional when parsing
    if !has_wire_shape(value) {
        return Err(Error::decode(format!(
            "timestamp {value:?} is not YYYY-MM-DDTHH:MM:SS.ffffff+HH:MM"
        )));
    }

    DateTime::parse_from_str(value, FORMAT)
        .map_err(|e| Error::decode(format!("timestamp {value:?}: {e}")))
}

fn has_wire_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == WIRE_LEN
        && bytes[10] == b'T'
        && bytes[19] == b'.'
        && bytes[20..26].iter().all(u8::is_ascii_digit)
        && matches!(bytes[26], b'+' | b'-')
}

/// Formats a timestamp for the wire.
#[must_use]
pub fn format(value: &Timestamp) -> String {
    value.format(FORMAT).to_string()
}

pub fn serialize<S>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&value.format(FORMAT))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

// ============================================================================
// Tests
// ============================================================================
