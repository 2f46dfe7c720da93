//! Protocol message union and codec.
//!
//! Decoding is a two-step process: the `type` discriminator is read on its
//! own, then the whole frame is decoded into the variant it names. Encoding
//! always writes `type` first followed by the variant's fields in
//! declaration order, omitting absent optional fields.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

use super::command::{Auth, AuthInvalid, CallService, GetStates, SubscribeEvents};
use super::event::EventMessage;
use super::result::ResultMessage;

// ============================================================================
// Discriminators
// ============================================================================

pub const TYPE_AUTH_REQUIRED: &str = "auth_required";
pub const TYPE_AUTH: &str = "auth";
pub const TYPE_AUTH_OK: &str = "auth_ok";
pub const TYPE_AUTH_INVALID: &str = "auth_invalid";
pub const TYPE_SUBSCRIBE_EVENTS: &str = "subscribe_events";
pub const TYPE_CALL_SERVICE: &str = "call_service";
pub const TYPE_GET_STATES: &str = "get_states";
pub const TYPE_RESULT: &str = "result";
pub const TYPE_EVENT: &str = "event";

// ============================================================================
// Message
// ============================================================================

/// Every message kind of the WebSocket API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Server asks for credentials.
    AuthRequired,
    /// Client presents its access token.
    Auth(Auth),
    /// Token accepted.
    AuthOk,
    /// Token rejected.
    AuthInvalid(AuthInvalid),
    /// Subscribe to events.
    SubscribeEvents(SubscribeEvents),
    /// Call a service.
    CallService(CallService),
    /// Fetch all states.
    GetStates(GetStates),
    /// Answer to a command.
    Result(ResultMessage),
    /// Event pushed on a subscription.
    Event(EventMessage),
}

#[derive(Deserialize)]
struct Discriminator<'a> {
    #[serde(rename = "type", borrow)]
    kind: Cow<'a, str>,
}

#[derive(Deserialize)]
struct ResultEnvelope<'a> {
    #[serde(rename = "type", borrow)]
    kind: Cow<'a, str>,
    id: CommandId,
}

impl Message {
    /// Decodes one frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Decode`] if the frame is not a JSON object with a string
    ///   `type`, or its fields do not match the named variant
    /// - [`Error::UnknownMessageType`] if `type` names no known variant
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let discriminator: Discriminator<'_> = serde_json::from_slice(bytes)
            .map_err(|e| Error::decode(format!("message discriminator: {e}")))?;

        let message = match discriminator.kind.as_ref() {
            TYPE_AUTH_REQUIRED => Self::AuthRequired,
            TYPE_AUTH => Self::Auth(decode_variant(bytes, TYPE_AUTH)?),
            TYPE_AUTH_OK => Self::AuthOk,
            TYPE_AUTH_INVALID => Self::AuthInvalid(decode_variant(bytes, TYPE_AUTH_INVALID)?),
            TYPE_SUBSCRIBE_EVENTS => {
                Self::SubscribeEvents(decode_variant(bytes, TYPE_SUBSCRIBE_EVENTS)?)
            }
            TYPE_CALL_SERVICE => Self::CallService(decode_variant(bytes, TYPE_CALL_SERVICE)?),
            TYPE_GET_STATES => Self::GetStates(decode_variant(bytes, TYPE_GET_STATES)?),
            TYPE_RESULT => Self::Result(decode_variant(bytes, TYPE_RESULT)?),
            TYPE_EVENT => Self::Event(decode_variant(bytes, TYPE_EVENT)?),
            other => return Err(Error::unknown_message_type(other)),
        };

        Ok(message)
    }

    /// Reads the identifier of a `result` frame without decoding its payload.
    ///
    /// Returns `None` if the frame is not a `result` or carries no usable
    /// `id`. Lets a caller be released when the payload itself is malformed.
    #[must_use]
    pub fn result_id(bytes: &[u8]) -> Option<CommandId> {
        let envelope: ResultEnvelope<'_> = serde_json::from_slice(bytes).ok()?;
        (envelope.kind == TYPE_RESULT).then_some(envelope.id)
    }

    /// Encodes into a text frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns the wire discriminator.
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::AuthRequired => TYPE_AUTH_REQUIRED,
            Self::Auth(_) => TYPE_AUTH,
            Self::AuthOk => TYPE_AUTH_OK,
            Self::AuthInvalid(_) => TYPE_AUTH_INVALID,
            Self::SubscribeEvents(_) => TYPE_SUBSCRIBE_EVENTS,
            Self::CallService(_) => TYPE_CALL_SERVICE,
            Self::GetStates(_) => TYPE_GET_STATES,
            Self::Result(_) => TYPE_RESULT,
            Self::Event(_) => TYPE_EVENT,
        }
    }

    /// Returns the identifier, if the variant carries one and it is set.
    #[must_use]
    pub fn id(&self) -> Option<CommandId> {
        match self {
            Self::SubscribeEvents(m) => m.id,
            Self::CallService(m) => m.id,
            Self::GetStates(m) => m.id,
            Self::Result(m) => Some(m.id),
            Self::Event(m) => Some(m.id),
            Self::AuthRequired | Self::Auth(_) | Self::AuthOk | Self::AuthInvalid(_) => None,
        }
    }

    /// Returns `true` for commands that need an identifier before sending.
    #[inline]
    #[must_use]
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Self::SubscribeEvents(_) | Self::CallService(_) | Self::GetStates(_)
        )
    }

    /// Attaches an identifier to a command. Other variants are returned
    /// unchanged.
    #[must_use]
    pub fn with_id(mut self, id: CommandId) -> Self {
        match &mut self {
            Self::SubscribeEvents(m) => m.id = Some(id),
            Self::CallService(m) => m.id = Some(id),
            Self::GetStates(m) => m.id = Some(id),
            _ => {}
        }
        self
    }
}

/// Second decode pass into the concrete variant payload.
fn decode_variant<T: DeserializeOwned>(bytes: &[u8], kind: &str) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::decode(format!("{kind}: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
