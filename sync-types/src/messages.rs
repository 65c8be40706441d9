//! Protocol messages for storesync.
//!
//! These are the JSON-serializable messages exchanged between two stores.
//! Transferable handles never appear here; a [`WireValue::Transferable`]
//! names a slot in the enclosing [`Frame`](crate::Frame)'s transfer list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::TypesError;

/// All possible protocol messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// Liveness check
    Ping,
    /// Answer to a ping
    Pong,
    /// A serialized action for the remote store
    Action {
        /// The encoded action
        action: SerializedAction,
    },
}

impl WireMessage {
    /// Get the message type discriminator.
    pub fn message_type(&self) -> MessageType {
        match self {
            WireMessage::Ping => MessageType::Ping,
            WireMessage::Pong => MessageType::Pong,
            WireMessage::Action { .. } => MessageType::Action,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, TypesError> {
        serde_json::to_vec(self).map_err(TypesError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, TypesError> {
        serde_json::from_slice(bytes).map_err(TypesError::Deserialization)
    }
}

/// Message type discriminator, used for logging and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `{ "type": "ping" }`
    Ping,
    /// `{ "type": "pong" }`
    Pong,
    /// `{ "type": "action", ... }`
    Action,
}

impl MessageType {
    /// The wire tag for this message type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Action => "action",
        }
    }
}

impl TryFrom<&str> for MessageType {
    type Error = TypesError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ping" => Ok(MessageType::Ping),
            "pong" => Ok(MessageType::Pong),
            "action" => Ok(MessageType::Action),
            other => Err(TypesError::InvalidMessageType(other.to_string())),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action as produced by its codec, ready for the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedAction {
    /// Action name (selects the codec on the receiving side)
    pub name: String,
    /// Encoded payload
    pub serialized_value: WireValue,
    /// Name of the sending store
    pub store_name: String,
}

/// Encoded action payload.
///
/// An explicit envelope: a payload either is copied as plain JSON or moves a
/// transferable handle alongside the JSON remainder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WireValue {
    /// Copied JSON payload
    Plain {
        /// The payload
        value: Value,
    },
    /// Payload whose handle moves with the frame
    Transferable {
        /// Index into the frame's transfer list
        slot: usize,
        /// Copied remainder of the payload
        rest: Value,
    },
}
