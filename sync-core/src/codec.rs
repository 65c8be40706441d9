//! Action codecs for storesync.
//!
//! Every action that crosses the boundary is encoded by the codec registered
//! under its name. The registry is built once per store and shared by
//! reference; there is no process-wide instance, so several stores in one
//! process (e.g. in tests) stay isolated.
//!
//! A codec turns an action into a [`Payload`]: either plain JSON that gets
//! copied, or a [`Transferable`] handle plus the JSON remainder. The registry
//! maps payloads to and from the wire envelope ([`WireValue`]) and the
//! frame's transfer list.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use storesync_types::{Action, Frame, SerializedAction, Transferable, WireMessage, WireValue};
use thiserror::Error;

/// Errors raised by a single codec.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The value does not have the expected shape.
    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The codec moves a handle but none was provided.
    #[error("expected a transferable handle")]
    ExpectedTransfer,

    /// The codec copies values but a handle was provided.
    #[error("unexpected transferable handle")]
    UnexpectedTransfer,

    /// The handle's contents were already moved elsewhere.
    #[error("transferable handle is detached")]
    DetachedTransfer,
}

/// Errors raised by the codec registry.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec registered for the action name.
    #[error("no codec registered for action {0}")]
    MissingCodec(String),

    /// The codec failed to encode the action.
    #[error("failed to encode {name}: {source}")]
    Encode {
        /// Action name.
        name: String,
        /// Underlying codec error.
        #[source]
        source: PayloadError,
    },

    /// The codec failed to decode the action.
    #[error("failed to decode {name}: {source}")]
    Decode {
        /// Action name.
        name: String,
        /// Underlying codec error.
        #[source]
        source: PayloadError,
    },

    /// The message points at a transfer slot the frame does not carry.
    #[error("action {name} references transfer slot {slot}, frame carries {available}")]
    TransferSlot {
        /// Action name.
        name: String,
        /// Referenced slot.
        slot: usize,
        /// Number of handles in the frame.
        available: usize,
    },
}

/// Encoded form of an action's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Copied JSON value.
    Plain(Value),
    /// Handle that moves, plus the copied remainder.
    Transferable(Transferable, Value),
}

/// Payload reconstructed on the receiving side.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Reconstructed value.
    pub value: Value,
    /// Handle moved with the action, if any.
    pub transfer: Option<Transferable>,
}

impl Decoded {
    fn plain(value: Value) -> Self {
        Self {
            value,
            transfer: None,
        }
    }
}

/// Serialize/deserialize pair for one action name.
pub trait ActionCodec: Send + Sync {
    /// Encode an action's payload for the wire.
    fn to_payload(&self, action: &Action) -> Result<Payload, PayloadError>;

    /// Reconstruct a payload received from the wire.
    fn from_payload(&self, payload: Payload) -> Result<Decoded, PayloadError>;
}

/// Copies the JSON value verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ActionCodec for JsonCodec {
    fn to_payload(&self, action: &Action) -> Result<Payload, PayloadError> {
        if action.transfer.is_some() {
            return Err(PayloadError::UnexpectedTransfer);
        }
        Ok(Payload::Plain(action.value.clone()))
    }

    fn from_payload(&self, payload: Payload) -> Result<Decoded, PayloadError> {
        match payload {
            Payload::Plain(value) => Ok(Decoded::plain(value)),
            Payload::Transferable(..) => Err(PayloadError::UnexpectedTransfer),
        }
    }
}

/// For actions that carry no value.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoValueCodec;

impl ActionCodec for NoValueCodec {
    fn to_payload(&self, _action: &Action) -> Result<Payload, PayloadError> {
        Ok(Payload::Plain(Value::Null))
    }

    fn from_payload(&self, payload: Payload) -> Result<Decoded, PayloadError> {
        match payload {
            Payload::Plain(_) => Ok(Decoded::plain(Value::Null)),
            Payload::Transferable(..) => Err(PayloadError::UnexpectedTransfer),
        }
    }
}

/// Validates the value against `T` when encoding and when decoding.
pub struct TypedCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedCodec<T> {
    /// Create a codec for payloads of type `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypedCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Serialize + DeserializeOwned> TypedCodec<T> {
    fn normalize(value: Value) -> Result<Value, PayloadError> {
        let typed: T = serde_json::from_value(value)?;
        Ok(serde_json::to_value(typed)?)
    }
}

impl<T: Serialize + DeserializeOwned> ActionCodec for TypedCodec<T> {
    fn to_payload(&self, action: &Action) -> Result<Payload, PayloadError> {
        if action.transfer.is_some() {
            return Err(PayloadError::UnexpectedTransfer);
        }
        Ok(Payload::Plain(Self::normalize(action.value.clone())?))
    }

    fn from_payload(&self, payload: Payload) -> Result<Decoded, PayloadError> {
        match payload {
            Payload::Plain(value) => Ok(Decoded::plain(Self::normalize(value)?)),
            Payload::Transferable(..) => Err(PayloadError::UnexpectedTransfer),
        }
    }
}

/// Moves the action's transferable handle and copies its value.
///
/// Encoding detaches the action's handle; the frame carries the only live
/// copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransferCodec;

impl ActionCodec for TransferCodec {
    fn to_payload(&self, action: &Action) -> Result<Payload, PayloadError> {
        let handle = action
            .transfer
            .as_ref()
            .ok_or(PayloadError::ExpectedTransfer)?
            .transfer()
            .ok_or(PayloadError::DetachedTransfer)?;
        Ok(Payload::Transferable(handle, action.value.clone()))
    }

    fn from_payload(&self, payload: Payload) -> Result<Decoded, PayloadError> {
        match payload {
            Payload::Transferable(handle, rest) => Ok(Decoded {
                value: rest,
                transfer: Some(handle),
            }),
            Payload::Plain(_) => Err(PayloadError::ExpectedTransfer),
        }
    }
}

/// Store-scoped map from action name to codec.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ActionCodec>>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, name: impl Into<String>, codec: impl ActionCodec + 'static) -> Self {
        self.register(name, codec);
        self
    }

    /// Register a codec, returning the one it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        codec: impl ActionCodec + 'static,
    ) -> Option<Arc<dyn ActionCodec>> {
        self.codecs.insert(name.into(), Arc::new(codec))
    }

    /// Look up the codec for an action name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ActionCodec>> {
        self.codecs.get(name)
    }

    /// Check if a codec is registered for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.codecs.contains_key(name)
    }

    /// Number of registered codecs.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Encode an action into a frame sent on behalf of `store_name`.
    pub fn encode(&self, action: &Action, store_name: &str) -> Result<Frame, CodecError> {
        let codec = self
            .get(&action.name)
            .ok_or_else(|| CodecError::MissingCodec(action.name.clone()))?;
        let payload = codec
            .to_payload(action)
            .map_err(|source| CodecError::Encode {
                name: action.name.clone(),
                source,
            })?;

        let (serialized_value, transfer) = match payload {
            Payload::Plain(value) => (WireValue::Plain { value }, Vec::new()),
            Payload::Transferable(handle, rest) => {
                (WireValue::Transferable { slot: 0, rest }, vec![handle])
            }
        };

        let message = WireMessage::Action {
            action: SerializedAction {
                name: action.name.clone(),
                serialized_value,
                store_name: store_name.to_string(),
            },
        };
        Ok(Frame::with_transfer(message, transfer))
    }

    /// Decode a received action, tagging it with the sender's store name.
    pub fn decode(
        &self,
        serialized: SerializedAction,
        transfer: &[Transferable],
    ) -> Result<Action, CodecError> {
        let SerializedAction {
            name,
            serialized_value,
            store_name,
        } = serialized;

        let codec = self
            .get(&name)
            .ok_or_else(|| CodecError::MissingCodec(name.clone()))?;

        let payload = match serialized_value {
            WireValue::Plain { value } => Payload::Plain(value),
            WireValue::Transferable { slot, rest } => {
                let handle = transfer
                    .get(slot)
                    .cloned()
                    .ok_or_else(|| CodecError::TransferSlot {
                        name: name.clone(),
                        slot,
                        available: transfer.len(),
                    })?;
                Payload::Transferable(handle, rest)
            }
        };

        let decoded = codec
            .from_payload(payload)
            .map_err(|source| CodecError::Decode {
                name: name.clone(),
                source,
            })?;

        let mut action = Action::with_value(name, decoded.value).from_store(store_name);
        action.transfer = decoded.transfer;
        Ok(action)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("names", &self.names())
            .finish()
    }
}
