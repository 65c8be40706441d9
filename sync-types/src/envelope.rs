//! Frame - what a transport carries.

use crate::{FrameId, MessageType, Transferable, WireMessage};

/// A wire message plus the handles that move with it.
///
/// The transfer list travels out-of-band of the JSON message; a
/// `WireValue::Transferable { slot, .. }` indexes into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Local identity of this frame
    pub id: FrameId,
    /// The protocol message
    pub message: WireMessage,
    /// Handles transferred with the message
    pub transfer: Vec<Transferable>,
}

impl Frame {
    /// Wrap a message with no transferables.
    pub fn new(message: WireMessage) -> Self {
        Self {
            id: FrameId::new(),
            message,
            transfer: Vec::new(),
        }
    }

    /// Wrap a message together with its transfer list.
    pub fn with_transfer(message: WireMessage, transfer: Vec<Transferable>) -> Self {
        Self {
            id: FrameId::new(),
            message,
            transfer,
        }
    }

    /// A ping frame.
    pub fn ping() -> Self {
        Self::new(WireMessage::Ping)
    }

    /// A pong frame.
    pub fn pong() -> Self {
        Self::new(WireMessage::Pong)
    }

    /// Get the message type discriminator.
    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    /// Check if the frame moves any handles.
    pub fn has_transfer(&self) -> bool {
        !self.transfer.is_empty()
    }
}
