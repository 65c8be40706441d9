//! Identity types for storesync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for a dispatched action.
///
/// UUID v4 format (16 bytes). Assigned when the action is created; an
/// action received from the remote side gets a fresh id locally.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(uuid::Uuid);

impl ActionId {
    /// Create a new random ActionId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create an ActionId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        uuid::Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", self.0)
    }
}

/// Local identity of a frame handed to or received from a transport.
///
/// Never serialized onto the wire; transports that go through bytes assign
/// a fresh id on receipt. Used to recognise a frame when it comes back
/// around through a shared bus.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(uuid::Uuid);

impl FrameId {
    /// Create a new random FrameId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_id_is_uuid_v4() {
        let id = ActionId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn action_id_roundtrip() {
        let original = ActionId::new();
        let restored = ActionId::from_bytes(original.as_uuid().as_bytes()).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn action_id_from_invalid_length_fails() {
        assert!(ActionId::from_bytes(&[0u8; 4]).is_none());
    }

    #[test]
    fn frame_ids_are_unique() {
        assert_ne!(FrameId::new(), FrameId::new());
    }
}
