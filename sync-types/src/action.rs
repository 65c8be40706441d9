//! Actions dispatched into a store.

use serde_json::Value;

use crate::{ActionId, Transferable};

/// A named event describing a state change, with an optional payload.
///
/// `from_store` is set only on actions that arrived from the remote side;
/// its presence keeps the action from being forwarded back out.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Action name, also the key of its codec.
    pub name: String,
    /// JSON payload (`Value::Null` when the action carries none).
    pub value: Value,
    /// Locally unique id.
    pub id: ActionId,
    /// Name of the remote store this action came from.
    pub from_store: Option<String>,
    /// Handle that moves with the action instead of being copied.
    pub transfer: Option<Transferable>,
}

impl Action {
    /// Create a value-less action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::Null,
            id: ActionId::new(),
            from_store: None,
            transfer: None,
        }
    }

    /// Create an action with a payload.
    pub fn with_value(name: impl Into<String>, value: Value) -> Self {
        Self {
            value,
            ..Self::new(name)
        }
    }

    /// Attach a transferable handle.
    pub fn with_transfer(mut self, transfer: Transferable) -> Self {
        self.transfer = Some(transfer);
        self
    }

    /// Tag the action as having arrived from `store`.
    pub fn from_store(mut self, store: impl Into<String>) -> Self {
        self.from_store = Some(store.into());
        self
    }

    /// Check if the action arrived from the remote side.
    pub fn is_remote(&self) -> bool {
        self.from_store.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_action_is_local_and_valueless() {
        let action = Action::new("action::editor:focus");
        assert_eq!(action.name, "action::editor:focus");
        assert_eq!(action.value, Value::Null);
        assert!(!action.is_remote());
        assert!(action.transfer.is_none());
    }

    #[test]
    fn each_action_gets_its_own_id() {
        let a = Action::new("x");
        let b = Action::new("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn from_store_marks_remote() {
        let action = Action::with_value("counter", json!({"counter": "INCREMENT"})).from_store("worker");
        assert!(action.is_remote());
        assert_eq!(action.from_store.as_deref(), Some("worker"));
        assert_eq!(action.value["counter"], "INCREMENT");
    }
}
