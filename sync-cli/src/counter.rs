//! Counter store used by the demo.

use serde::Serialize;
use serde_json::json;
use storesync_types::Action;

/// Name of the counter action.
pub const COUNTER_ACTION: &str = "action::dummy-action:one";

/// Demo store state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub value: i64,
    /// Counter actions that came from the other store.
    pub received: u32,
}

pub fn increment() -> Action {
    Action::with_value(COUNTER_ACTION, json!({ "counter": "INCREMENT" }))
}

pub fn decrement() -> Action {
    Action::with_value(COUNTER_ACTION, json!({ "counter": "DECREMENT" }))
}

pub fn is_decrement(action: &Action) -> bool {
    action.name == COUNTER_ACTION && action.value["counter"] == "DECREMENT"
}

/// Apply counter actions; everything else is ignored.
pub fn reduce(state: &mut Counter, action: &Action) {
    if action.name != COUNTER_ACTION {
        return;
    }
    if action.is_remote() {
        state.received += 1;
    }
    match action.value["counter"].as_str() {
        Some("INCREMENT") => state.value += 1,
        Some("DECREMENT") => state.value -= 1,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_up_and_down() {
        let mut state = Counter::default();
        reduce(&mut state, &increment());
        reduce(&mut state, &increment());
        reduce(&mut state, &decrement());
        assert_eq!(state.value, 1);
        assert_eq!(state.received, 0);
    }

    #[test]
    fn counts_remote_actions() {
        let mut state = Counter::default();
        reduce(&mut state, &increment().from_store("store1"));
        reduce(&mut state, &decrement().from_store("store1"));
        reduce(&mut state, &increment());
        assert_eq!(state.value, 1);
        assert_eq!(state.received, 2);
    }

    #[test]
    fn ignores_other_actions() {
        let mut state = Counter::default();
        reduce(&mut state, &Action::new("action::other"));
        reduce(
            &mut state,
            &Action::with_value(COUNTER_ACTION, json!({ "counter": "RESET" })),
        );
        assert_eq!(state.value, 0);
    }

    #[test]
    fn recognizes_decrement() {
        assert!(is_decrement(&decrement()));
        assert!(!is_decrement(&increment()));
    }
}
