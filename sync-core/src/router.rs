//! Receive-side routing of wire messages.
//!
//! Pure: turns a received frame into a [`Route`] the sync slice acts on.

use storesync_types::{Action, Frame, WireMessage};

use crate::codec::{CodecError, CodecRegistry};
use crate::filter::ActionFilters;

/// What to do with a received frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Answer a ping.
    ReplyPong,
    /// The other side answered our ping.
    PortReady,
    /// Dispatch a remote action locally.
    Dispatch(Action),
    /// Nothing to dispatch.
    Skip {
        /// Action name.
        name: String,
        /// Why it was skipped.
        reason: SkipReason,
    },
}

/// Why a received action was not dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No codec registered for the name.
    MissingCodec,
    /// The codec could not reconstruct the value.
    Undecodable(String),
    /// The receive filter rejected it.
    Filtered,
}

/// Route a received frame.
pub fn route(frame: Frame, codecs: &CodecRegistry, filters: &ActionFilters) -> Route {
    let Frame {
        message, transfer, ..
    } = frame;

    match message {
        WireMessage::Ping => Route::ReplyPong,
        WireMessage::Pong => Route::PortReady,
        WireMessage::Action { action } => {
            let name = action.name.clone();
            match codecs.decode(action, &transfer) {
                Ok(action) if filters.allows_receive(&action) => Route::Dispatch(action),
                Ok(_) => Route::Skip {
                    name,
                    reason: SkipReason::Filtered,
                },
                Err(CodecError::MissingCodec(_)) => Route::Skip {
                    name,
                    reason: SkipReason::MissingCodec,
                },
                Err(e) => Route::Skip {
                    name,
                    reason: SkipReason::Undecodable(e.to_string()),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JsonCodec, TypedCodec};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use storesync_types::{SerializedAction, WireValue};

    #[derive(Serialize, Deserialize)]
    struct Counter {
        counter: String,
    }

    fn codecs() -> CodecRegistry {
        CodecRegistry::new()
            .with("counter", TypedCodec::<Counter>::new())
            .with("note", JsonCodec)
    }

    fn action_frame(name: &str, value: serde_json::Value) -> Frame {
        Frame::new(WireMessage::Action {
            action: SerializedAction {
                name: name.into(),
                serialized_value: WireValue::Plain { value },
                store_name: "worker".into(),
            },
        })
    }

    #[test]
    fn ping_gets_pong() {
        let route = route(Frame::ping(), &codecs(), &ActionFilters::accept_all());
        assert_eq!(route, Route::ReplyPong);
    }

    #[test]
    fn pong_marks_port_ready() {
        let route = route(Frame::pong(), &codecs(), &ActionFilters::accept_all());
        assert_eq!(route, Route::PortReady);
    }

    #[test]
    fn action_is_dispatched_with_origin() {
        let frame = action_frame("counter", json!({"counter": "INCREMENT"}));
        match route(frame, &codecs(), &ActionFilters::accept_all()) {
            Route::Dispatch(action) => {
                assert_eq!(action.name, "counter");
                assert_eq!(action.from_store.as_deref(), Some("worker"));
                assert_eq!(action.value, json!({"counter": "INCREMENT"}));
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn receive_filter_drops_action() {
        let filters =
            ActionFilters::accept_all().with_receive(|a| a.value["counter"] != "DECREMENT");
        let frame = action_frame("counter", json!({"counter": "DECREMENT"}));

        assert_eq!(
            route(frame, &codecs(), &filters),
            Route::Skip {
                name: "counter".into(),
                reason: SkipReason::Filtered
            }
        );
    }

    #[test]
    fn unknown_action_is_skipped() {
        let frame = action_frame("nope", json!(null));
        assert_eq!(
            route(frame, &codecs(), &ActionFilters::accept_all()),
            Route::Skip {
                name: "nope".into(),
                reason: SkipReason::MissingCodec
            }
        );
    }

    #[test]
    fn malformed_value_is_skipped() {
        let frame = action_frame("counter", json!({"counter": 12}));
        assert!(matches!(
            route(frame, &codecs(), &ActionFilters::accept_all()),
            Route::Skip {
                reason: SkipReason::Undecodable(_),
                ..
            }
        ));
    }
}
