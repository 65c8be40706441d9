//! End-to-end scenarios: two stores synchronized over real transports.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use storesync_core::{ActionFilters, CodecRegistry, JsonCodec, TransferCodec};
use storesync_types::{Action, Frame, MessageType, Transferable};
use tokio::sync::mpsc;

use crate::config::SyncConfig;
use crate::error::ClientError;
use crate::store::{StoreBuilder, StoreHandle};
use crate::transport::{LoopbackTransport, StreamTransport, Transport};

const COUNTER: &str = "action::dummy-action:one";
const HAND_OFF: &str = "action::port:hand-off";

#[derive(Debug, Clone, Default)]
struct Counter {
    value: i64,
    port: Option<LoopbackTransport>,
}

fn counter_reducer(state: &mut Counter, action: &Action) {
    match action.name.as_str() {
        COUNTER => match action.value["counter"].as_str() {
            Some("INCREMENT") => state.value += 1,
            Some("DECREMENT") => state.value -= 1,
            _ => {}
        },
        // Only the receiving side claims the endpoint.
        HAND_OFF if action.is_remote() => {
            if let Some(port) = action
                .transfer
                .as_ref()
                .and_then(|t| t.take::<LoopbackTransport>())
            {
                state.port = Some(port);
            }
        }
        _ => {}
    }
}

fn increment() -> Action {
    Action::with_value(COUNTER, json!({ "counter": "INCREMENT" }))
}

fn decrement() -> Action {
    Action::with_value(COUNTER, json!({ "counter": "DECREMENT" }))
}

fn is_decrement(action: &Action) -> bool {
    action.value["counter"] == "DECREMENT"
}

fn codecs() -> Arc<CodecRegistry> {
    Arc::new(
        CodecRegistry::new()
            .with(COUNTER, JsonCodec)
            .with(HAND_OFF, TransferCodec),
    )
}

fn counter_store(
    name: &str,
    transport: impl Transport + 'static,
    filters: ActionFilters,
) -> StoreHandle<Counter> {
    StoreBuilder::new(name, Counter::default())
        .reducer(counter_reducer)
        .spawn(SyncConfig::new(Arc::new(transport), codecs()).with_filters(filters))
}

async fn wait_for_counter(store: &StoreHandle<Counter>, expected: i64) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.state().await.unwrap().value == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        reached.is_ok(),
        "{} never reached {}, stuck at {}",
        store.name(),
        expected,
        store.state().await.unwrap().value
    );
}

async fn wait_until_ready(store: &StoreHandle<Counter>) {
    let ready = tokio::time::timeout(Duration::from_secs(5), async {
        while !store.is_store_sync_ready().await.unwrap() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(ready.is_ok(), "{} never became ready", store.name());
}

async fn synced_pair(
    filters1: ActionFilters,
    filters2: ActionFilters,
) -> (StoreHandle<Counter>, StoreHandle<Counter>) {
    let (port1, port2) = LoopbackTransport::pair();
    let store1 = counter_store("store1", port1, filters1);
    let store2 = counter_store("store2", port2, filters2);
    store1.start_store_sync().unwrap();
    store2.start_store_sync().unwrap();
    wait_until_ready(&store1).await;
    wait_until_ready(&store2).await;
    (store1, store2)
}

// ===========================================
// Scenario A: actions before sync reach both stores
// ===========================================

#[tokio::test]
async fn actions_dispatched_before_sync_are_flushed() {
    let (port1, port2) = LoopbackTransport::pair();
    let store1 = counter_store("store1", port1, ActionFilters::accept_all());
    let store2 = counter_store("store2", port2, ActionFilters::accept_all());

    store1.dispatch(increment()).unwrap();
    assert_eq!(store1.sync_state().await.unwrap().pending_actions.len(), 1);

    store1.start_store_sync().unwrap();
    store2.start_store_sync().unwrap();

    wait_for_counter(&store1, 1).await;
    wait_for_counter(&store2, 1).await;
    wait_until_ready(&store1).await;
    wait_until_ready(&store2).await;
    assert!(store1.sync_state().await.unwrap().pending_actions.is_empty());
}

#[tokio::test]
async fn actions_after_sync_flow_both_ways_in_order() {
    let (store1, store2) =
        synced_pair(ActionFilters::accept_all(), ActionFilters::accept_all()).await;

    store1.dispatch(increment()).unwrap();
    store1.dispatch(increment()).unwrap();
    store2.dispatch(decrement()).unwrap();

    wait_for_counter(&store1, 1).await;
    wait_for_counter(&store2, 1).await;
}

#[tokio::test]
async fn remote_actions_are_not_echoed() {
    let (port1, port2) = LoopbackTransport::pair();
    let spy2 = port2.clone();
    let store1 = counter_store("store1", port1, ActionFilters::accept_all());
    let store2 = counter_store("store2", port2, ActionFilters::accept_all());
    store1.start_store_sync().unwrap();
    store2.start_store_sync().unwrap();
    wait_until_ready(&store1).await;
    wait_until_ready(&store2).await;

    store1.dispatch(increment()).unwrap();
    wait_for_counter(&store2, 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(store1.state().await.unwrap().value, 1);
    assert_eq!(spy2.sent_count(MessageType::Action), 0);
}

// ===========================================
// Scenario B: send filter keeps an action local
// ===========================================

#[tokio::test]
async fn send_filter_keeps_action_local() {
    let (store1, store2) = synced_pair(
        ActionFilters::accept_all().with_send(|a| !is_decrement(a)),
        ActionFilters::accept_all(),
    )
    .await;

    store1.dispatch(decrement()).unwrap();
    store1.dispatch(increment()).unwrap();

    wait_for_counter(&store1, 0).await;
    // The increment was sent after the decrement; once it lands, the
    // decrement would have too.
    wait_for_counter(&store2, 1).await;
    assert!(store1.sync_state().await.unwrap().pending_actions.is_empty());
}

// ===========================================
// Scenario C: receive filter drops an incoming action
// ===========================================

#[tokio::test]
async fn receive_filter_drops_incoming_action() {
    let (store1, store2) = synced_pair(
        ActionFilters::accept_all().with_receive(|a| !is_decrement(a)),
        ActionFilters::accept_all(),
    )
    .await;

    store2.dispatch(decrement()).unwrap();
    store2.dispatch(increment()).unwrap();

    wait_for_counter(&store2, 0).await;
    // FIFO delivery: the increment arrives after the dropped decrement.
    wait_for_counter(&store1, 1).await;
}

// ===========================================
// Scenario D: unanswered pings exhaust the handshake
// ===========================================

#[tokio::test(start_paused = true)]
async fn unanswered_pings_raise_error() {
    let (port1, _silent) = LoopbackTransport::pair();
    let spy = port1.clone();
    let (errors_tx, mut errors) = mpsc::unbounded_channel();

    let store1 = StoreBuilder::new("store1", Counter::default())
        .reducer(counter_reducer)
        .spawn(
            SyncConfig::new(Arc::new(port1), codecs()).on_error(move |e: ClientError| {
                let _ = errors_tx.send(e.to_string());
            }),
        );
    store1.start_store_sync().unwrap();

    let message = errors.recv().await.unwrap();
    assert_eq!(message, "Unable to get a ping response from the other port");
    assert_eq!(spy.sent_count(MessageType::Ping), 15);
    assert!(!store1.is_store_sync_ready().await.unwrap());
}

// ===========================================
// Scenario E: destroy closes the transport exactly once
// ===========================================

#[tokio::test]
async fn destroy_while_syncing_closes_transport_once() {
    let (port1, port2) = LoopbackTransport::pair();
    let spy1 = port1.clone();
    let store1 = counter_store("store1", port1, ActionFilters::accept_all());
    let store2 = counter_store("store2", port2, ActionFilters::accept_all());
    store1.start_store_sync().unwrap();
    store2.start_store_sync().unwrap();
    wait_until_ready(&store1).await;

    store1.destroy().await.unwrap();
    store1.destroy().await.unwrap();

    assert_eq!(spy1.close_count(), 1);
    assert!(matches!(
        store1.dispatch(increment()),
        Err(ClientError::StoreClosed)
    ));

    // The survivor keeps working locally.
    store2.dispatch(increment()).unwrap();
    wait_for_counter(&store2, 1).await;
}

// ===========================================
// Transferables and port hand-off
// ===========================================

#[tokio::test]
async fn transferable_endpoint_moves_to_other_store() {
    let (store1, store2) =
        synced_pair(ActionFilters::accept_all(), ActionFilters::accept_all()).await;

    let (endpoint, third_party) = LoopbackTransport::pair();
    let handle = Transferable::new(endpoint);
    store1
        .dispatch(Action::new(HAND_OFF).with_transfer(handle.clone()))
        .unwrap();

    let port = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(port) = store2.state().await.unwrap().port {
                return port;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(handle.is_detached());
    port.send(Frame::ping()).await.unwrap();
    assert_eq!(
        third_party.recv().await.unwrap().message_type(),
        MessageType::Ping
    );
}

#[tokio::test]
async fn filtered_hand_off_still_detaches_sender() {
    let (store1, store2) = synced_pair(
        ActionFilters::accept_all(),
        ActionFilters::accept_all().with_receive(|a| a.name != HAND_OFF),
    )
    .await;

    let (endpoint, _third_party) = LoopbackTransport::pair();
    let handle = Transferable::new(endpoint);
    store1
        .dispatch(Action::new(HAND_OFF).with_transfer(handle.clone()))
        .unwrap();
    store1.dispatch(increment()).unwrap();

    // FIFO delivery: the increment lands after the dropped hand-off.
    wait_for_counter(&store2, 1).await;
    assert!(store2.state().await.unwrap().port.is_none());
    assert!(handle.is_detached());
}

// ===========================================
// Stream transport
// ===========================================

#[tokio::test]
async fn stores_sync_over_json_stream() {
    let (left, right) = StreamTransport::duplex_pair(64 * 1024);
    let store1 = counter_store("store1", left, ActionFilters::accept_all());
    let store2 = counter_store("store2", right, ActionFilters::accept_all());

    store1.dispatch(increment()).unwrap();
    store1.start_store_sync().unwrap();
    store2.start_store_sync().unwrap();
    store2.dispatch(increment()).unwrap();

    wait_for_counter(&store1, 2).await;
    wait_for_counter(&store2, 2).await;
}
