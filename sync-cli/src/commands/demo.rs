//! Run two synchronized counter stores in one process.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use storesync_client::{
    LoopbackTransport, Settings, StoreBuilder, StoreHandle, StreamTransport, SyncConfig, Transport,
};
use storesync_core::{ActionFilters, CodecRegistry, JsonCodec};

use crate::counter::{self, Counter, COUNTER_ACTION};

/// Demo options.
#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    /// Increments dispatched on the first store before sync starts.
    pub count: u32,
    /// Keep decrements on the first store local.
    pub reject_decrement: bool,
    /// Connect the stores with a JSON-lines stream instead of in-memory channels.
    pub stream: bool,
}

/// Final state of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreReport {
    pub name: String,
    pub counter: i64,
    pub received: u32,
    pub ready: bool,
    pub pending: usize,
    pub high_water_mark: usize,
}

/// Outcome of a demo run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoReport {
    pub transport: &'static str,
    pub stores: Vec<StoreReport>,
}

/// Run the demo command and print the report.
pub async fn run(settings: &Settings, options: &DemoOptions, json: bool) -> Result<()> {
    let report = execute(settings, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== storesync demo ({}) ===", report.transport);
    println!();
    for store in &report.stores {
        println!("{}:", store.name);
        println!("  Counter: {}", store.counter);
        println!("  Received: {}", store.received);
        println!("  Ready:   {}", store.ready);
        println!(
            "  Pending: {} (high-water mark {})",
            store.pending, store.high_water_mark
        );
    }
    Ok(())
}

/// Run the two stores to convergence and collect their final state.
///
/// The first store dispatches `count` increments and one decrement before
/// either side starts syncing.
pub async fn execute(settings: &Settings, options: &DemoOptions) -> Result<DemoReport> {
    let (left, right, transport) = connect(options.stream);
    let codecs = Arc::new(CodecRegistry::new().with(COUNTER_ACTION, JsonCodec));
    let policy = settings.handshake.policy();

    let mut filters = ActionFilters::accept_all();
    if options.reject_decrement {
        filters = filters.with_send(|a| !counter::is_decrement(a));
    }

    let store1 = StoreBuilder::new("store1", Counter::default())
        .reducer(counter::reduce)
        .spawn(
            SyncConfig::new(left, Arc::clone(&codecs))
                .with_filters(filters)
                .with_policy(policy),
        );
    let store2 = StoreBuilder::new("store2", Counter::default())
        .reducer(counter::reduce)
        .spawn(SyncConfig::new(right, codecs).with_policy(policy));

    for _ in 0..options.count {
        store1.dispatch(counter::increment())?;
    }
    store1.dispatch(counter::decrement())?;
    tracing::info!(count = options.count, "Dispatched actions before sync");

    store1.start_store_sync()?;
    store2.start_store_sync()?;

    let expected_local = i64::from(options.count) - 1;
    let (expected_remote, expected_received) = if options.reject_decrement {
        (i64::from(options.count), options.count)
    } else {
        (expected_local, options.count.saturating_add(1))
    };

    // Store2's counter may already equal the expected value before anything
    // arrives, so wait for the delivery count instead.
    let deadline = policy.total_budget() + Duration::from_secs(1);
    tokio::time::timeout(deadline, async {
        loop {
            let flushed = store1.sync_state().await?;
            if flushed.is_ready()
                && flushed.pending_actions.is_empty()
                && store2.is_store_sync_ready().await?
                && store2.state().await?.received >= expected_received
            {
                return Ok::<_, anyhow::Error>(());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("stores did not converge before the handshake budget ran out")??;

    let stores = vec![report(&store1).await?, report(&store2).await?];
    store1.destroy().await?;
    store2.destroy().await?;

    if stores[0].counter != expected_local {
        bail!(
            "store1 counter is {}, expected {}",
            stores[0].counter,
            expected_local
        );
    }
    if stores[1].counter != expected_remote {
        bail!(
            "store2 counter is {}, expected {}",
            stores[1].counter,
            expected_remote
        );
    }

    Ok(DemoReport { transport, stores })
}

fn connect(stream: bool) -> (Arc<dyn Transport>, Arc<dyn Transport>, &'static str) {
    if stream {
        let (left, right) = StreamTransport::duplex_pair(64 * 1024);
        (Arc::new(left), Arc::new(right), "stream")
    } else {
        let (left, right) = LoopbackTransport::pair();
        (Arc::new(left), Arc::new(right), "loopback")
    }
}

async fn report(store: &StoreHandle<Counter>) -> Result<StoreReport> {
    let snapshot = store.sync_state().await?;
    let state = store.state().await?;
    Ok(StoreReport {
        name: store.name().to_string(),
        counter: state.value,
        received: state.received,
        ready: snapshot.is_ready(),
        pending: snapshot.pending_actions.len(),
        high_water_mark: snapshot.high_water_mark,
    })
}
