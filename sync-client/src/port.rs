//! Port lifecycle manager.
//!
//! Some processes must hand a fresh channel endpoint to a counterpart that
//! restarts (e.g. a worker serving several pages). The manager owns one
//! endpoint generation at a time and bridges it to an in-process broadcast
//! bus:
//!
//! ```text
//! port ──pump──▶ bus ──relay──▶ port
//! ```
//!
//! Frames the pump publishes are remembered by id, and the relay skips them,
//! so nothing the port sent is echoed back to it. The bus is FIFO, so when
//! the relay receives a remembered frame every older id is forgotten too; the
//! frames behind them were either relayed or skipped while lagging. The
//! memory never holds more ids than the bus retains frames, plus one.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use storesync_types::{Frame, FrameId};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::transport::Transport;

/// Default bus capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

type SeenFrames = Arc<Mutex<SeenIds>>;

fn lock(seen: &SeenFrames) -> MutexGuard<'_, SeenIds> {
    seen.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ids of frames the pump published, oldest first.
#[derive(Debug)]
struct SeenIds {
    order: VecDeque<FrameId>,
    ids: HashSet<FrameId>,
    limit: usize,
}

impl SeenIds {
    fn new(limit: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(limit),
            ids: HashSet::with_capacity(limit),
            limit,
        }
    }

    fn insert(&mut self, id: FrameId) {
        if self.order.len() == self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id);
        self.ids.insert(id);
    }

    /// Forget `id` and every id published before it.
    fn remove(&mut self, id: &FrameId) -> bool {
        if !self.ids.contains(id) {
            return false;
        }
        while let Some(oldest) = self.order.pop_front() {
            self.ids.remove(&oldest);
            if oldest == *id {
                break;
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.ids.clear();
    }
}

struct PortGeneration {
    transport: Arc<dyn Transport>,
    pump: JoinHandle<()>,
    relay: JoinHandle<()>,
}

/// Owns the current endpoint generation.
pub struct PortManager {
    bus: broadcast::Sender<Frame>,
    seen: SeenFrames,
    current: Option<PortGeneration>,
    generation: u64,
}

impl PortManager {
    /// Create a manager with a bus of the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (bus, _) = broadcast::channel(capacity);
        // The bus rounds its capacity up to a power of two. One extra slot
        // covers the frame the pump has remembered but not yet published.
        let retained = capacity.max(1).next_power_of_two() + 1;
        Self {
            bus,
            seen: Arc::new(Mutex::new(SeenIds::new(retained))),
            current: None,
            generation: 0,
        }
    }

    /// Subscribe to frames published on the bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.bus.subscribe()
    }

    /// Publish a frame on the bus, returning how many subscribers saw it.
    pub fn publish(&self, frame: Frame) -> usize {
        self.bus.send(frame).unwrap_or(0)
    }

    /// Number of hand-offs so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Check whether an endpoint is currently wired up.
    pub fn is_connected(&self) -> bool {
        self.current.is_some()
    }

    /// Replace the current endpoint with `transport`.
    ///
    /// The previous generation's tasks are stopped and its endpoint closed
    /// before the new one is wired up. Returns the new generation number.
    pub async fn hand_off(&mut self, transport: Arc<dyn Transport>) -> u64 {
        self.shutdown().await;

        // Subscribe before the pump starts so no published frame is missed.
        let relay_rx = self.bus.subscribe();
        let relay = tokio::spawn(run_relay(
            relay_rx,
            Arc::clone(&transport),
            Arc::clone(&self.seen),
        ));
        let pump = tokio::spawn(run_pump(
            Arc::clone(&transport),
            self.bus.clone(),
            Arc::clone(&self.seen),
        ));

        self.generation += 1;
        self.current = Some(PortGeneration {
            transport,
            pump,
            relay,
        });
        tracing::debug!(generation = self.generation, "Port handed off");
        self.generation
    }

    /// Tear down the current generation, closing its endpoint once.
    pub async fn shutdown(&mut self) {
        let Some(previous) = self.current.take() else {
            return;
        };
        previous.pump.abort();
        previous.relay.abort();
        if let Err(e) = previous.transport.close().await {
            tracing::error!(generation = self.generation, "Failed to close port: {}", e);
        }
        lock(&self.seen).clear();
    }
}

impl Default for PortManager {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl std::fmt::Debug for PortManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortManager")
            .field("generation", &self.generation)
            .field("connected", &self.current.is_some())
            .finish_non_exhaustive()
    }
}

async fn run_pump(transport: Arc<dyn Transport>, bus: broadcast::Sender<Frame>, seen: SeenFrames) {
    loop {
        match transport.recv().await {
            Ok(frame) => {
                lock(&seen).insert(frame.id);
                if bus.send(frame).is_err() {
                    tracing::debug!("No bus subscribers, frame dropped");
                }
            }
            Err(e) if e.is_fatal() => {
                tracing::debug!("Port pump stopped: {}", e);
                return;
            }
            Err(e) => tracing::warn!("Skipping unreadable frame from port: {}", e),
        }
    }
}

async fn run_relay(
    mut bus: broadcast::Receiver<Frame>,
    transport: Arc<dyn Transport>,
    seen: SeenFrames,
) {
    loop {
        match bus.recv().await {
            Ok(frame) => {
                if lock(&seen).remove(&frame.id) {
                    continue;
                }
                if let Err(e) = transport.send(frame).await {
                    tracing::warn!("Failed to relay frame to port: {}", e);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Port relay lagging, frames skipped");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
