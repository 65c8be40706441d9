//! Store runtime - the host-facing side of storesync.
//!
//! A store is a single tokio task owning the host state, the host reducer
//! and the sync slice. Every dispatch, incoming frame and query is a command
//! on one FIFO channel, so the slice's queue never needs a lock.
//!
//! # Architecture
//!
//! The store uses the pure sync slice (from sync-core) for protocol logic
//! and interprets its effects to perform actual I/O via the Transport trait.
//!
//! ```text
//! Host → StoreHandle → store task → Transport → other context
//!                          ↓
//!              sync-core (pure state machine)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let (port1, port2) = LoopbackTransport::pair();
//! let store = StoreBuilder::new("store1", Counter::default())
//!     .reducer(counter_reducer)
//!     .spawn(SyncConfig::new(Arc::new(port1), codecs));
//!
//! store.dispatch(increment())?;
//! store.start_store_sync()?;
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use storesync_core::{DropReason, Effect, Event, HandshakePolicy, SyncSlice, SyncSnapshot};
use storesync_types::{Action, Frame};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{ErrorHandler, SyncConfig};
use crate::error::ClientError;
use crate::handshake::Handshake;
use crate::transport::Transport;

/// Host reducer: applies an action to the host state.
pub type Reducer<S> = Box<dyn FnMut(&mut S, &Action) + Send>;

enum Command<S> {
    Dispatch(Action),
    StartSync,
    Incoming(Frame),
    State(oneshot::Sender<S>),
    Snapshot(oneshot::Sender<SyncSnapshot>),
    Destroy(oneshot::Sender<()>),
}

/// Builder for a synchronized store.
pub struct StoreBuilder<S> {
    name: String,
    state: S,
    reducer: Reducer<S>,
}

impl<S: Clone + Send + 'static> StoreBuilder<S> {
    /// Start building a store named `name` with an initial state.
    pub fn new(name: impl Into<String>, state: S) -> Self {
        Self {
            name: name.into(),
            state,
            reducer: Box::new(|_, _| {}),
        }
    }

    /// Set the host reducer.
    pub fn reducer(mut self, reducer: impl FnMut(&mut S, &Action) + Send + 'static) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    /// Spawn the store task on the current tokio runtime.
    ///
    /// The store starts receiving immediately (so pings are answered before
    /// the host starts sync) but does not ping until
    /// [`StoreHandle::start_store_sync`].
    pub fn spawn(self, config: SyncConfig) -> StoreHandle<S> {
        let (commands, inbox) = mpsc::unbounded_channel();
        let transport = Arc::clone(config.transport());
        let pump = spawn_pump(&self.name, Arc::clone(&transport), commands.downgrade());

        let task = StoreTask {
            slice: SyncSlice::new(
                self.name.clone(),
                config.filters().clone(),
                Arc::clone(config.codecs()),
            ),
            name: self.name.clone(),
            state: self.state,
            reducer: self.reducer,
            transport: Some(transport),
            policy: config.policy(),
            on_error: config.error_handler(),
            handshake: None,
            pump: Some(pump),
        };
        tokio::spawn(task.run(inbox));

        tracing::debug!(store = %self.name, "Store started");
        StoreHandle {
            name: Arc::from(self.name),
            commands,
        }
    }
}

/// Cloneable handle to a running store.
///
/// When every handle is dropped the store tears down exactly as
/// [`destroy`](Self::destroy) does.
pub struct StoreHandle<S> {
    name: Arc<str>,
    commands: mpsc::UnboundedSender<Command<S>>,
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            commands: self.commands.clone(),
        }
    }
}

impl<S> std::fmt::Debug for StoreHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("name", &self.name)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl<S: Send + 'static> StoreHandle<S> {
    /// Store name, used as `store_name` on the wire.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch an action into the store.
    pub fn dispatch(&self, action: Action) -> Result<(), ClientError> {
        self.send(Command::Dispatch(action))
    }

    /// Begin the handshake. Call once per transport generation.
    pub fn start_store_sync(&self) -> Result<(), ClientError> {
        self.send(Command::StartSync)
    }

    /// Snapshot of the sync state.
    pub async fn sync_state(&self) -> Result<SyncSnapshot, ClientError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        response.await.map_err(|_| ClientError::StoreClosed)
    }

    /// `start_sync && port_ready`.
    pub async fn is_store_sync_ready(&self) -> Result<bool, ClientError> {
        Ok(self.sync_state().await?.is_ready())
    }

    /// Copy of the host state.
    pub async fn state(&self) -> Result<S, ClientError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::State(reply))?;
        response.await.map_err(|_| ClientError::StoreClosed)
    }

    /// Abort the handshake and close the transport.
    ///
    /// Idempotent: destroying a closed store is a no-op.
    pub async fn destroy(&self) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Destroy(reply)).is_err() {
            return Ok(());
        }
        // A concurrent destroy may win; either way the store is gone.
        let _ = response.await;
        Ok(())
    }

    /// Check whether the store task has ended.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command<S>) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::StoreClosed)
    }
}

/// Forward received frames into the store.
///
/// Holds only a weak sender so a store nobody references can shut down.
fn spawn_pump<S: Send + 'static>(
    store: &str,
    transport: Arc<dyn Transport>,
    commands: mpsc::WeakUnboundedSender<Command<S>>,
) -> JoinHandle<()> {
    let store = store.to_string();
    tokio::spawn(async move {
        loop {
            match transport.recv().await {
                Ok(frame) => {
                    let Some(commands) = commands.upgrade() else {
                        break;
                    };
                    if commands.send(Command::Incoming(frame)).is_err() {
                        break;
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::debug!(store = %store, "Receive pump stopped: {}", e);
                    break;
                }
                Err(e) => tracing::warn!(store = %store, "Skipping unreadable frame: {}", e),
            }
        }
    })
}

async fn send_frame(store: &str, transport: Option<&Arc<dyn Transport>>, frame: Frame) {
    let Some(transport) = transport else {
        return;
    };
    let kind = frame.message_type();
    if let Err(e) = transport.send(frame).await {
        tracing::warn!(store = %store, kind = %kind, "Failed to send frame: {}", e);
    }
}

struct StoreTask<S> {
    name: String,
    state: S,
    reducer: Reducer<S>,
    slice: SyncSlice,
    transport: Option<Arc<dyn Transport>>,
    policy: HandshakePolicy,
    on_error: ErrorHandler,
    handshake: Option<Handshake>,
    pump: Option<JoinHandle<()>>,
}

impl<S: Clone + Send + 'static> StoreTask<S> {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command<S>>) {
        while let Some(command) = inbox.recv().await {
            match command {
                Command::Dispatch(action) => {
                    (self.reducer)(&mut self.state, &action);
                    self.apply(Event::Dispatched(action)).await;
                }
                Command::StartSync => self.apply(Event::StartSync).await,
                Command::Incoming(frame) => self.apply(Event::FrameReceived(frame)).await,
                Command::State(reply) => {
                    let _ = reply.send(self.state.clone());
                }
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.slice.state().snapshot());
                }
                Command::Destroy(reply) => {
                    self.teardown().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }

        // Every handle dropped.
        self.teardown().await;
    }

    /// Feed an event to the slice and execute the resulting effects.
    ///
    /// Remote actions dispatched here re-enter the slice as `Dispatched`
    /// events, processed in order after the current batch.
    async fn apply(&mut self, event: Event) {
        let mut events = VecDeque::from([event]);

        while let Some(event) = events.pop_front() {
            for effect in self.slice.on_event(event) {
                match effect {
                    Effect::StartHandshake => self.start_handshake(),
                    Effect::AbortHandshake => {
                        if let Some(handshake) = &self.handshake {
                            handshake.abort();
                        }
                    }
                    Effect::Send(frame) => {
                        send_frame(&self.name, self.transport.as_ref(), frame).await
                    }
                    Effect::DispatchLocal(action) => {
                        tracing::debug!(
                            store = %self.name,
                            action = %action.name,
                            from = action.from_store.as_deref().unwrap_or_default(),
                            "Dispatching remote action"
                        );
                        (self.reducer)(&mut self.state, &action);
                        events.push_back(Event::Dispatched(action));
                    }
                    Effect::Dropped { name, reason } => self.log_dropped(&name, &reason),
                }
            }
        }
    }

    fn start_handshake(&mut self) {
        let Some(transport) = &self.transport else {
            return;
        };
        tracing::debug!(store = %self.name, "Starting handshake");
        self.handshake = Some(Handshake::spawn(
            self.name.clone(),
            Arc::clone(transport),
            self.policy,
            Arc::clone(&self.on_error),
        ));
    }

    fn log_dropped(&self, name: &str, reason: &DropReason) {
        match reason {
            DropReason::MissingCodec => tracing::warn!(
                store = %self.name,
                action = %name,
                "No codec registered, action not sent"
            ),
            DropReason::Unencodable(e) => tracing::warn!(
                store = %self.name,
                action = %name,
                "Failed to encode action: {}",
                e
            ),
            DropReason::UnknownIncoming => tracing::warn!(
                store = %self.name,
                action = %name,
                "No codec registered, received action skipped"
            ),
            DropReason::Undecodable(e) => tracing::warn!(
                store = %self.name,
                action = %name,
                "Failed to decode received action: {}",
                e
            ),
            DropReason::Filtered => tracing::debug!(
                store = %self.name,
                action = %name,
                "Receive filter rejected action"
            ),
        }
    }

    /// Abort the handshake and the pump, then close the transport once.
    async fn teardown(&mut self) {
        if let Some(handshake) = self.handshake.take() {
            handshake.cancel();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                tracing::error!(store = %self.name, "Failed to close transport: {}", e);
            }
        }
        tracing::debug!(store = %self.name, "Store destroyed");
    }
}
