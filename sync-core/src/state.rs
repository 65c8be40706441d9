//! Sync state machine for storesync.
//!
//! This module provides a pure, side-effect-free state machine for one
//! store's sync slice. The slice takes events as input and returns the
//! effects to execute: start or abort the handshake, send frames, dispatch
//! remote actions locally, or log a dropped action.
//!
//! The actual I/O (transport sends, timers) is performed by sync-client,
//! not by this module. This enables instant unit testing without transports.
//!
//! Phases: `Init → (start-sync) → Syncing → (pong) → Ready`. `Ready` is
//! terminal; a new transport generation needs a new slice.

use std::sync::Arc;

use storesync_types::{Action, Frame};

use crate::buffer::PendingActions;
use crate::codec::{CodecError, CodecRegistry};
use crate::filter::ActionFilters;
use crate::router::{self, Route, SkipReason};

/// Coarse phase of a sync slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// `start-sync` has not fired yet.
    Init,
    /// Pinging, waiting for a pong.
    Syncing,
    /// Both sides live; the queue drains immediately.
    Ready,
}

/// Per-store sync state.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pending_actions: PendingActions,
    start_sync: bool,
    port_ready: bool,
}

impl SyncState {
    /// Create the initial state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `start-sync` has fired.
    pub fn start_sync(&self) -> bool {
        self.start_sync
    }

    /// Whether the other side has answered a ping.
    pub fn port_ready(&self) -> bool {
        self.port_ready
    }

    /// `start_sync && port_ready`.
    pub fn is_ready(&self) -> bool {
        self.start_sync && self.port_ready
    }

    /// Actions waiting to be sent.
    pub fn pending_actions(&self) -> &PendingActions {
        &self.pending_actions
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        match (self.start_sync, self.port_ready) {
            (true, true) => SyncPhase::Ready,
            (true, false) => SyncPhase::Syncing,
            (false, _) => SyncPhase::Init,
        }
    }

    /// Copy of the state for diagnostics.
    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            port_ready: self.port_ready,
            start_sync: self.start_sync,
            pending_actions: self.pending_actions.iter().cloned().collect(),
            high_water_mark: self.pending_actions.high_water_mark(),
        }
    }
}

/// Point-in-time copy of a [`SyncState`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    /// Whether the other side has answered a ping.
    pub port_ready: bool,
    /// Whether `start-sync` has fired.
    pub start_sync: bool,
    /// Actions waiting to be sent, in dispatch order.
    pub pending_actions: Vec<Action>,
    /// Largest length the queue has reached.
    pub high_water_mark: usize,
}

impl SyncSnapshot {
    /// `start_sync && port_ready`.
    pub fn is_ready(&self) -> bool {
        self.start_sync && self.port_ready
    }
}

/// Inputs to the sync slice.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The host asked to start syncing.
    StartSync,
    /// The other side is live.
    PortReady,
    /// An action went through the local store.
    Dispatched(Action),
    /// A frame arrived from the transport.
    FrameReceived(Frame),
}

/// Instructions for sync-client.
///
/// These are instructions, not side effects. The client interprets them and
/// performs the actual I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start pinging the other side.
    StartHandshake,
    /// Stop pinging.
    AbortHandshake,
    /// Send a frame over the transport.
    Send(Frame),
    /// Dispatch a remote action into the local store.
    DispatchLocal(Action),
    /// An action was dropped; log it.
    Dropped {
        /// Action name.
        name: String,
        /// Why it was dropped.
        reason: DropReason,
    },
}

/// Why an action did not cross the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Outgoing action with no registered codec.
    MissingCodec,
    /// Outgoing action the codec failed to encode.
    Unencodable(String),
    /// Incoming action with no registered codec.
    UnknownIncoming,
    /// Incoming action the codec failed to decode.
    Undecodable(String),
    /// Incoming action rejected by the receive filter.
    Filtered,
}

/// The sync slice: state, reducer, router and flush for one store.
#[derive(Debug)]
pub struct SyncSlice {
    store_name: String,
    state: SyncState,
    filters: ActionFilters,
    codecs: Arc<CodecRegistry>,
}

impl SyncSlice {
    /// Create a slice in the `Init` phase.
    pub fn new(
        store_name: impl Into<String>,
        filters: ActionFilters,
        codecs: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            state: SyncState::new(),
            filters,
            codecs,
        }
    }

    /// Name of the owning store.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Current state.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Process an event and return the effects to execute.
    ///
    /// The flush runs at the end of every event, so the queue is drained in
    /// the same step that makes the slice ready.
    pub fn on_event(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = match event {
            Event::StartSync => self.start(),
            Event::PortReady => self.mark_port_ready(),
            Event::Dispatched(action) => {
                if self.filters.allows_send(&action) {
                    self.state.pending_actions.push(action);
                }
                Vec::new()
            }
            Event::FrameReceived(frame) => self.receive(frame),
        };

        effects.extend(self.flush());
        effects
    }

    fn start(&mut self) -> Vec<Effect> {
        if self.state.start_sync {
            return Vec::new();
        }
        self.state.start_sync = true;
        if self.state.port_ready {
            Vec::new()
        } else {
            vec![Effect::StartHandshake]
        }
    }

    fn mark_port_ready(&mut self) -> Vec<Effect> {
        if self.state.port_ready {
            return Vec::new();
        }
        self.state.port_ready = true;
        vec![Effect::AbortHandshake]
    }

    fn receive(&mut self, frame: Frame) -> Vec<Effect> {
        match router::route(frame, &self.codecs, &self.filters) {
            Route::ReplyPong => vec![Effect::Send(Frame::pong())],
            Route::PortReady => self.mark_port_ready(),
            Route::Dispatch(action) => vec![Effect::DispatchLocal(action)],
            Route::Skip { name, reason } => {
                let reason = match reason {
                    SkipReason::MissingCodec => DropReason::UnknownIncoming,
                    SkipReason::Undecodable(e) => DropReason::Undecodable(e),
                    SkipReason::Filtered => DropReason::Filtered,
                };
                vec![Effect::Dropped { name, reason }]
            }
        }
    }

    fn flush(&mut self) -> Vec<Effect> {
        if !self.state.is_ready() || self.state.pending_actions.is_empty() {
            return Vec::new();
        }

        self.state
            .pending_actions
            .drain_all()
            .into_iter()
            .filter(|action| !action.is_remote())
            .map(|action| match self.codecs.encode(&action, &self.store_name) {
                Ok(frame) => Effect::Send(frame),
                Err(CodecError::MissingCodec(name)) => Effect::Dropped {
                    name,
                    reason: DropReason::MissingCodec,
                },
                Err(e) => Effect::Dropped {
                    name: action.name.clone(),
                    reason: DropReason::Unencodable(e.to_string()),
                },
            })
            .collect()
    }
}
