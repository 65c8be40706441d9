//! # sync-core
//!
//! Pure logic for storesync (no I/O, instant tests).
//!
//! This crate implements the sync slice state machine, the receive router,
//! the action codec registry and the handshake retry policy without any
//! transport or timer I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (transports, timers) is performed by `sync-client`, which
//! interprets the effects produced by the sync slice.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod buffer;
pub mod codec;
pub mod filter;
pub mod router;
pub mod state;

pub use backoff::{HandshakePolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY};
pub use buffer::PendingActions;
pub use codec::{
    ActionCodec, CodecError, CodecRegistry, Decoded, JsonCodec, NoValueCodec, Payload,
    PayloadError, TransferCodec, TypedCodec,
};
pub use filter::{name_prefix, ActionFilter, ActionFilters};
pub use router::{route, Route, SkipReason};
pub use state::{DropReason, Effect, Event, SyncPhase, SyncSlice, SyncSnapshot, SyncState};
