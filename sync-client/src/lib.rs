//! # sync-client
//!
//! Async runtime for the storesync cross-context action protocol.
//!
//! This is the library hosts use to keep two stores in step across a
//! message channel (e.g. an application and its background worker).
//!
//! ## Features
//!
//! - **Store Runtime**: one tokio task per store, driven by commands
//! - **Handshake**: ping/pong liveness with bounded exponential backoff
//! - **Transport Abstraction**: Pluggable transport layer (in-memory, JSON lines)
//! - **Port Lifecycle**: hand a fresh endpoint to a restarted counterpart
//! - **Pure State Machine**: Uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use storesync_client::{LoopbackTransport, StoreBuilder, SyncConfig};
//!
//! let (port1, port2) = LoopbackTransport::pair();
//! let store1 = StoreBuilder::new("store1", Counter::default())
//!     .reducer(counter_reducer)
//!     .spawn(SyncConfig::new(Arc::new(port1), codecs.clone()));
//!
//! store1.dispatch(increment())?;
//! store1.start_store_sync()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod handshake;
pub mod port;
pub mod settings;
pub mod store;
pub mod transport;

#[cfg(test)]
mod scenarios;

pub use config::{ErrorHandler, SyncConfig};
pub use error::ClientError;
pub use handshake::Handshake;
pub use port::{PortManager, DEFAULT_BUS_CAPACITY};
pub use settings::{ConfigError, HandshakeSettings, LogSettings, Settings, DEFAULT_SETTINGS_FILE};
pub use store::{Reducer, StoreBuilder, StoreHandle};
pub use transport::{LoopbackTransport, StreamTransport, Transport, TransportError};
