//! Transport abstraction for storesync.
//!
//! This module provides a pluggable transport layer that abstracts the
//! channel connecting two execution contexts (in-memory channels, byte
//! streams).
//!
//! # Design
//!
//! The transport trait is async and message-oriented:
//! - `send()` transmits one frame, transferables included
//! - `recv()` waits for the next frame
//! - `close()` terminates the endpoint; later sends fail
//!
//! # Example
//!
//! ```ignore
//! let (left, right) = LoopbackTransport::pair();
//! left.send(Frame::ping()).await?;
//! let frame = right.recv().await?;
//! ```

mod loopback;
mod stream;

pub use loopback::LoopbackTransport;
pub use stream::StreamTransport;

use async_trait::async_trait;
use storesync_types::{Frame, TypesError};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint is closed.
    #[error("transport closed")]
    Closed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The frame carries transferables this transport cannot move.
    #[error("transport cannot carry transferable handles")]
    NotTransferable,

    /// A message could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] TypesError),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Check whether the endpoint is unusable after this error.
    ///
    /// A malformed message is skipped; everything else ends the receive loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Encoding(_))
    }
}

/// Transport trait for sending and receiving sync protocol frames.
///
/// Implementations handle the underlying channel (in-memory, byte stream,
/// etc). Sending to a peer that has gone away is not an error; a sender
/// cannot tell a dead peer from a slow one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a frame.
    async fn send(&self, frame: Frame) -> Result<(), TransportError>;

    /// Receive the next frame.
    ///
    /// Blocks until a frame is available or the endpoint closes.
    async fn recv(&self) -> Result<Frame, TransportError>;

    /// Check if the endpoint has been closed locally.
    fn is_closed(&self) -> bool;

    /// Close the endpoint.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use storesync_types::WireMessage;

    #[test]
    fn malformed_message_is_not_fatal() {
        let err = match WireMessage::from_json(b"{\"type\":\"bogus\"}") {
            Err(e) => e,
            Ok(msg) => panic!("unexpectedly decoded {:?}", msg),
        };
        assert!(!TransportError::Encoding(err).is_fatal());
    }

    #[test]
    fn closed_is_fatal() {
        assert!(TransportError::Closed.is_fatal());
        assert!(TransportError::SendFailed("full".into()).is_fatal());
    }
}
