//! In-memory transport for two stores in one process.
//!
//! A [`LoopbackTransport::pair`] behaves like the two ends of a message
//! channel between a page and a worker: frames (transferables included) are
//! delivered in FIFO order, and posting to a peer that has gone away is
//! silently dropped. Every endpoint also records what it sent and how often
//! it was closed, which tests use for verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use storesync_types::{Frame, MessageType};
use tokio::sync::{mpsc, watch};

/// One end of an in-memory channel.
///
/// Clones share the same endpoint.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    inner: Arc<LoopbackInner>,
}

#[derive(Debug)]
struct LoopbackInner {
    outgoing: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    closed: watch::Sender<bool>,
    sent_frames: Mutex<Vec<Frame>>,
    fail_next_send: Mutex<Option<String>>,
    close_count: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LoopbackTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let (to_left, left_rx) = mpsc::unbounded_channel();
        let (to_right, right_rx) = mpsc::unbounded_channel();
        (Self::new(to_right, left_rx), Self::new(to_left, right_rx))
    }

    fn new(
        outgoing: mpsc::UnboundedSender<Frame>,
        incoming: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(LoopbackInner {
                outgoing: Mutex::new(Some(outgoing)),
                incoming: tokio::sync::Mutex::new(incoming),
                closed,
                sent_frames: Mutex::new(Vec::new()),
                fail_next_send: Mutex::new(None),
                close_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Frame> {
        lock(&self.inner.sent_frames).clone()
    }

    /// Count sent frames of one message type.
    pub fn sent_count(&self, message_type: MessageType) -> usize {
        lock(&self.inner.sent_frames)
            .iter()
            .filter(|f| f.message_type() == message_type)
            .count()
    }

    /// Number of times `close()` was called.
    pub fn close_count(&self) -> usize {
        self.inner.close_count.load(Ordering::SeqCst)
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        *lock(&self.inner.fail_next_send) = Some(error.to_string());
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        // Check for forced failure
        if let Some(error) = lock(&self.inner.fail_next_send).take() {
            return Err(TransportError::SendFailed(error));
        }

        let outgoing = lock(&self.inner.outgoing).clone();
        let Some(outgoing) = outgoing else {
            return Err(TransportError::Closed);
        };

        lock(&self.inner.sent_frames).push(frame.clone());
        if outgoing.send(frame).is_err() {
            tracing::debug!("Loopback peer is gone, frame dropped");
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut closed = self.inner.closed.subscribe();
        let mut incoming = self.inner.incoming.lock().await;

        tokio::select! {
            frame = incoming.recv() => frame.ok_or(TransportError::Closed),
            _ = closed.wait_for(|closed| *closed) => Err(TransportError::Closed),
        }
    }

    fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close_count.fetch_add(1, Ordering::SeqCst);
        // Dropping our sender ends the peer's receive side.
        lock(&self.inner.outgoing).take();
        self.inner.closed.send_replace(true);
        Ok(())
    }
}
