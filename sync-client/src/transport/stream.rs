//! Newline-delimited JSON transport over byte streams.
//!
//! Each frame is one [`WireMessage`] serialized as a single JSON line. Byte
//! streams cannot move handles, so frames with a transfer list are
//! rejected. Received frames get a fresh local [`FrameId`](storesync_types::FrameId).

use super::{Transport, TransportError};
use async_trait::async_trait;
use storesync_types::{Frame, WireMessage};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{watch, Mutex};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// JSON-lines transport over an `AsyncRead`/`AsyncWrite` pair.
pub struct StreamTransport {
    reader: Mutex<BufReader<BoxedReader>>,
    writer: Mutex<Option<BoxedWriter>>,
    closed: watch::Sender<bool>,
}

impl StreamTransport {
    /// Wrap a reader and a writer.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (closed, _) = watch::channel(false);
        Self {
            reader: Mutex::new(BufReader::new(Box::new(reader))),
            writer: Mutex::new(Some(Box::new(writer))),
            closed,
        }
    }

    /// Create two connected endpoints over an in-memory duplex pipe.
    pub fn duplex_pair(max_buf_size: usize) -> (Self, Self) {
        let (left, right) = tokio::io::duplex(max_buf_size);
        let (left_read, left_write) = tokio::io::split(left);
        let (right_read, right_write) = tokio::io::split(right);
        (
            Self::new(left_read, left_write),
            Self::new(right_read, right_write),
        )
    }
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("closed", &*self.closed.borrow())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if frame.has_transfer() {
            return Err(TransportError::NotTransferable);
        }

        let mut line = frame.message.to_json()?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut closed = self.closed.subscribe();
        let mut reader = self.reader.lock().await;
        let mut line = String::new();

        tokio::select! {
            read = reader.read_line(&mut line) => {
                if read? == 0 {
                    return Err(TransportError::Closed);
                }
                let message = WireMessage::from_json(line.trim_end().as_bytes())?;
                Ok(Frame::new(message))
            }
            _ = closed.wait_for(|closed| *closed) => Err(TransportError::Closed),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            writer.shutdown().await?;
        }
        Ok(())
    }
}
