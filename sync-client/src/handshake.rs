//! Handshake driver.
//!
//! Pings the other side on a backoff schedule until the store's sync slice
//! sees a pong and aborts the driver, or until the attempt budget runs out.
//! Exhaustion is reported once through the host's error handler; the driver
//! never restarts itself.

use std::sync::Arc;

use storesync_core::HandshakePolicy;
use storesync_types::Frame;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ErrorHandler;
use crate::error::ClientError;
use crate::transport::Transport;

/// A running handshake.
#[derive(Debug)]
pub struct Handshake {
    abort: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Handshake {
    /// Start pinging over `transport`.
    pub fn spawn(
        store_name: String,
        transport: Arc<dyn Transport>,
        policy: HandshakePolicy,
        on_error: ErrorHandler,
    ) -> Self {
        let (abort, aborted) = watch::channel(false);
        let task = tokio::spawn(run(store_name, transport, policy, aborted, on_error));
        Self { abort, task }
    }

    /// Stop pinging. Idempotent.
    pub fn abort(&self) {
        self.abort.send_replace(true);
    }

    /// Check whether the driver has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop pinging and cancel the task outright.
    pub fn cancel(self) {
        self.abort();
        self.task.abort();
    }
}

async fn run(
    store: String,
    transport: Arc<dyn Transport>,
    policy: HandshakePolicy,
    mut aborted: watch::Receiver<bool>,
    on_error: ErrorHandler,
) {
    for attempt in 1..=policy.max_attempts {
        if *aborted.borrow() {
            return;
        }

        match transport.send(Frame::ping()).await {
            Ok(()) => tracing::debug!(store = %store, attempt, "Sent ping"),
            // A ping that never left counts as unanswered.
            Err(e) => tracing::warn!(store = %store, attempt, "Failed to send ping: {}", e),
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.delay_for(attempt)) => {}
            _ = aborted.wait_for(|aborted| *aborted) => {
                tracing::debug!(store = %store, attempt, "Handshake complete");
                return;
            }
        }
    }

    tracing::debug!(store = %store, attempts = policy.max_attempts, "Handshake gave up");
    on_error(ClientError::HandshakeExhausted {
        attempts: policy.max_attempts,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use std::time::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storesync_core::CodecRegistry;
    use storesync_types::MessageType;
    use tokio::sync::mpsc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    use crate::config::SyncConfig;

    /// Counts ERROR events.
    struct ErrorEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn capture() -> (ErrorHandler, mpsc::UnboundedReceiver<ClientError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: ErrorHandler = Arc::new(move |e: ClientError| {
            let _ = tx.send(e);
        });
        (handler, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let (port, _peer) = LoopbackTransport::pair();
        let spy = port.clone();
        let (on_error, mut errors) = capture();

        let handshake = Handshake::spawn(
            "store1".into(),
            Arc::new(port),
            HandshakePolicy::default(),
            on_error,
        );

        let err = errors.recv().await.unwrap();
        assert!(matches!(err, ClientError::HandshakeExhausted { attempts: 15 }));
        assert_eq!(spy.sent_count(MessageType::Ping), 15);

        tokio::task::yield_now().await;
        assert!(handshake.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_logged_once_by_default_handler() {
        let errors = Arc::new(AtomicUsize::new(0));
        let _guard = tracing_subscriber::registry()
            .with(ErrorEvents(Arc::clone(&errors)))
            .set_default();

        let (port, _peer) = LoopbackTransport::pair();
        let port: Arc<dyn Transport> = Arc::new(port);
        let config = SyncConfig::new(Arc::clone(&port), Arc::new(CodecRegistry::new()));
        let policy = HandshakePolicy {
            max_attempts: 3,
            ..HandshakePolicy::default()
        };

        let handshake = Handshake::spawn("store1".into(), port, policy, config.error_handler());
        tokio::time::sleep(policy.total_budget() + Duration::from_millis(1)).await;

        assert!(handshake.is_finished());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_takes_the_full_schedule() {
        let (port, _peer) = LoopbackTransport::pair();
        let (on_error, mut errors) = capture();
        let policy = HandshakePolicy::default();
        let started = tokio::time::Instant::now();

        let _handshake = Handshake::spawn("store1".into(), Arc::new(port), policy, on_error);
        errors.recv().await.unwrap();

        assert_eq!(started.elapsed(), policy.total_budget());
    }

    #[tokio::test(start_paused = true)]
    async fn abort_stops_pinging() {
        let (port, _peer) = LoopbackTransport::pair();
        let spy = port.clone();
        let (on_error, mut errors) = capture();

        let handshake = Handshake::spawn(
            "store1".into(),
            Arc::new(port),
            HandshakePolicy::default(),
            on_error,
        );

        // Pings go out at 0ms and 10ms; the third is due at 30ms.
        tokio::time::sleep(Duration::from_millis(25)).await;
        handshake.abort();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(spy.sent_count(MessageType::Ping), 2);
        assert!(handshake.is_finished());
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ping_counts_as_attempt() {
        let (port, _peer) = LoopbackTransport::pair();
        port.close().await.unwrap();
        let (on_error, mut errors) = capture();
        let policy = HandshakePolicy {
            max_attempts: 3,
            ..HandshakePolicy::default()
        };

        let _handshake = Handshake::spawn("store1".into(), Arc::new(port), policy, on_error);

        let err = errors.recv().await.unwrap();
        assert!(matches!(err, ClientError::HandshakeExhausted { attempts: 3 }));
    }
}
