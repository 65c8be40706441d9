//! Runtime sync configuration supplied by the host.

use std::fmt;
use std::sync::Arc;

use storesync_core::{ActionFilters, CodecRegistry, HandshakePolicy};
use storesync_types::Action;

use crate::error::ClientError;
use crate::transport::Transport;

/// Host callback for errors raised outside a call (e.g. handshake exhaustion).
pub type ErrorHandler = Arc<dyn Fn(ClientError) + Send + Sync>;

/// Configuration for one store's sync slice.
///
/// Immutable for the lifetime of the transport generation it wraps.
#[derive(Clone)]
pub struct SyncConfig {
    transport: Arc<dyn Transport>,
    codecs: Arc<CodecRegistry>,
    filters: ActionFilters,
    policy: HandshakePolicy,
    on_error: ErrorHandler,
}

impl SyncConfig {
    /// Create a configuration with accept-all filters and the default policy.
    pub fn new(transport: Arc<dyn Transport>, codecs: Arc<CodecRegistry>) -> Self {
        Self {
            transport,
            codecs,
            filters: ActionFilters::accept_all(),
            policy: HandshakePolicy::default(),
            on_error: default_error_handler(),
        }
    }

    /// Set both filters.
    pub fn with_filters(mut self, filters: ActionFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the filter for actions leaving this store.
    pub fn with_send_filter(
        mut self,
        filter: impl Fn(&Action) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filters = self.filters.with_send(filter);
        self
    }

    /// Set the filter for actions arriving at this store.
    pub fn with_receive_filter(
        mut self,
        filter: impl Fn(&Action) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filters = self.filters.with_receive(filter);
        self
    }

    /// Set the handshake retry policy.
    pub fn with_policy(mut self, policy: HandshakePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the error handler.
    pub fn on_error(mut self, handler: impl Fn(ClientError) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(handler);
        self
    }

    /// The transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The codec registry.
    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    /// The filters.
    pub fn filters(&self) -> &ActionFilters {
        &self.filters
    }

    /// The handshake policy.
    pub fn policy(&self) -> HandshakePolicy {
        self.policy
    }

    pub(crate) fn error_handler(&self) -> ErrorHandler {
        Arc::clone(&self.on_error)
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("codecs", &self.codecs)
            .field("filters", &self.filters)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn default_error_handler() -> ErrorHandler {
    Arc::new(|err: ClientError| tracing::error!("Sync error: {}", err))
}
