//! Send and receive filters.
//!
//! The send filter decides which locally dispatched actions are queued for
//! the remote store; the receive filter decides which remote actions are
//! dispatched locally.

use std::fmt;
use std::sync::Arc;

use storesync_types::Action;

/// Predicate over actions.
pub type ActionFilter = Arc<dyn Fn(&Action) -> bool + Send + Sync>;

/// The pair of filters a sync slice applies.
#[derive(Clone)]
pub struct ActionFilters {
    send: ActionFilter,
    receive: ActionFilter,
}

impl ActionFilters {
    /// Create filters from two predicates.
    pub fn new(
        send: impl Fn(&Action) -> bool + Send + Sync + 'static,
        receive: impl Fn(&Action) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            send: Arc::new(send),
            receive: Arc::new(receive),
        }
    }

    /// Filters that let everything through.
    pub fn accept_all() -> Self {
        Self::new(|_| true, |_| true)
    }

    /// Replace the send filter.
    pub fn with_send(mut self, send: impl Fn(&Action) -> bool + Send + Sync + 'static) -> Self {
        self.send = Arc::new(send);
        self
    }

    /// Replace the receive filter.
    pub fn with_receive(
        mut self,
        receive: impl Fn(&Action) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.receive = Arc::new(receive);
        self
    }

    /// Check if a local action should be forwarded.
    pub fn allows_send(&self, action: &Action) -> bool {
        (self.send)(action)
    }

    /// Check if a remote action should be dispatched locally.
    pub fn allows_receive(&self, action: &Action) -> bool {
        (self.receive)(action)
    }
}

impl Default for ActionFilters {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl fmt::Debug for ActionFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFilters").finish_non_exhaustive()
    }
}

/// Predicate matching actions whose name starts with one of `prefixes`.
///
/// Handy for allow-listing a namespace, e.g. `"action::editor:"`.
pub fn name_prefix<I, S>(prefixes: I) -> impl Fn(&Action) -> bool + Send + Sync + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
    move |action: &Action| prefixes.iter().any(|p| action.name.starts_with(p.as_str()))
}
