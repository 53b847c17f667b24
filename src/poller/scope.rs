use tracing::debug;

use crate::error::AppResult;

use super::client::{PollerHandle, Subscription};
use super::listener::{Listener, ListenerId};

/// Owner context for a group of subscriptions.
///
/// Closing or dropping the scope is the teardown signal: every listener
/// registered through it is unsubscribed, and keys left without listeners
/// are removed from the next poll.
#[derive(Debug)]
pub struct Scope {
    handle: PollerHandle,
    subscriptions: Vec<Subscription>,
}

impl Scope {
    pub(crate) const fn new(handle: PollerHandle) -> Self {
        Self {
            handle,
            subscriptions: Vec::new(),
        }
    }

    /// Subscribes `listener` to `key` for the lifetime of this scope.
    ///
    /// # Errors
    ///
    /// Returns an error when `key` is empty or the poller has stopped.
    pub fn subscribe(
        &mut self,
        key: &str,
        token_hint: Option<&str>,
        listener: Listener,
    ) -> AppResult<ListenerId> {
        let subscription = self.handle.subscribe(key, token_hint, listener)?;
        let id = subscription.listener_id();
        self.subscriptions.push(subscription);
        Ok(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn close(mut self) {
        debug!(subscriptions = self.subscriptions.len(), "Closing scope");
        self.subscriptions.clear();
    }
}
