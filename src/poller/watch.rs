use serde_json::Value;
use tokio::sync::watch;

use crate::error::{AppError, AppResult, PollError};

use super::client::{PollerHandle, Subscription};
use super::listener::Listener;

/// Latest value of one key, backed by a `tokio::sync::watch` channel.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct LiveValue {
    receiver: watch::Receiver<Option<Value>>,
    subscription: Subscription,
}

impl LiveValue {
    pub(crate) fn subscribe(
        handle: &PollerHandle,
        key: &str,
        token_hint: Option<&str>,
    ) -> AppResult<Self> {
        let (sender, receiver) = watch::channel(None);
        let listener = Listener::new(move |_key, value| {
            let _previous = sender.send_replace(Some(value.clone()));
        });
        let subscription = handle.subscribe(key, token_hint, listener)?;
        Ok(Self {
            receiver,
            subscription,
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.subscription.key()
    }

    /// Most recent value, or `None` before the first update.
    #[must_use]
    pub fn latest(&self) -> Option<Value> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next update and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error when the poller stopped and dropped the listener.
    pub async fn changed(&mut self) -> AppResult<Option<Value>> {
        self.receiver.changed().await.map_err(|err| {
            AppError::poll(PollError::WatchClosed {
                key: self.subscription.key().to_owned(),
                source: err,
            })
        })?;
        Ok(self.receiver.borrow_and_update().clone())
    }
}
