//! Multiplexed long-poll client.
//!
//! A single owning task keeps the `{key: token}` registry and at most one
//! outstanding poll request covering every live key. Updates are fanned out
//! to the listeners registered for each key, in registration order, before
//! the key's token advances.
mod client;
mod http;
mod listener;
mod registry;
mod scope;
mod transport;
mod watch;

#[cfg(test)]
mod test_support;

pub use client::{PollerConfig, PollerHandle, PollerStats, Subscription, spawn_poller};
pub use http::{HttpTransport, HttpTransportConfig, POLL_PATH};
pub use listener::{Listener, ListenerId};
pub use scope::Scope;
pub use transport::{CURRENT_VALUE_TOKEN, PollRequest, PollTransport, PollUpdate};
pub use watch::LiveValue;
