use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

/// Token asking the server for the current value regardless of position.
pub const CURRENT_VALUE_TOKEN: &str = "-1";

/// The `{key: token}` mapping sent with one poll request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollRequest {
    tokens: BTreeMap<String, String>,
}

impl PollRequest {
    #[must_use]
    pub const fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }

    #[must_use]
    pub const fn tokens(&self) -> &BTreeMap<String, String> {
        &self.tokens
    }

    #[must_use]
    pub fn token(&self, key: &str) -> Option<&str> {
        self.tokens.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// One record of a poll response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollUpdate {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(alias = "next_token")]
    pub next: String,
}

impl PollUpdate {
    pub fn new(key: impl Into<String>, value: Value, next: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value,
            next: next.into(),
        }
    }
}

/// Long-poll endpoint.
///
/// Implementations hold the call open until at least one requested key has
/// moved past its token or a server-side timeout elapses, and return the
/// stale keys' updates. Keys with nothing new yield no record.
#[async_trait]
pub trait PollTransport: Send + Sync + 'static {
    /// Issues one poll round trip.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be sent, the endpoint answers
    /// with a failure status, or the payload cannot be decoded.
    async fn poll(&self, request: PollRequest) -> Result<Vec<PollUpdate>, TransportError>;
}
