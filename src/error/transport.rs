use thiserror::Error;

/// Failures of a single poll round trip.
///
/// All of these are recoverable from the poller's point of view: the
/// registry is left untouched and one retry is scheduled.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Poll request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("Poll request timed out: {source}")]
    Timeout {
        #[source]
        source: reqwest::Error,
    },
    #[error("Poll endpoint returned status {status}.")]
    Status { status: u16 },
    #[error("Failed to decode poll response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
    #[error("Poll transport closed.")]
    Closed,
}

impl TransportError {
    pub(crate) fn from_reqwest(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { source }
        } else {
            Self::Request { source }
        }
    }
}
