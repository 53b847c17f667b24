use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Poller task has stopped.")]
    ActorClosed,
    #[error("Poller dropped the stats request.")]
    StatsUnavailable {
        #[source]
        source: tokio::sync::oneshot::error::RecvError,
    },
    #[error("Live value for '{key}' closed: {source}")]
    WatchClosed {
        key: String,
        #[source]
        source: tokio::sync::watch::error::RecvError,
    },
}
