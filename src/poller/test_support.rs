use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;

use super::listener::Listener;
use super::transport::{PollRequest, PollTransport, PollUpdate};

/// How long a test waits for the poller before giving up.
const WAIT: Duration = Duration::from_secs(2);
/// Window in which no further request is expected.
pub(super) const QUIET: Duration = Duration::from_millis(100);

type Reply = Result<Vec<PollUpdate>, TransportError>;

/// A poll captured by [`ScriptedTransport`], answered by the test.
pub(super) struct PendingPoll {
    pub(super) request: PollRequest,
    respond_to: oneshot::Sender<Reply>,
}

impl PendingPoll {
    /// Answers the poll. Returns `false` if the poller had already cancelled it.
    pub(super) fn respond(self, updates: Vec<PollUpdate>) -> bool {
        self.respond_to.send(Ok(updates)).is_ok()
    }

    pub(super) fn fail(self) -> bool {
        self.respond_to
            .send(Err(TransportError::Status { status: 503 }))
            .is_ok()
    }

    pub(super) fn token(&self, key: &str) -> Option<&str> {
        self.request.token(key)
    }

    pub(super) fn keys(&self) -> Vec<String> {
        self.request.keys().map(str::to_owned).collect()
    }
}

/// In-memory transport handing every request to the test.
pub(super) struct ScriptedTransport {
    requests: mpsc::UnboundedSender<PendingPoll>,
}

impl ScriptedTransport {
    pub(super) fn new() -> (Self, mpsc::UnboundedReceiver<PendingPoll>) {
        let (requests, receiver) = mpsc::unbounded_channel();
        (Self { requests }, receiver)
    }
}

#[async_trait]
impl PollTransport for ScriptedTransport {
    async fn poll(&self, request: PollRequest) -> Result<Vec<PollUpdate>, TransportError> {
        let (respond_to, reply) = oneshot::channel();
        self.requests
            .send(PendingPoll {
                request,
                respond_to,
            })
            .map_err(|_closed| TransportError::Closed)?;
        reply.await.map_err(|_dropped| TransportError::Closed)?
    }
}

pub(super) async fn next_poll(
    requests: &mut mpsc::UnboundedReceiver<PendingPoll>,
) -> Result<PendingPoll, String> {
    match tokio::time::timeout(WAIT, requests.recv()).await {
        Ok(Some(poll)) => Ok(poll),
        Ok(None) => Err("Transport channel closed".to_owned()),
        Err(_elapsed) => Err("Timed out waiting for a poll request".to_owned()),
    }
}

pub(super) async fn expect_no_poll(
    requests: &mut mpsc::UnboundedReceiver<PendingPoll>,
) -> Result<(), String> {
    match tokio::time::timeout(QUIET, requests.recv()).await {
        Ok(Some(poll)) => Err(format!("Unexpected poll for {:?}", poll.keys())),
        Ok(None) | Err(_) => Ok(()),
    }
}

pub(super) type Call = (&'static str, String, Value);

/// Listener forwarding every invocation, tagged with `label`.
pub(super) fn recording(label: &'static str, calls: &mpsc::UnboundedSender<Call>) -> Listener {
    let calls = calls.clone();
    Listener::new(move |key, value| {
        drop(calls.send((label, key.to_owned(), value.clone())));
    })
}

pub(super) fn drain(calls: &mut mpsc::UnboundedReceiver<Call>) -> Vec<Call> {
    let mut drained = Vec::new();
    while let Ok(call) = calls.try_recv() {
        drained.push(call);
    }
    drained
}

pub(super) fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}
