use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, trace, warn};

use crate::error::{AppError, AppResult, PollError, TransportError, ValidationError};

use super::listener::{Listener, ListenerId, RegistrationId};
use super::registry::{Delivery, Registry};
use super::scope::Scope;
use super::transport::{PollTransport, PollUpdate};
use super::watch::LiveValue;

/// Delay before re-polling after a failed request.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub retry_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Counters reported by [`PollerHandle::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub requests_issued: u64,
    pub requests_cancelled: u64,
    pub requests_failed: u64,
    pub updates_delivered: u64,
    pub updates_ignored: u64,
    pub active_keys: usize,
    pub in_flight: bool,
}

#[derive(Debug)]
pub(crate) enum Command {
    Subscribe {
        key: String,
        token_hint: Option<String>,
        listener: Listener,
        registration: RegistrationId,
    },
    Unsubscribe {
        key: String,
        listener: ListenerId,
    },
    /// Sent by a dropped [`Subscription`]; a no-op once superseded.
    Release {
        key: String,
        registration: RegistrationId,
    },
    Stats {
        respond_to: oneshot::Sender<PollerStats>,
    },
    Shutdown,
}

enum Step {
    Idle,
    Repoll,
    Stop,
}

type PollOutcome = (u64, Result<Vec<PollUpdate>, TransportError>);

struct InFlight {
    generation: u64,
    task: JoinHandle<()>,
}

/// Spawns the poller task on the current tokio runtime.
///
/// The task runs until [`PollerHandle::shutdown`] is called or every handle
/// and subscription has been dropped.
pub fn spawn_poller<T>(transport: T, config: PollerConfig) -> (PollerHandle, JoinHandle<()>)
where
    T: PollTransport,
{
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let actor = PollerActor::new(transport, config, commands_rx);
    let task = tokio::spawn(actor.run());
    (
        PollerHandle {
            commands: commands_tx,
        },
        task,
    )
}

struct PollerActor<T> {
    transport: Arc<T>,
    config: PollerConfig,
    registry: Registry,
    commands: mpsc::UnboundedReceiver<Command>,
    results_tx: mpsc::UnboundedSender<PollOutcome>,
    results_rx: mpsc::UnboundedReceiver<PollOutcome>,
    in_flight: Option<InFlight>,
    generation: u64,
    retry: Option<Pin<Box<Sleep>>>,
    stats: PollerStats,
}

impl<T> PollerActor<T>
where
    T: PollTransport,
{
    fn new(
        transport: T,
        config: PollerConfig,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            config,
            registry: Registry::default(),
            commands,
            results_tx,
            results_rx,
            in_flight: None,
            generation: 0,
            retry: None,
            stats: PollerStats::default(),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All poller handles dropped");
                        break;
                    };
                    if !self.on_commands(command) {
                        break;
                    }
                }
                Some((generation, outcome)) = self.results_rx.recv() => {
                    self.on_outcome(generation, outcome);
                }
                () = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    debug!("Retrying poll after failure");
                    self.poll();
                }
            }
        }
        self.cancel_in_flight();
        debug!("Poller stopped");
    }

    /// Handles `first` plus everything already queued, then polls once.
    /// Returns `false` on shutdown.
    fn on_commands(&mut self, first: Command) -> bool {
        let mut repoll = false;
        let mut next = Some(first);
        while let Some(command) = next {
            match self.on_command(command) {
                Step::Idle => {}
                Step::Repoll => repoll = true,
                Step::Stop => return false,
            }
            next = self.commands.try_recv().ok();
        }
        if repoll {
            self.poll();
        }
        true
    }

    fn on_command(&mut self, command: Command) -> Step {
        match command {
            Command::Subscribe {
                key,
                token_hint,
                listener,
                registration,
            } => {
                debug!(key = %key, listener = %listener.id(), "Subscribing");
                self.registry
                    .subscribe(&key, token_hint.as_deref(), listener, registration);
                Step::Repoll
            }
            Command::Unsubscribe { key, listener } => {
                let dropped = self.registry.unsubscribe(&key, listener);
                key_dropped(&key, dropped)
            }
            Command::Release { key, registration } => {
                let dropped = self.registry.release(&key, registration);
                key_dropped(&key, dropped)
            }
            Command::Stats { respond_to } => {
                let mut stats = self.stats;
                stats.active_keys = self.registry.key_count();
                stats.in_flight = self.in_flight.is_some();
                if respond_to.send(stats).is_err() {
                    // Requester dropped the response channel.
                }
                Step::Idle
            }
            Command::Shutdown => Step::Stop,
        }
    }

    fn poll(&mut self) {
        self.retry = None;
        self.cancel_in_flight();

        let request = self.registry.snapshot();
        if request.is_empty() {
            trace!("No live keys; not polling");
            return;
        }

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let transport = Arc::clone(&self.transport);
        let results = self.results_tx.clone();
        trace!(generation, keys = request.len(), "Issuing poll");
        let task = tokio::spawn(async move {
            let outcome = transport.poll(request).await;
            if results.send((generation, outcome)).is_err() {
                // Poller already stopped.
            }
        });
        self.stats.requests_issued = self.stats.requests_issued.saturating_add(1);
        self.in_flight = Some(InFlight { generation, task });
    }

    fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            self.stats.requests_cancelled = self.stats.requests_cancelled.saturating_add(1);
            trace!(generation = in_flight.generation, "Cancelled in-flight poll");
        }
    }

    fn on_outcome(&mut self, generation: u64, outcome: Result<Vec<PollUpdate>, TransportError>) {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation);
        if !current {
            trace!(generation, "Discarding superseded poll response");
            return;
        }
        self.in_flight = None;

        match outcome {
            Ok(updates) => {
                for update in updates {
                    self.deliver(update);
                }
                self.poll();
            }
            Err(err) => {
                self.stats.requests_failed = self.stats.requests_failed.saturating_add(1);
                warn!(
                    "Poll failed: {}; retrying in {}ms",
                    err,
                    self.config.retry_delay.as_millis()
                );
                self.retry = Some(Box::pin(tokio::time::sleep(self.config.retry_delay)));
            }
        }
    }

    fn deliver(&mut self, update: PollUpdate) {
        match self.registry.deliver(update) {
            Delivery::Delivered { listeners } => {
                self.stats.updates_delivered = self.stats.updates_delivered.saturating_add(1);
                trace!(listeners, "Delivered update");
            }
            Delivery::UnknownKey { key } => {
                self.stats.updates_ignored = self.stats.updates_ignored.saturating_add(1);
                warn!(key = %key, "Ignoring value with unknown key");
            }
        }
    }
}

fn key_dropped(key: &str, dropped: bool) -> Step {
    if dropped {
        debug!(key = %key, "Last listener removed; dropping key");
        Step::Repoll
    } else {
        Step::Idle
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending::<()>().await,
    }
}

/// Cheap, cloneable front end of a running poller.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl PollerHandle {
    /// Registers `listener` for `key` and re-polls.
    ///
    /// Without a `token_hint` the current value is requested. The listener is
    /// removed again when the returned [`Subscription`] is cancelled or dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when `key` is empty or the poller has stopped.
    pub fn subscribe(
        &self,
        key: &str,
        token_hint: Option<&str>,
        listener: Listener,
    ) -> AppResult<Subscription> {
        if key.is_empty() {
            return Err(AppError::validation(ValidationError::EmptyKey));
        }
        let listener_id = listener.id();
        let registration = RegistrationId::next();
        self.send(Command::Subscribe {
            key: key.to_owned(),
            token_hint: token_hint.map(str::to_owned),
            listener,
            registration,
        })?;
        Ok(Subscription {
            key: key.to_owned(),
            listener: listener_id,
            registration,
            commands: self.commands.clone(),
            active: true,
        })
    }

    /// Removes `listener` from `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the poller has stopped.
    pub fn unsubscribe(&self, key: &str, listener: &Listener) -> AppResult<()> {
        self.send(Command::Unsubscribe {
            key: key.to_owned(),
            listener: listener.id(),
        })
    }

    /// Snapshot of the poller counters.
    ///
    /// # Errors
    ///
    /// Returns an error when the poller has stopped.
    pub async fn stats(&self) -> AppResult<PollerStats> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::Stats { respond_to })?;
        response
            .await
            .map_err(|err| AppError::poll(PollError::StatsUnavailable { source: err }))
    }

    /// Creates an owner context whose subscriptions end together.
    #[must_use]
    pub fn scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Follows `key` through a watch channel instead of a callback.
    ///
    /// # Errors
    ///
    /// Returns an error when `key` is empty or the poller has stopped.
    pub fn watch(&self, key: &str, token_hint: Option<&str>) -> AppResult<LiveValue> {
        LiveValue::subscribe(self, key, token_hint)
    }

    /// Stops the poller and cancels any in-flight request.
    pub fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).is_err() {
            // Poller already stopped.
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> AppResult<()> {
        self.commands
            .send(command)
            .map_err(|_closed| AppError::poll(PollError::ActorClosed))
    }
}

/// A listener registered for one key.
///
/// Dropping or cancelling it unsubscribes the listener; [`Self::detach`]
/// keeps it registered for the lifetime of the poller. Once the same
/// listener is subscribed to the key again, this handle no longer owns the
/// registration and dropping it changes nothing.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    key: String,
    listener: ListenerId,
    registration: RegistrationId,
    commands: mpsc::UnboundedSender<Command>,
    active: bool,
}

impl Subscription {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn listener_id(&self) -> ListenerId {
        self.listener
    }

    pub fn cancel(mut self) {
        self.release();
    }

    pub fn detach(mut self) {
        self.active = false;
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let command = Command::Release {
            key: std::mem::take(&mut self.key),
            registration: self.registration,
        };
        if self.commands.send(command).is_err() {
            // Poller already stopped.
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
