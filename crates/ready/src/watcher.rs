use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, histogram};
use rustc_hash::FxHashSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use vigil_core::{ChangeEvent, CoreError, KeyPath, Resource};
use vigil_watch::{Normalizer, SignalHub, Subscription, WatchConsumer};

use crate::{Readiness, ReadyError};

type Active = Arc<Mutex<FxHashSet<String>>>;

/// Issues one-shot waits against the signals of a single watch session.
///
/// At most one wait per key is pending at a time.
#[derive(Debug, Clone)]
pub struct ReadinessWatcher {
    hub: SignalHub,
    key_path: KeyPath,
    normalizer: Normalizer,
    active: Active,
}

impl ReadinessWatcher {
    pub fn new(hub: SignalHub, key_path: KeyPath, normalizer: Normalizer) -> Self {
        Self { hub, key_path, normalizer, active: Arc::default() }
    }

    pub fn is_waiting(&self, key: &str) -> bool {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).contains(key)
    }

    /// Register a wait. The subscription and the deadline start now, so no
    /// signal published after this call is missed.
    pub fn watch<P>(&self, key: impl Into<String>, predicate: P, timeout: Duration) -> Result<PendingWait<P>, ReadyError>
    where
        P: Fn(&Resource) -> Readiness,
    {
        let key = key.into();
        let guard = ActiveGuard::acquire(&self.active, &key)?;
        let started = Instant::now();
        debug!(key = %key, timeout_ms = timeout.as_millis() as u64, "readiness wait registered");
        Ok(PendingWait {
            key,
            predicate,
            key_path: self.key_path.clone(),
            normalizer: self.normalizer.clone(),
            subscription: self.hub.subscribe(),
            started,
            deadline: started + timeout,
            timeout,
            cancel: CancellationToken::new(),
            _guard: guard,
        })
    }

    /// Register and drive a wait to completion; resolves with the first
    /// version of the object that satisfies `predicate`.
    pub async fn await_condition<P>(&self, key: impl Into<String>, predicate: P, timeout: Duration) -> Result<Resource, ReadyError>
    where
        P: Fn(&Resource) -> Readiness,
    {
        self.watch(key, predicate, timeout)?.wait().await
    }
}

struct ActiveGuard {
    key: String,
    active: Active,
}

impl ActiveGuard {
    fn acquire(active: &Active, key: &str) -> Result<Self, ReadyError> {
        let mut set = active.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(key.to_string()) {
            return Err(ReadyError::AlreadyWaiting { key: key.to_string() });
        }
        Ok(Self { key: key.to_string(), active: active.clone() })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.key);
    }
}

/// A registered wait. Dropping it releases the subscription, the timer and
/// the per-key slot.
pub struct PendingWait<P> {
    key: String,
    predicate: P,
    key_path: KeyPath,
    normalizer: Normalizer,
    subscription: Subscription,
    started: Instant,
    deadline: Instant,
    timeout: Duration,
    cancel: CancellationToken,
    _guard: ActiveGuard,
}

enum WaitState {
    Waiting,
    Settled(Result<Resource, ReadyError>),
}

impl<P> PendingWait<P>
where
    P: Fn(&Resource) -> Readiness,
{
    pub fn key(&self) -> &str { &self.key }

    /// Cancelling this token rejects the wait with [`ReadyError::Cancelled`].
    pub fn cancel_token(&self) -> CancellationToken { self.cancel.clone() }

    pub async fn wait(self) -> Result<Resource, ReadyError> {
        let PendingWait { key, predicate, key_path, normalizer, mut subscription, started, deadline, timeout, cancel, _guard } = self;
        let mut eval = Evaluator { key: &key, key_path: &key_path, predicate: &predicate, outcome: None };
        let timer = tokio::time::sleep_until(deadline);
        tokio::pin!(timer);

        let mut state = WaitState::Waiting;
        let result = loop {
            if let WaitState::Settled(result) = state {
                break result;
            }
            state = tokio::select! {
                biased;
                _ = cancel.cancelled() => WaitState::Settled(Err(ReadyError::Cancelled { key: key.clone() })),
                signal = subscription.recv() => match signal {
                    None => WaitState::Settled(Err(ReadyError::StreamClosed { key: key.clone() })),
                    Some(signal) => match normalizer.dispatch(&signal, &mut eval) {
                        Err(e) => WaitState::Settled(Err(e.into())),
                        Ok(()) => eval.outcome.take().map(WaitState::Settled).unwrap_or(WaitState::Waiting),
                    },
                },
                _ = &mut timer => WaitState::Settled(Err(ReadyError::Timeout {
                    key: key.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })),
            };
        };
        cancel.cancel();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = match &result {
            Ok(_) => "ready",
            Err(e) => e.outcome(),
        };
        info!(key = %key, outcome, elapsed_ms, "readiness wait settled");
        histogram!("ready_wait_ms", elapsed_ms as f64);
        counter!("ready_outcome_total", 1u64, "outcome" => outcome);
        result
    }
}

struct Evaluator<'a, P> {
    key: &'a str,
    key_path: &'a KeyPath,
    predicate: &'a P,
    outcome: Option<Result<Resource, ReadyError>>,
}

impl<P> WatchConsumer for Evaluator<'_, P>
where
    P: Fn(&Resource) -> Readiness,
{
    fn handle(&mut self, event: &ChangeEvent) -> Result<(), CoreError> {
        let Some(obj) = event.object() else { return Ok(()) };
        if self.key_path.key_of(obj)? != self.key {
            return Ok(());
        }
        self.outcome = match event {
            ChangeEvent::Deleted(_) => Some(Err(ReadyError::Deleted { key: self.key.to_string() })),
            _ => match (self.predicate)(obj) {
                Readiness::Ready => Some(Ok(obj.clone())),
                Readiness::Failed(detail) => Some(Err(ReadyError::Failed { key: self.key.to_string(), detail })),
                Readiness::Pending => {
                    trace!(key = %self.key, "condition not met yet");
                    None
                }
            },
        };
        Ok(())
    }
}
