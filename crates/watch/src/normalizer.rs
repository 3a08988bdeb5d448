use metrics::counter;
use tracing::{debug, error, trace};
use vigil_core::{ChangeEvent, CoreError, Signal};

use crate::Subscription;

/// Receiver of normalized watch traffic.
///
/// Only ADDED/MODIFIED/DELETED events reach [`WatchConsumer::handle`]; ERROR
/// and unrecognized events stop at the [`Normalizer`].
pub trait WatchConsumer {
    /// A (re)connect happened; a full relist follows.
    fn on_connect(&mut self) {}

    /// The relist after the last connect has been delivered in full.
    fn on_listed(&mut self) {}

    fn handle(&mut self, event: &ChangeEvent) -> Result<(), CoreError>;
}

/// Classifies transport signals for one watched resource and forwards the
/// well-formed change events to a consumer, in delivery order.
#[derive(Debug, Clone)]
pub struct Normalizer {
    resource: String,
}

impl Normalizer {
    /// `resource` is the logical name used in diagnostics (e.g. `shoots`).
    pub fn new(resource: impl Into<String>) -> Self {
        Self { resource: resource.into() }
    }

    pub fn resource(&self) -> &str { &self.resource }

    pub fn dispatch<C>(&self, signal: &Signal, consumer: &mut C) -> Result<(), CoreError>
    where
        C: WatchConsumer + ?Sized,
    {
        match signal {
            Signal::Connect => {
                debug!(resource = %self.resource, "watch connected");
                consumer.on_connect();
            }
            Signal::Listed { count } => {
                debug!(resource = %self.resource, count, "watch relist complete");
                consumer.on_listed();
            }
            Signal::Disconnect { reason } => {
                error!(resource = %self.resource, reason = ?reason, "watch disconnected");
            }
            Signal::Reconnect { attempt, delay } => {
                debug!(resource = %self.resource, attempt, delay_ms = %delay.as_millis(), "watch reconnect attempt");
                counter!("watch_reconnects_total", 1u64);
            }
            Signal::Error { message } => {
                error!(resource = %self.resource, error = %message, "watch error");
                counter!("watch_errors_total", 1u64);
            }
            Signal::Event(event) => self.dispatch_event(event, consumer)?,
        }
        Ok(())
    }

    fn dispatch_event<C>(&self, event: &ChangeEvent, consumer: &mut C) -> Result<(), CoreError>
    where
        C: WatchConsumer + ?Sized,
    {
        match event {
            ChangeEvent::Added(obj) | ChangeEvent::Modified(obj) | ChangeEvent::Deleted(obj) => {
                let kind = event.kind().map(|k| k.as_str()).unwrap_or("?");
                let Some(name) = obj.name() else {
                    error!(resource = %self.resource, kind, "watch event without metadata.name");
                    return Err(CoreError::MissingKey { path: "/metadata/name".into() });
                };
                debug!(resource = %self.resource, kind, name, "watch event");
                counter!("watch_events_total", 1u64, "kind" => kind);
                if let Err(e) = consumer.handle(event) {
                    error!(resource = %self.resource, kind, name, error = %e, "watch consumer rejected event");
                    return Err(e);
                }
            }
            ChangeEvent::Error(status) => {
                error!(
                    resource = %self.resource,
                    code = status.code,
                    reason = %status.reason,
                    message = %status.message,
                    "watch error event"
                );
                counter!("watch_errors_total", 1u64);
            }
            ChangeEvent::Unrecognized { kind } => {
                trace!(resource = %self.resource, kind = %kind, "ignoring unrecognized watch event");
            }
        }
        Ok(())
    }

    /// Pump a subscription into `consumer` until the hub closes.
    pub async fn drive<C>(&self, subscription: &mut Subscription, consumer: &mut C) -> Result<(), CoreError>
    where
        C: WatchConsumer + ?Sized,
    {
        while let Some(signal) = subscription.recv().await {
            self.dispatch(&signal, consumer)?;
        }
        debug!(resource = %self.resource, "signal hub closed");
        Ok(())
    }
}
