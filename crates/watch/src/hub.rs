use std::sync::{Arc, Mutex};

use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};
use vigil_core::Signal;

type Senders = Arc<Mutex<Vec<mpsc::Sender<Arc<Signal>>>>>;

/// Fan-out point for one watch session.
///
/// The transport publishes, every consumer (cache, view, readiness wait) holds
/// its own [`Subscription`] and sees every signal in publish order. Each
/// subscription has a bounded buffer; a full buffer makes [`SignalHub::publish`]
/// wait, so a slow consumer slows the watch down instead of losing signals.
#[derive(Debug, Clone)]
pub struct SignalHub {
    senders: Senders,
    capacity: usize,
}

impl SignalHub {
    /// `capacity` is the buffer size of each subscription.
    pub fn new(capacity: usize) -> Self {
        Self { senders: Arc::default(), capacity: capacity.max(1) }
    }

    /// Deliver to all current subscribers; returns how many received it.
    ///
    /// A subscription that is never read stalls this call once its buffer is
    /// full. Drop subscriptions that are no longer read.
    pub async fn publish(&self, signal: Signal) -> usize {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let signal = Arc::new(signal);
        let mut delivered = 0;
        let mut closed = false;
        for tx in &senders {
            match tx.try_send(Arc::clone(&signal)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(signal)) => {
                    trace!("signal subscriber full; waiting");
                    counter!("watch_backpressure_total", 1u64);
                    match tx.send(signal).await {
                        Ok(()) => delivered += 1,
                        Err(_) => closed = true,
                    }
                }
                Err(TrySendError::Closed(_)) => closed = true,
            }
        }
        if closed {
            let mut live = self.senders.lock().unwrap_or_else(|e| e.into_inner());
            live.retain(|tx| !tx.is_closed());
            debug!(subscribers = live.len(), "dropped closed signal subscribers");
        }
        delivered
    }

    /// Subscribers only see signals published after this call.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).push(tx);
        Subscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).iter().filter(|tx| !tx.is_closed()).count()
    }
}

/// Receiving half of a hub subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Arc<Signal>>,
}

impl Subscription {
    /// Next signal, or `None` once every hub handle is gone.
    pub async fn recv(&mut self) -> Option<Arc<Signal>> { self.rx.recv().await }
}
