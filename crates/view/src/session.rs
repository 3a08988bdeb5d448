use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use vigil_core::{ChangeEvent, CoreError};
use vigil_watch::{Normalizer, Subscription, WatchConsumer};

use crate::filters::{FilterState, NamedFilter};
use crate::maintainer::{ViewMaintainer, ViewSnapshot};
use crate::sort::SortState;

const FLUSH_EVERY: Duration = Duration::from_millis(8);

/// Requests applied by the view task between batches.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    Sort(Option<SortState>),
    Search(String),
    Filters(FilterState),
    Filter(NamedFilter, bool),
    Refresh,
}

/// Read side of a running view session.
#[derive(Clone)]
pub struct ViewHandle {
    snap: Arc<ArcSwap<ViewSnapshot>>,
    epoch_rx: watch::Receiver<u64>,
    cmd_tx: mpsc::Sender<ViewCommand>,
}

impl ViewHandle {
    pub fn current(&self) -> Arc<ViewSnapshot> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }

    /// Returns `false` once the view task has stopped.
    pub async fn send(&self, cmd: ViewCommand) -> bool { self.cmd_tx.send(cmd).await.is_ok() }
}

/// Collects normalized events between flushes.
struct Batcher {
    view: ViewMaintainer,
    pending: Vec<ChangeEvent>,
    dirty: bool,
    listed: bool,
}

impl Batcher {
    fn flush(&mut self) -> Result<bool, CoreError> {
        if !self.pending.is_empty() {
            let batch = std::mem::take(&mut self.pending);
            self.view.apply_mutation_batch(&batch)?;
            self.dirty = true;
        }
        Ok(std::mem::take(&mut self.dirty))
    }

    /// Apply the tail of a finished relist and mark the view synced.
    /// Returns whether a relist finished since the last call.
    fn finish_relist(&mut self) -> Result<bool, CoreError> {
        if !std::mem::take(&mut self.listed) {
            return Ok(false);
        }
        self.flush()?;
        self.view.mark_synced();
        Ok(true)
    }

    fn command(&mut self, cmd: ViewCommand) {
        debug!(?cmd, "view command");
        self.dirty |= match cmd {
            ViewCommand::Sort(sort) => self.view.set_sort(sort),
            ViewCommand::Search(value) => self.view.set_search(&value),
            ViewCommand::Filters(filters) => {
                self.view.set_filters(filters);
                true
            }
            ViewCommand::Filter(filter, on) => {
                self.view.set_filter(filter, on);
                true
            }
            ViewCommand::Refresh => {
                self.view.refresh();
                true
            }
        };
    }
}

impl WatchConsumer for Batcher {
    // Pending events predate the relist and would be wiped by the reset.
    fn on_connect(&mut self) {
        self.pending.clear();
        self.view.reset();
        self.listed = false;
        self.dirty = true;
    }

    fn on_listed(&mut self) { self.listed = true; }

    fn handle(&mut self, event: &ChangeEvent) -> Result<(), CoreError> {
        self.pending.push(event.clone());
        Ok(())
    }
}

/// Spawn the single writer of a view: it drains `subscription` through the
/// normalizer, applies events in batches and publishes a snapshot per change.
/// A completed relist is published at once, with `synced` set.
pub fn spawn_view(
    view: ViewMaintainer,
    normalizer: Normalizer,
    mut subscription: Subscription,
) -> (ViewHandle, JoinHandle<Result<(), CoreError>>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<ViewCommand>(64);
    let snap = Arc::new(ArcSwap::from_pointee(view.snapshot()));
    let (epoch_tx, epoch_rx) = watch::channel(view.epoch());
    let snap_clone = Arc::clone(&snap);

    let task = tokio::spawn(async move {
        let mut batcher = Batcher { view, pending: Vec::new(), dirty: false, listed: false };
        let mut ticker = tokio::time::interval(FLUSH_EVERY);
        let mut commands_open = true;
        let publish = |batcher: &Batcher| {
            let next = batcher.view.snapshot();
            let epoch = next.epoch;
            snap_clone.store(Arc::new(next));
            let _ = epoch_tx.send(epoch);
        };
        loop {
            tokio::select! {
                maybe = subscription.recv() => match maybe {
                    Some(signal) => {
                        if let Err(e) = normalizer.dispatch(&signal, &mut batcher) {
                            error!(resource = %normalizer.resource(), error = %e, "view stopped on malformed event");
                            return Err(e);
                        }
                        if batcher.finish_relist()? {
                            publish(&batcher);
                        }
                    }
                    None => {
                        debug!("signal hub closed; draining view");
                        if batcher.flush()? {
                            publish(&batcher);
                        }
                        break;
                    }
                },
                cmd = cmd_rx.recv(), if commands_open => match cmd {
                    Some(cmd) => {
                        let mut changed = batcher.flush()?;
                        batcher.command(cmd);
                        changed |= batcher.flush()?;
                        if changed {
                            publish(&batcher);
                        }
                    }
                    None => commands_open = false,
                },
                _ = ticker.tick() => {
                    if batcher.flush()? {
                        publish(&batcher);
                    }
                }
            }
        }
        info!(resource = %normalizer.resource(), "view loop stopped");
        Ok(())
    });

    (ViewHandle { snap, epoch_rx, cmd_tx }, task)
}
