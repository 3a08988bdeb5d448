//! Vigil readiness: wait until one object satisfies a predicate, or give up
//! after a bounded timeout.

#![forbid(unsafe_code)]

mod error;
pub mod predicates;
mod watcher;

pub use error::ReadyError;
pub use watcher::{PendingWait, ReadinessWatcher};

/// Outcome of evaluating a predicate against one observed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Terminal failing state; the wait rejects with this detail.
    Failed(String),
    /// Inconclusive; keep waiting.
    Pending,
}
