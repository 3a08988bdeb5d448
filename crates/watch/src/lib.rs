//! Vigil watch layer: normalizes transport notifications and fans them out
//! to independent consumers (caches, readiness waits, views).

#![forbid(unsafe_code)]

mod backoff;
mod hub;
pub mod transport;
mod normalizer;

pub use backoff::Backoff;
pub use hub::{SignalHub, Subscription};
pub use normalizer::{Normalizer, WatchConsumer};
