//! Vigil core types shared by the watch, cache, readiness and view layers.

#![forbid(unsafe_code)]

pub mod config;
mod error;
mod event;
mod key;
mod resource;

pub use config::Settings;
pub use error::CoreError;
pub use event::{ChangeEvent, EventKind, Signal, WatchStatus};
pub use key::KeyPath;
pub use resource::{Resource, Revision};

pub mod prelude {
    pub use super::{ChangeEvent, CoreError, EventKind, KeyPath, Resource, Signal, WatchStatus};
}
