//! Vigil views: sorted, searchable and filterable projections over the
//! keyed cache of one watch session.

#![forbid(unsafe_code)]

pub mod columns;
pub mod filters;
mod maintainer;
pub mod search;
mod session;
pub mod shoot;
pub mod sort;
pub mod tickets;

pub use columns::{Column, SortValue};
pub use filters::{FilterState, NamedFilter, ViewScope};
pub use maintainer::{ViewMaintainer, ViewSnapshot};
pub use search::SearchState;
pub use session::{spawn_view, ViewCommand, ViewHandle};
pub use sort::SortState;
pub use tickets::{NoTickets, Ticket, TicketBoard, TicketSource};
