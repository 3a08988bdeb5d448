use std::cmp::Ordering;

use serde::Serialize;
use vigil_core::Resource;

use crate::columns::{sort_value, Column, SortValue};
use crate::tickets::TicketSource;

/// Active sort column and direction. No state means cache order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortState {
    #[serde(serialize_with = "column_id")]
    pub sort_by: Column,
    pub sort_desc: bool,
}

fn column_id<S: serde::Serializer>(c: &Column, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(c.as_str()) }

impl SortState {
    pub fn asc(sort_by: Column) -> Self { Self { sort_by, sort_desc: false } }
    pub fn desc(sort_by: Column) -> Self { Self { sort_by, sort_desc: true } }
}

/// Precomputed sort inputs for one cached object.
#[derive(Clone, Debug)]
pub struct SortEntry<'a> {
    pub key: &'a str,
    pub name: &'a str,
    pub value: SortValue,
}

impl<'a> SortEntry<'a> {
    pub fn new(key: &'a str, obj: &'a Resource, column: &Column, tickets: &dyn TicketSource) -> Self {
        Self { key, name: obj.name().unwrap_or(""), value: sort_value(column, obj, tickets) }
    }
}

/// Total order over entries: value in the requested direction, then name
/// ascending, then key. Readiness keeps entries without a failing
/// condition last in both directions.
pub fn compare(state: &SortState, a: &SortEntry<'_>, b: &SortEntry<'_>) -> Ordering {
    let by_value = match (&state.sort_by, a.value.is_missing(), b.value.is_missing()) {
        (Column::Readiness, true, false) => return Ordering::Greater,
        (Column::Readiness, false, true) => return Ordering::Less,
        _ => directed(a.value.cmp(&b.value), state.sort_desc),
    };
    by_value.then_with(|| a.name.cmp(b.name)).then_with(|| a.key.cmp(b.key))
}

fn directed(ord: Ordering, desc: bool) -> Ordering {
    if desc { ord.reverse() } else { ord }
}

/// Sort `entries` in place; returns keys in view order.
pub fn sorted_keys(state: &SortState, mut entries: Vec<SortEntry<'_>>) -> Vec<String> {
    entries.sort_by(|a, b| compare(state, a, b));
    entries.into_iter().map(|e| e.key.to_string()).collect()
}
