use smallvec::SmallVec;
use vigil_core::Resource;

use crate::columns::{raw_value, Column};
use crate::tickets::TicketSource;

const SEARCH_COLUMNS: [Column; 8] = [
    Column::Name,
    Column::Infrastructure,
    Column::Seed,
    Column::Project,
    Column::CreatedBy,
    Column::Purpose,
    Column::K8sVersion,
    Column::TicketLabels,
];

/// Ordered lowercase search tokens; empty means no filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    tokens: Vec<String>,
}

impl SearchState {
    /// Split a user-entered value on spaces.
    pub fn parse(value: &str) -> Self {
        Self { tokens: value.split(' ').filter(|t| !t.is_empty()).map(str::to_lowercase).collect() }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { tokens: tokens.into_iter().map(|t| t.as_ref().to_lowercase()).filter(|t| !t.is_empty()).collect() }
    }

    pub fn tokens(&self) -> &[String] { &self.tokens }

    pub fn is_empty(&self) -> bool { self.tokens.is_empty() }

    /// Every token must occur in at least one searched field.
    pub fn matches(&self, obj: &Resource, tickets: &dyn TicketSource) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let fields = search_fields(obj, tickets);
        self.tokens.iter().all(|t| fields.iter().any(|f| f.contains(t.as_str())))
    }
}

pub fn search_fields(obj: &Resource, tickets: &dyn TicketSource) -> SmallVec<[String; 8]> {
    SEARCH_COLUMNS.iter().filter_map(|c| raw_value(c, obj, tickets)).map(|v| v.to_lowercase()).collect()
}
