use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vigil_core::Resource;

use crate::shoot;
use crate::tickets::TicketSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedFilter {
    /// Hide clusters whose status label says `progressing`.
    Progressing,
    /// Hide clusters failing only because of user errors.
    UserIssues,
    DeactivatedReconciliation,
    /// Hide clusters whose tickets all carry a configured hide label.
    HideTicketsWithLabel,
}

impl NamedFilter {
    pub const ALL: [NamedFilter; 4] = [
        NamedFilter::Progressing,
        NamedFilter::UserIssues,
        NamedFilter::DeactivatedReconciliation,
        NamedFilter::HideTicketsWithLabel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamedFilter::Progressing => "progressing",
            NamedFilter::UserIssues => "userIssues",
            NamedFilter::DeactivatedReconciliation => "deactivatedReconciliation",
            NamedFilter::HideTicketsWithLabel => "hideTicketsWithLabel",
        }
    }
}

impl FromStr for NamedFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamedFilter::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown filter {:?} (expected one of progressing, userIssues, deactivatedReconciliation, hideTicketsWithLabel)", s))
    }
}

impl fmt::Display for NamedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Independent boolean toggles; each enabled filter hides matching items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    pub progressing: bool,
    pub user_issues: bool,
    pub deactivated_reconciliation: bool,
    pub hide_tickets_with_label: bool,
}

impl FilterState {
    pub fn enabled(filters: impl IntoIterator<Item = NamedFilter>) -> Self {
        let mut state = Self::default();
        for f in filters {
            state.set(f, true);
        }
        state
    }

    pub fn get(&self, filter: NamedFilter) -> bool {
        match filter {
            NamedFilter::Progressing => self.progressing,
            NamedFilter::UserIssues => self.user_issues,
            NamedFilter::DeactivatedReconciliation => self.deactivated_reconciliation,
            NamedFilter::HideTicketsWithLabel => self.hide_tickets_with_label,
        }
    }

    pub fn set(&mut self, filter: NamedFilter, on: bool) {
        let slot = match filter {
            NamedFilter::Progressing => &mut self.progressing,
            NamedFilter::UserIssues => &mut self.user_issues,
            NamedFilter::DeactivatedReconciliation => &mut self.deactivated_reconciliation,
            NamedFilter::HideTicketsWithLabel => &mut self.hide_tickets_with_label,
        };
        *slot = on;
    }

    /// Whether `obj` survives every enabled filter.
    pub fn keep(&self, obj: &Resource, tickets: &dyn TicketSource, hide_labels: &[String]) -> bool {
        if self.progressing && shoot::is_progressing(obj) {
            return false;
        }
        if self.user_issues {
            let errors = shoot::error_codes(shoot::last_errors(obj));
            let conditions = shoot::error_codes(shoot::conditions(obj));
            if shoot::is_user_error(&errors) || shoot::is_user_error(&conditions) {
                return false;
            }
        }
        if self.deactivated_reconciliation && shoot::is_reconciliation_deactivated(obj) {
            return false;
        }
        if self.hide_tickets_with_label && !hide_labels.is_empty() {
            let all = tickets.tickets(obj.namespace().unwrap_or(""), obj.name().unwrap_or(""));
            let visible = all.iter().any(|t| !t.labels.iter().any(|l| hide_labels.contains(l)));
            if !all.is_empty() && !visible {
                return false;
            }
        }
        true
    }
}

/// Which clusters a session mirrors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewScope {
    pub all_namespaces: bool,
    pub only_issues: bool,
}

impl ViewScope {
    /// Named filters only apply in this aggregate mode.
    pub fn issues_overview(&self) -> bool { self.all_namespaces && self.only_issues }
}
