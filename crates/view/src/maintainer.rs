use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, error};
use vigil_core::{ChangeEvent, CoreError, KeyPath, Resource};
use vigil_store::{KeyedCache, Mutation};
use vigil_watch::WatchConsumer;

use crate::columns::sort_value_changed;
use crate::filters::{FilterState, NamedFilter, ViewScope};
use crate::search::SearchState;
use crate::shoot;
use crate::sort::{sorted_keys, SortEntry, SortState};
use crate::tickets::{NoTickets, TicketSource};

/// Immutable view published after each change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewSnapshot {
    pub epoch: u64,
    /// The relist after the last connect has been applied in full.
    pub synced: bool,
    /// Items in the cache, regardless of search and filters.
    pub total: usize,
    pub sort: Option<SortState>,
    pub items: Vec<Resource>,
}

/// Owns the cache of one session and keeps its sorted and filtered
/// projections current.
pub struct ViewMaintainer {
    cache: KeyedCache,
    scope: ViewScope,
    tickets: Arc<dyn TicketSource>,
    hide_ticket_labels: Vec<String>,
    sort: Option<SortState>,
    search: SearchState,
    filters: FilterState,
    sorted: Vec<String>,
    filtered: Vec<String>,
    epoch: u64,
    synced: bool,
}

impl ViewMaintainer {
    pub fn new(scope: ViewScope) -> Self {
        let mut cache = KeyedCache::new("shoots", KeyPath::namespaced_name());
        if scope.issues_overview() {
            cache = cache.with_filter(|ev| ev.object().map(|o| !shoot::has_issue(o)).unwrap_or(false));
        }
        Self {
            cache,
            scope,
            tickets: Arc::new(NoTickets),
            hide_ticket_labels: Vec::new(),
            sort: None,
            search: SearchState::default(),
            filters: FilterState::default(),
            sorted: Vec::new(),
            filtered: Vec::new(),
            epoch: 0,
            synced: false,
        }
    }

    pub fn with_tickets(mut self, tickets: Arc<dyn TicketSource>, hide_labels: Vec<String>) -> Self {
        self.tickets = tickets;
        self.hide_ticket_labels = hide_labels;
        self
    }

    pub fn scope(&self) -> ViewScope { self.scope }
    pub fn cache(&self) -> &KeyedCache { &self.cache }
    pub fn epoch(&self) -> u64 { self.epoch }
    pub fn is_synced(&self) -> bool { self.synced }
    pub fn sort(&self) -> Option<&SortState> { self.sort.as_ref() }
    pub fn search(&self) -> &SearchState { &self.search }
    pub fn filters(&self) -> &FilterState { &self.filters }

    /// Apply a batch of change events, then refresh the projections once.
    ///
    /// A failing event stops the batch; events before it stay applied and
    /// the projections still reflect them.
    pub fn apply_mutation_batch(&mut self, events: &[ChangeEvent]) -> Result<(), CoreError> {
        let mut changed = false;
        let mut resort = false;
        let mut failure = None;
        for ev in events {
            match self.cache.upsert_or_delete(ev) {
                Ok(m) => {
                    changed |= m.changed();
                    resort |= self.requires_resort(&m);
                }
                Err(e) => {
                    error!(error = %e, "view dropped malformed event");
                    failure = Some(e);
                    break;
                }
            }
        }
        if changed {
            if resort {
                self.resort();
            } else {
                counter!("view_resort_skipped_total", 1u64);
            }
            self.refilter();
            self.epoch += 1;
            debug!(epoch = self.epoch, items = self.cache.len(), visible = self.filtered.len(), resort, "view updated");
        }
        failure.map_or(Ok(()), Err)
    }

    fn requires_resort(&self, m: &Mutation) -> bool {
        match m {
            Mutation::Inserted { .. } | Mutation::Removed { .. } => true,
            Mutation::Replaced { key, previous } => match (&self.sort, self.cache.get(key)) {
                (Some(s), Some(current)) if !s.sort_by.is_immutable() => {
                    sort_value_changed(&s.sort_by, previous, current, self.tickets.as_ref())
                }
                _ => false,
            },
            Mutation::StaleIgnored { .. } | Mutation::Skipped => false,
        }
    }

    /// Drop all items; a relist follows.
    pub fn reset(&mut self) {
        self.cache.reset();
        self.sorted.clear();
        self.filtered.clear();
        self.synced = false;
        self.epoch += 1;
    }

    /// Record that the relist following the last reset has been applied.
    pub fn mark_synced(&mut self) {
        self.synced = true;
        self.epoch += 1;
        debug!(epoch = self.epoch, items = self.cache.len(), "view synced");
    }

    /// Returns `false` when the state is unchanged.
    pub fn set_sort(&mut self, sort: Option<SortState>) -> bool {
        if self.sort == sort {
            return false;
        }
        self.sort = sort;
        self.resort();
        self.refilter();
        self.epoch += 1;
        true
    }

    pub fn set_search(&mut self, value: &str) -> bool {
        self.set_search_state(SearchState::parse(value))
    }

    pub fn set_search_state(&mut self, search: SearchState) -> bool {
        if self.search == search {
            return false;
        }
        self.search = search;
        self.refilter();
        self.epoch += 1;
        true
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.refilter();
        self.epoch += 1;
    }

    pub fn set_filter(&mut self, filter: NamedFilter, on: bool) {
        let mut filters = self.filters.clone();
        filters.set(filter, on);
        self.set_filters(filters);
    }

    /// Recompute both projections, e.g. after the ticket source changed.
    pub fn refresh(&mut self) {
        self.resort();
        self.refilter();
        self.epoch += 1;
    }

    fn resort(&mut self) {
        counter!("view_resort_total", 1u64);
        self.sorted = match &self.sort {
            None => self.cache.keys().to_vec(),
            Some(state) => {
                let tickets = self.tickets.as_ref();
                let entries = self.cache.iter().map(|(key, obj)| SortEntry::new(key, obj, &state.sort_by, tickets)).collect();
                sorted_keys(state, entries)
            }
        };
    }

    fn refilter(&mut self) {
        let tickets = self.tickets.as_ref();
        let apply_named = self.scope.issues_overview();
        self.filtered = self
            .sorted
            .iter()
            .filter(|key| {
                let Some(obj) = self.cache.get(key) else { return false };
                self.search.matches(obj, tickets)
                    && (!apply_named || self.filters.keep(obj, tickets, &self.hide_ticket_labels))
            })
            .cloned()
            .collect();
    }

    pub fn sorted_items(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.sorted.iter().filter_map(|k| self.cache.get(k))
    }

    pub fn filtered_and_sorted_items(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.filtered.iter().filter_map(|k| self.cache.get(k))
    }

    pub fn item(&self, namespace: &str, name: &str) -> Option<&Resource> {
        self.cache.get(&format!("{}/{}", namespace, name))
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            epoch: self.epoch,
            synced: self.synced,
            total: self.cache.len(),
            sort: self.sort.clone(),
            items: self.filtered_and_sorted_items().cloned().collect(),
        }
    }
}

impl WatchConsumer for ViewMaintainer {
    fn on_connect(&mut self) { self.reset(); }

    fn on_listed(&mut self) { self.mark_synced(); }

    fn handle(&mut self, event: &ChangeEvent) -> Result<(), CoreError> {
        self.apply_mutation_batch(std::slice::from_ref(event))
    }
}
