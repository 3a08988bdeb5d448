use std::sync::RwLock;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// An issue-tracker ticket attached to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// RFC 3339 timestamp of the last update.
    pub updated_at: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Supplies tickets for a cluster identified by namespace and name.
pub trait TicketSource: Send + Sync {
    fn tickets(&self, namespace: &str, name: &str) -> Vec<Ticket>;

    fn latest_updated(&self, namespace: &str, name: &str) -> Option<Ticket> {
        self.tickets(namespace, name).into_iter().max_by(|a, b| a.updated_at.cmp(&b.updated_at))
    }

    /// Distinct label names over all tickets of the cluster, first-seen order.
    fn label_names(&self, namespace: &str, name: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for t in self.tickets(namespace, name) {
            for l in t.labels {
                if !out.contains(&l) {
                    out.push(l);
                }
            }
        }
        out
    }
}

/// No ticket integration configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTickets;

impl TicketSource for NoTickets {
    fn tickets(&self, _namespace: &str, _name: &str) -> Vec<Ticket> { Vec::new() }
}

/// In-memory ticket store, fed by whatever polls the tracker.
#[derive(Debug, Default)]
pub struct TicketBoard {
    by_cluster: RwLock<FxHashMap<(String, String), Vec<Ticket>>>,
}

impl TicketBoard {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, namespace: &str, name: &str, ticket: Ticket) {
        let mut map = self.by_cluster.write().unwrap_or_else(|e| e.into_inner());
        map.entry((namespace.to_string(), name.to_string())).or_default().push(ticket);
    }

    pub fn clear(&self, namespace: &str, name: &str) {
        let mut map = self.by_cluster.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&(namespace.to_string(), name.to_string()));
    }
}

impl TicketSource for TicketBoard {
    fn tickets(&self, namespace: &str, name: &str) -> Vec<Ticket> {
        let map = self.by_cluster.read().unwrap_or_else(|e| e.into_inner());
        map.get(&(namespace.to_string(), name.to_string())).cloned().unwrap_or_default()
    }
}
