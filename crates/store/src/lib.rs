//! Vigil store: keyed in-RAM cache mutated only through change events.

#![forbid(unsafe_code)]

use std::sync::Arc;

use metrics::gauge;
use rustc_hash::FxHashMap;
use tracing::debug;
use vigil_core::{ChangeEvent, CoreError, KeyPath, Resource};
use vigil_watch::WatchConsumer;

/// Returns `true` when an event should evict its object instead of storing it.
pub type MembershipFilter = Arc<dyn Fn(&ChangeEvent) -> bool + Send + Sync>;

/// Outcome of applying one event to a [`KeyedCache`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Inserted { key: String },
    Replaced { key: String, previous: Resource },
    Removed { key: String, previous: Resource },
    /// Delete of an absent key, or an upsert whose revision is not newer.
    StaleIgnored { key: String },
    /// ERROR or unrecognized event; nothing to apply.
    Skipped,
}

impl Mutation {
    pub fn key(&self) -> Option<&str> {
        match self {
            Mutation::Inserted { key } | Mutation::Replaced { key, .. } | Mutation::Removed { key, .. } | Mutation::StaleIgnored { key } => Some(key),
            Mutation::Skipped => None,
        }
    }

    /// Whether cache content changed.
    pub fn changed(&self) -> bool {
        matches!(self, Mutation::Inserted { .. } | Mutation::Replaced { .. } | Mutation::Removed { .. })
    }
}

/// Ordered collection of objects, at most one per key.
///
/// `items` keeps slot order; `index` maps each key to its slot. Deletion
/// swaps the last slot into the hole so both stay O(1) and iteration order
/// depends only on the event sequence.
pub struct KeyedCache {
    name: String,
    key_path: KeyPath,
    filter: Option<MembershipFilter>,
    items: Vec<Resource>,
    keys: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl KeyedCache {
    pub fn new(name: impl Into<String>, key_path: KeyPath) -> Self {
        Self {
            name: name.into(),
            key_path,
            filter: None,
            items: Vec::new(),
            keys: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn key_path(&self) -> &KeyPath { &self.key_path }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn get(&self, key: &str) -> Option<&Resource> {
        self.index.get(key).map(|&slot| &self.items[slot])
    }

    pub fn contains_key(&self, key: &str) -> bool { self.index.contains_key(key) }

    /// Objects in slot order.
    pub fn items(&self) -> &[Resource] { &self.items }

    /// Keys in slot order (parallel to [`KeyedCache::items`]).
    pub fn keys(&self) -> &[String] { &self.keys }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.keys.iter().map(|k| k.as_str()).zip(self.items.iter())
    }

    pub fn key_of(&self, obj: &Resource) -> Result<String, CoreError> {
        self.key_path.key_of(obj)
    }

    /// Apply one event. A filter hit turns ADDED/MODIFIED into a delete.
    pub fn upsert_or_delete(&mut self, event: &ChangeEvent) -> Result<Mutation, CoreError> {
        let Some(obj) = event.object() else {
            return Ok(Mutation::Skipped);
        };
        let filtered = self.filter.as_ref().map(|f| f(event)).unwrap_or(false);
        if filtered {
            debug!(cache = %self.name, object = %obj.display_name(), "filtered object");
        }
        let m = if event.is_upsert() && !filtered { self.upsert(obj)? } else { self.delete(obj)? };
        debug!(cache = %self.name, key = ?m.key(), changed = m.changed(), size = self.items.len(), "cache updated");
        gauge!("cache_items", self.items.len() as f64, "cache" => self.name.clone());
        Ok(m)
    }

    pub fn upsert(&mut self, obj: &Resource) -> Result<Mutation, CoreError> {
        let key = self.key_path.key_of(obj)?;
        match self.index.get(&key) {
            Some(&slot) => {
                if !obj.is_newer_than(&self.items[slot]) {
                    return Ok(Mutation::StaleIgnored { key });
                }
                let previous = std::mem::replace(&mut self.items[slot], obj.clone());
                Ok(Mutation::Replaced { key, previous })
            }
            None => {
                self.index.insert(key.clone(), self.items.len());
                self.items.push(obj.clone());
                self.keys.push(key.clone());
                Ok(Mutation::Inserted { key })
            }
        }
    }

    pub fn delete(&mut self, obj: &Resource) -> Result<Mutation, CoreError> {
        let key = self.key_path.key_of(obj)?;
        let Some(slot) = self.index.remove(&key) else {
            return Ok(Mutation::StaleIgnored { key });
        };
        let previous = self.items.swap_remove(slot);
        self.keys.swap_remove(slot);
        if let Some(moved) = self.keys.get(slot) {
            self.index.insert(moved.clone(), slot);
        }
        Ok(Mutation::Removed { key, previous })
    }

    /// Drop everything; the transport relists after each connect.
    pub fn reset(&mut self) {
        debug!(cache = %self.name, dropped = self.items.len(), "cache reset");
        self.items.clear();
        self.keys.clear();
        self.index.clear();
    }
}

impl std::fmt::Debug for KeyedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedCache")
            .field("name", &self.name)
            .field("key_path", &self.key_path)
            .field("filtered", &self.filter.is_some())
            .field("len", &self.items.len())
            .finish()
    }
}

impl WatchConsumer for KeyedCache {
    fn on_connect(&mut self) { self.reset(); }

    fn handle(&mut self, event: &ChangeEvent) -> Result<(), CoreError> {
        self.upsert_or_delete(event).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(ns: &str, name: &str, rev: u64) -> Resource {
        Resource::new(json!({ "metadata": { "namespace": ns, "name": name, "resourceVersion": rev.to_string() } }))
    }

    fn cache() -> KeyedCache { KeyedCache::new("shoots", KeyPath::namespaced_name()) }

    #[test]
    fn modified_replaces_added() {
        let mut c = cache();
        assert_eq!(c.upsert_or_delete(&ChangeEvent::Added(obj("a", "x", 1))).expect("ok"), Mutation::Inserted { key: "a/x".into() });
        let m = c.upsert_or_delete(&ChangeEvent::Modified(obj("a", "x", 2))).expect("ok");
        assert!(matches!(m, Mutation::Replaced { ref key, ref previous } if key == "a/x" && previous == &obj("a", "x", 1)));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("a/x").and_then(|o| o.str_at("/metadata/resourceVersion")), Some("2"));
    }

    #[test]
    fn delete_of_unknown_key_is_a_noop() {
        let mut c = cache();
        let m = c.upsert_or_delete(&ChangeEvent::Deleted(obj("a", "x", 1))).expect("ok");
        assert_eq!(m, Mutation::StaleIgnored { key: "a/x".into() });
        assert_eq!(m.key(), Some("a/x"));
        assert!(c.is_empty());
    }

    #[test]
    fn older_revision_is_ignored() {
        let mut c = cache();
        c.upsert(&obj("a", "x", 5)).expect("ok");
        assert_eq!(c.upsert(&obj("a", "x", 4)).expect("ok"), Mutation::StaleIgnored { key: "a/x".into() });
        assert_eq!(c.upsert(&obj("a", "x", 5)).expect("ok"), Mutation::StaleIgnored { key: "a/x".into() });
        assert_eq!(c.get("a/x"), Some(&obj("a", "x", 5)));
    }

    #[test]
    fn swap_remove_keeps_index_consistent() {
        let mut c = cache();
        for (i, n) in ["p", "q", "r", "s"].iter().enumerate() {
            c.upsert(&obj("a", n, i as u64 + 1)).expect("ok");
        }
        c.delete(&obj("a", "q", 0)).expect("ok");
        assert_eq!(c.keys(), &["a/p".to_string(), "a/s".to_string(), "a/r".to_string()]);
        for (key, item) in c.iter() {
            assert_eq!(c.get(key), Some(item));
        }
        c.delete(&obj("a", "r", 0)).expect("ok");
        assert_eq!(c.keys(), &["a/p".to_string(), "a/s".to_string()]);
        assert!(c.get("a/r").is_none());
    }

    #[test]
    fn filter_hit_evicts() {
        let mut c = cache().with_filter(|ev| ev.object().and_then(|o| o.label("tier")) == Some("hidden"));
        c.upsert_or_delete(&ChangeEvent::Added(obj("a", "x", 1))).expect("ok");
        let hidden = Resource::new(json!({ "metadata": { "namespace": "a", "name": "x", "resourceVersion": "2", "labels": { "tier": "hidden" } } }));
        let m = c.upsert_or_delete(&ChangeEvent::Modified(hidden)).expect("ok");
        assert!(matches!(m, Mutation::Removed { .. }));
        assert!(c.is_empty());
    }

    #[test]
    fn connect_resets_and_errors_are_skipped() {
        let mut c = cache();
        c.upsert(&obj("a", "x", 1)).expect("ok");
        c.on_connect();
        assert!(c.is_empty());
        let skipped = c.upsert_or_delete(&ChangeEvent::Unrecognized { kind: "BOOKMARK".into() }).expect("ok");
        assert_eq!(skipped, Mutation::Skipped);
        assert_eq!(skipped.key(), None);
        assert!(!skipped.changed());
    }

    #[test]
    fn missing_key_is_an_error() {
        let mut c = cache();
        let nameless = Resource::new(json!({ "metadata": { "namespace": "a" } }));
        assert!(c.upsert_or_delete(&ChangeEvent::Added(nameless)).is_err());
        assert!(c.is_empty());
    }
}
