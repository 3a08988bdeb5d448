#![forbid(unsafe_code)]

use serde_json::json;
use vigil_core::{ChangeEvent, KeyPath, Resource, Signal};
use vigil_store::{KeyedCache, Mutation};
use vigil_watch::{Normalizer, SignalHub};

fn shoot(ns: &str, name: &str, rev: u64) -> Resource {
    Resource::new(json!({
        "metadata": { "namespace": ns, "name": name, "resourceVersion": rev.to_string() },
        "status": { "phase": "Initial" }
    }))
}

#[test]
fn added_then_modified_keeps_latest() {
    let mut cache = KeyedCache::new("shoots", KeyPath::namespaced_name());
    cache.upsert_or_delete(&ChangeEvent::Added(shoot("a", "x", 1))).expect("added");
    cache.upsert_or_delete(&ChangeEvent::Modified(shoot("a", "x", 2))).expect("modified");

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.items()[0], shoot("a", "x", 2));
}

#[test]
fn delete_for_unknown_key_leaves_cache_empty() {
    let mut cache = KeyedCache::new("shoots", KeyPath::namespaced_name());
    let m = cache.upsert_or_delete(&ChangeEvent::Deleted(shoot("a", "x", 1))).expect("no error");
    assert!(!m.changed());
    assert!(cache.is_empty());
}

#[test]
fn reconnect_relist_replaces_previous_state() {
    let normalizer = Normalizer::new("shoots");
    let mut cache = KeyedCache::new("shoots", KeyPath::namespaced_name());
    let first = [
        Signal::Connect,
        ChangeEvent::Added(shoot("a", "x", 1)).into(),
        ChangeEvent::Added(shoot("a", "y", 2)).into(),
        Signal::Disconnect { reason: Some("eof".into()) },
    ];
    for s in &first {
        normalizer.dispatch(s, &mut cache).expect("dispatch");
    }
    assert_eq!(cache.len(), 2);

    // y vanished while disconnected; relist only carries x
    let second = [Signal::Connect, ChangeEvent::Added(shoot("a", "x", 7)).into()];
    for s in &second {
        normalizer.dispatch(s, &mut cache).expect("dispatch");
    }
    assert_eq!(cache.keys(), &["a/x".to_string()]);
    assert_eq!(cache.get("a/x"), Some(&shoot("a", "x", 7)));
}

#[test]
fn projects_key_by_name() {
    let mut cache = KeyedCache::new("projects", KeyPath::name());
    let p = |name: &str, rev: u64| Resource::new(json!({ "metadata": { "name": name, "resourceVersion": rev.to_string() } }));
    assert_eq!(cache.upsert(&p("garden-dev", 1)).expect("ok"), Mutation::Inserted { key: "garden-dev".into() });
    assert!(matches!(cache.upsert(&p("garden-dev", 3)).expect("ok"), Mutation::Replaced { .. }));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn drives_cache_from_hub() {
    let hub = SignalHub::new(32);
    let mut sub = hub.subscribe();
    hub.publish(Signal::Connect).await;
    hub.publish(ChangeEvent::Added(shoot("a", "x", 1)).into()).await;
    hub.publish(ChangeEvent::Added(shoot("b", "x", 1)).into()).await;
    hub.publish(ChangeEvent::Deleted(shoot("a", "x", 1)).into()).await;
    drop(hub);

    let mut cache = KeyedCache::new("shoots", KeyPath::namespaced_name());
    Normalizer::new("shoots").drive(&mut sub, &mut cache).await.expect("drive");
    assert_eq!(cache.keys(), &["b/x".to_string()]);
}

#[tokio::test]
async fn reconnect_burst_past_the_buffer_replaces_the_cache() {
    let hub = SignalHub::new(4);
    let mut sub = hub.subscribe();
    let mut cache = KeyedCache::new("shoots", KeyPath::namespaced_name());
    let normalizer = Normalizer::new("shoots");
    normalizer.dispatch(&Signal::Connect, &mut cache).expect("connect");
    normalizer.dispatch(&ChangeEvent::Added(shoot("a", "x", 1)).into(), &mut cache).expect("added");

    let publisher = tokio::spawn(async move {
        hub.publish(Signal::Connect).await;
        for i in 0..5 {
            hub.publish(ChangeEvent::Added(shoot("a", &format!("y{}", i), 2)).into()).await;
        }
        hub.publish(Signal::Listed { count: 5 }).await;
    });
    normalizer.drive(&mut sub, &mut cache).await.expect("drive");
    publisher.await.expect("publisher");

    let mut keys = cache.keys().to_vec();
    keys.sort();
    assert_eq!(keys, (0..5).map(|i| format!("a/y{}", i)).collect::<Vec<_>>());
}
