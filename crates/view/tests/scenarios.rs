#![forbid(unsafe_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use vigil_core::{ChangeEvent, Resource};
use vigil_view::{Column, FilterState, NamedFilter, SortState, Ticket, TicketBoard, ViewMaintainer, ViewScope};

fn shoot(ns: &str, name: &str, rev: u64, spec: Value, status: Value) -> Resource {
    Resource::new(json!({
        "metadata": { "namespace": ns, "name": name, "resourceVersion": rev.to_string() },
        "spec": spec,
        "status": status
    }))
}

fn versioned(name: &str, version: &str) -> Resource {
    shoot("garden-p", name, 1, json!({ "kubernetes": { "version": version } }), json!({}))
}

fn names<'a>(items: impl Iterator<Item = &'a Resource>) -> Vec<String> {
    items.filter_map(|o| o.name().map(str::to_string)).collect()
}

#[test]
fn versions_sort_semantically() {
    let mut view = ViewMaintainer::new(ViewScope::default());
    view.apply_mutation_batch(&[
        ChangeEvent::Added(versioned("b", "1.10.0")),
        ChangeEvent::Added(versioned("a", "1.9.0")),
    ])
    .expect("batch");
    view.set_sort(Some(SortState::asc(Column::K8sVersion)));
    let versions: Vec<_> = view.sorted_items().filter_map(|o| o.str_at("/spec/kubernetes/version")).collect();
    assert_eq!(versions, vec!["1.9.0", "1.10.0"]);

    view.set_sort(Some(SortState::desc(Column::K8sVersion)));
    assert_eq!(names(view.sorted_items()), vec!["b", "a"]);
}

#[test]
fn search_requires_every_token() {
    let mut view = ViewMaintainer::new(ViewScope::default());
    view.apply_mutation_batch(&[
        ChangeEvent::Added(shoot("garden-prod-team", "web", 1, json!({ "provider": { "type": "aws" }, "region": "eu-west-1" }), json!({}))),
        ChangeEvent::Added(shoot("garden-prod-team", "batch", 1, json!({ "provider": { "type": "gcp" }, "region": "us-east1" }), json!({}))),
        ChangeEvent::Added(shoot("garden-dev", "eu-test", 1, json!({ "provider": { "type": "aws" }, "region": "eu-west-1" }), json!({}))),
    ])
    .expect("batch");
    assert!(view.set_search("prod eu"));
    assert_eq!(names(view.filtered_and_sorted_items()), vec!["web"]);
    assert!(!view.set_search("prod eu"));
    assert!(view.set_search(""));
    assert_eq!(view.filtered_and_sorted_items().count(), 3);
}

#[test]
fn natural_order_follows_cache() {
    let mut view = ViewMaintainer::new(ViewScope::default());
    view.apply_mutation_batch(&[
        ChangeEvent::Added(versioned("c", "1.0.0")),
        ChangeEvent::Added(versioned("a", "1.0.0")),
        ChangeEvent::Added(versioned("b", "1.0.0")),
        ChangeEvent::Deleted(versioned("c", "1.0.0")),
    ])
    .expect("batch");
    assert_eq!(names(view.sorted_items()), vec!["b", "a"]);
    assert!(view.item("garden-p", "a").is_some());
    assert!(view.item("garden-p", "c").is_none());
}

#[test]
fn last_operation_column_orders_by_urgency() {
    let mut view = ViewMaintainer::new(ViewScope::default());
    view.set_sort(Some(SortState::asc(Column::LastOperation)));
    view.apply_mutation_batch(&[
        ChangeEvent::Added(shoot("garden-p", "healthy", 1, json!({}), json!({ "lastOperation": { "state": "Succeeded", "progress": 100 } }))),
        ChangeEvent::Added(shoot("garden-p", "failed", 1, json!({}), json!({ "lastOperation": { "state": "Failed" } }))),
        ChangeEvent::Added(shoot("garden-p", "busy", 1, json!({}), json!({ "lastOperation": { "state": "Processing", "progress": 50 } }))),
        ChangeEvent::Added(shoot("garden-p", "sleeping", 1, json!({}), json!({ "hibernated": true }))),
    ])
    .expect("batch");
    assert_eq!(names(view.sorted_items()), vec!["failed", "sleeping", "busy", "healthy"]);

    // an update that changes the rank moves the item
    view.apply_mutation_batch(&[ChangeEvent::Modified(shoot("garden-p", "busy", 2, json!({}), json!({ "lastOperation": { "state": "Failed", "progress": 50 } })))])
        .expect("batch");
    assert_eq!(names(view.sorted_items()), vec!["busy", "failed", "sleeping", "healthy"]);
}

#[test]
fn readiness_without_failures_sorts_last() {
    let cond = |at: &str| json!({ "conditions": [{ "type": "EveryNodeReady", "status": "False", "lastTransitionTime": at }] });
    let mut view = ViewMaintainer::new(ViewScope::default());
    view.apply_mutation_batch(&[
        ChangeEvent::Added(shoot("garden-p", "ok", 1, json!({}), json!({}))),
        ChangeEvent::Added(shoot("garden-p", "late", 1, json!({}), cond("2022-01-01T00:00:00Z"))),
        ChangeEvent::Added(shoot("garden-p", "early", 1, json!({}), cond("2021-01-01T00:00:00Z"))),
    ])
    .expect("batch");
    view.set_sort(Some(SortState::asc(Column::Readiness)));
    assert_eq!(names(view.sorted_items()), vec!["early", "late", "ok"]);
    view.set_sort(Some(SortState::desc(Column::Readiness)));
    assert_eq!(names(view.sorted_items()), vec!["late", "early", "ok"]);
}

#[test]
fn unchanged_sort_value_skips_resort() {
    let board = Arc::new(TicketBoard::new());
    let mut view = ViewMaintainer::new(ViewScope::default()).with_tickets(board.clone(), Vec::new());
    board.insert("garden-p", "a", Ticket { updated_at: "2024-01-01T00:00:00Z".into(), labels: vec![] });
    board.insert("garden-p", "b", Ticket { updated_at: "2024-02-01T00:00:00Z".into(), labels: vec![] });
    view.apply_mutation_batch(&[ChangeEvent::Added(versioned("a", "1.0.0")), ChangeEvent::Added(versioned("b", "1.0.0"))]).expect("batch");
    view.set_sort(Some(SortState::asc(Column::Ticket)));
    assert_eq!(names(view.sorted_items()), vec!["a", "b"]);

    // the ticket collaborator changes behind the view's back; an unrelated
    // object update leaves the ticket value equal on old and new, so the
    // order is kept until an explicit refresh
    board.insert("garden-p", "a", Ticket { updated_at: "2024-03-01T00:00:00Z".into(), labels: vec![] });
    let a2 = shoot("garden-p", "a", 2, json!({ "kubernetes": { "version": "1.1.0" } }), json!({}));
    view.apply_mutation_batch(&[ChangeEvent::Modified(a2)]).expect("batch");
    assert_eq!(names(view.sorted_items()), vec!["a", "b"]);
    view.refresh();
    assert_eq!(names(view.sorted_items()), vec!["b", "a"]);
}

#[test]
fn named_filters_only_in_issues_overview() {
    let progressing = Resource::new(json!({
        "metadata": { "namespace": "garden-p", "name": "p", "labels": { "shoot.gardener.cloud/status": "progressing" } }
    }));
    let broken = Resource::new(json!({
        "metadata": { "namespace": "garden-p", "name": "u", "labels": { "shoot.gardener.cloud/status": "unhealthy" } }
    }));
    let events = [ChangeEvent::Added(progressing), ChangeEvent::Added(broken)];

    let mut scoped = ViewMaintainer::new(ViewScope { all_namespaces: false, only_issues: true });
    scoped.apply_mutation_batch(&events).expect("batch");
    scoped.set_filters(FilterState::enabled([NamedFilter::Progressing]));
    assert_eq!(names(scoped.filtered_and_sorted_items()), vec!["p", "u"]);

    let mut overview = ViewMaintainer::new(ViewScope { all_namespaces: true, only_issues: true });
    overview.apply_mutation_batch(&events).expect("batch");
    overview.set_filter(NamedFilter::Progressing, true);
    assert_eq!(names(overview.filtered_and_sorted_items()), vec!["u"]);
    assert_eq!(overview.sorted_items().count(), 2);
}

#[test]
fn issues_overview_evicts_recovered_clusters() {
    let with_status = |rev: u64, s: &str| Resource::new(json!({
        "metadata": { "namespace": "garden-p", "name": "x", "resourceVersion": rev.to_string(), "labels": { "shoot.gardener.cloud/status": s } }
    }));
    let mut view = ViewMaintainer::new(ViewScope { all_namespaces: true, only_issues: true });
    view.apply_mutation_batch(&[ChangeEvent::Added(with_status(1, "healthy"))]).expect("batch");
    assert_eq!(view.cache().len(), 0);
    view.apply_mutation_batch(&[ChangeEvent::Modified(with_status(2, "unhealthy"))]).expect("batch");
    assert_eq!(view.cache().len(), 1);
    view.apply_mutation_batch(&[ChangeEvent::Modified(with_status(3, "healthy"))]).expect("batch");
    assert_eq!(view.cache().len(), 0);
    assert_eq!(view.snapshot().items.len(), 0);
}

#[test]
fn malformed_event_keeps_earlier_batch_items() {
    let mut view = ViewMaintainer::new(ViewScope::default());
    let nameless = Resource::new(json!({ "metadata": { "namespace": "garden-p" } }));
    let res = view.apply_mutation_batch(&[ChangeEvent::Added(versioned("a", "1.0.0")), ChangeEvent::Added(nameless), ChangeEvent::Added(versioned("b", "1.0.0"))]);
    assert!(res.is_err());
    assert_eq!(names(view.sorted_items()), vec!["a"]);
    let snap = view.snapshot();
    assert_eq!(snap.total, 1);
    assert_eq!(snap.epoch, view.epoch());
}

#[test]
fn relist_marks_view_synced_until_next_connect() {
    let mut view = ViewMaintainer::new(ViewScope::default());
    let normalizer = vigil_watch::Normalizer::new("shoots");
    assert!(!view.is_synced());
    normalizer.dispatch(&vigil_core::Signal::Connect, &mut view).expect("connect");
    normalizer.dispatch(&ChangeEvent::Added(versioned("a", "1.9.0")).into(), &mut view).expect("added");
    assert!(!view.is_synced());
    normalizer.dispatch(&vigil_core::Signal::Listed { count: 1 }, &mut view).expect("listed");
    assert!(view.is_synced());
    assert!(view.snapshot().synced);
    normalizer.dispatch(&vigil_core::Signal::Connect, &mut view).expect("reconnect");
    assert!(!view.is_synced());
    assert_eq!(view.snapshot().total, 0);
}
