//! kube-rs transport: list+watch a GVK and publish [`Signal`]s into a hub.

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use kube::{
    api::Api,
    core::{ApiResource, DynamicObject, GroupVersionKind},
    discovery::{Discovery, Scope},
    runtime::watcher::{self, Event},
    Client,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vigil_core::{ChangeEvent, Resource, Settings, Signal};

use crate::{Backoff, SignalHub};

/// What to watch: a GVK key plus optional namespace and selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    /// `v1/Kind` or `group/v1/Kind`.
    pub gvk_key: String,
    pub namespace: Option<String>,
    pub field_selector: Option<String>,
    pub label_selector: Option<String>,
}

impl WatchTarget {
    pub fn new(gvk_key: impl Into<String>) -> Self {
        Self { gvk_key: gvk_key.into(), namespace: None, field_selector: None, label_selector: None }
    }

    pub fn namespace(mut self, ns: Option<String>) -> Self {
        self.namespace = ns;
        self
    }

    pub fn labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    /// Narrow the watch to a single object by name.
    pub fn object(mut self, name: &str) -> Self {
        self.field_selector = Some(format!("metadata.name={}", name));
        self
    }

    fn config(&self) -> watcher::Config {
        let mut cfg = watcher::Config::default();
        if let Some(f) = &self.field_selector {
            cfg = cfg.fields(f);
        }
        if let Some(l) = &self.label_selector {
            cfg = cfg.labels(l);
        }
        cfg
    }
}

pub fn parse_gvk_key(key: &str) -> Result<GroupVersionKind> {
    let parts: Vec<_> = key.split('/').collect();
    match parts.as_slice() {
        [version, kind] if !version.is_empty() && !kind.is_empty() => Ok(GroupVersionKind { group: String::new(), version: version.to_string(), kind: kind.to_string() }),
        [group, version, kind] if !version.is_empty() && !kind.is_empty() => Ok(GroupVersionKind { group: (*group).to_string(), version: (*version).to_string(), kind: (*kind).to_string() }),
        _ => Err(anyhow!("invalid gvk key: {} (expect v1/Kind or group/v1/Kind)", key)),
    }
}

async fn find_api_resource(client: Client, gvk: &GroupVersionKind) -> Result<(ApiResource, bool)> {
    let discovery = Discovery::new(client).run().await?;
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                return Ok((ar.clone(), namespaced));
            }
        }
    }
    Err(anyhow!("GVK not found: {}/{}/{}", gvk.group, gvk.version, gvk.kind))
}

fn resource_from(obj: &DynamicObject) -> Result<Resource> {
    let raw = serde_json::to_value(obj).context("serializing DynamicObject")?;
    Ok(Resource::new(raw))
}

/// Run list+watch until the stream ends or `shutdown` fires.
///
/// Every relist is published as `Connect`, one `Added` per object, then
/// `Listed`. Publishing waits for slow subscribers, which in turn holds back
/// polling of the watch stream.
/// Stream errors become `Error` + `Disconnect` + `Reconnect { attempt, delay }`
/// and the next poll happens after the backoff delay.
pub async fn run_watch(
    client: Client,
    target: WatchTarget,
    settings: &Settings,
    hub: SignalHub,
    shutdown: CancellationToken,
) -> Result<()> {
    let gvk = parse_gvk_key(&target.gvk_key)?;
    let (ar, namespaced) = find_api_resource(client.clone(), &gvk).await?;
    let api: Api<DynamicObject> = match (namespaced, target.namespace.as_deref()) {
        (true, Some(ns)) => Api::namespaced_with(client.clone(), ns, &ar),
        _ => Api::all_with(client.clone(), &ar),
    };

    let stream = watcher::watcher(api, target.config());
    futures::pin_mut!(stream);
    let mut backoff = Backoff::new(settings.watch_backoff_initial, settings.watch_backoff_max);
    info!(gvk = %target.gvk_key, ns = ?target.namespace, fields = ?target.field_selector, "watcher started");
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(gvk = %target.gvk_key, "watcher shutdown requested");
                hub.publish(Signal::Disconnect { reason: None }).await;
                return Ok(());
            }
            next = stream.next() => next,
        };
        match next {
            Some(Ok(Event::Restarted(list))) => {
                debug!(count = list.len(), "watch restart");
                backoff.reset();
                hub.publish(Signal::Connect).await;
                for o in list.iter() {
                    hub.publish(Signal::Event(ChangeEvent::Added(resource_from(o)?))).await;
                }
                hub.publish(Signal::Listed { count: list.len() }).await;
            }
            Some(Ok(Event::Applied(o))) => {
                hub.publish(Signal::Event(ChangeEvent::Modified(resource_from(&o)?))).await;
            }
            Some(Ok(Event::Deleted(o))) => {
                hub.publish(Signal::Event(ChangeEvent::Deleted(resource_from(&o)?))).await;
            }
            Some(Err(e)) => {
                let message = e.to_string();
                hub.publish(Signal::Error { message: message.clone() }).await;
                hub.publish(Signal::Disconnect { reason: Some(message) }).await;
                let (attempt, delay) = backoff.next_delay();
                hub.publish(Signal::Reconnect { attempt, delay }).await;
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                warn!(gvk = %target.gvk_key, "watcher stream ended");
                hub.publish(Signal::Disconnect { reason: None }).await;
                return Ok(());
            }
        }
    }
}

/// Spawn [`run_watch`] on the current runtime.
pub fn spawn_watch(
    client: Client,
    target: WatchTarget,
    settings: Settings,
    hub: SignalHub,
    shutdown: CancellationToken,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move { run_watch(client, target, &settings, hub, shutdown).await })
}
