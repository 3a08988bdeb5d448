use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vigil_core::{KeyPath, Resource, Settings};
use vigil_ready::predicates::{last_operation_succeeded, phase_is};
use vigil_ready::{Readiness, ReadinessWatcher};
use vigil_view::columns::{raw_value, shoot_columns};
use vigil_view::{
    spawn_view, Column, FilterState, NamedFilter, SortState, TicketBoard, ViewMaintainer, ViewScope, ViewSnapshot,
};
use vigil_watch::transport::{spawn_watch, WatchTarget};
use vigil_watch::{Normalizer, SignalHub};

const SHOOTS: &str = "core.gardener.cloud/v1beta1/Shoot";

#[derive(Parser, Debug)]
#[command(name = "vigilctl", version, about = "Live mirror of Gardener resources")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Namespace to watch (project namespace, e.g. garden-dev)
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a kind and print the derived view on every change
    Mirror {
        /// GVK key
        #[arg(default_value = SHOOTS)]
        gvk: String,
        /// Watch every namespace
        #[arg(long = "all-namespaces", short = 'A', action = ArgAction::SetTrue)]
        all_namespaces: bool,
        /// Only clusters whose status label is not healthy
        #[arg(long = "only-issues", action = ArgAction::SetTrue)]
        only_issues: bool,
        /// Sort column, e.g. name, lastOperation, k8sVersion, readiness
        #[arg(long = "sort")]
        sort: Option<String>,
        #[arg(long = "desc", action = ArgAction::SetTrue)]
        desc: bool,
        /// Space-separated search tokens
        #[arg(long = "search")]
        search: Option<String>,
        /// Named filter to enable (repeatable); applies with -A --only-issues
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Print the first complete listing and exit
        #[arg(long = "once", action = ArgAction::SetTrue)]
        once: bool,
    },
    /// Wait until one object becomes ready
    Wait {
        /// GVK key, e.g. core.gardener.cloud/v1beta1/Project
        gvk: String,
        name: String,
        /// Wait for a succeeded last operation instead of phase Ready
        #[arg(long = "last-operation", action = ArgAction::SetTrue)]
        last_operation: bool,
        /// Overrides VIGIL_READY_TIMEOUT_MS
        #[arg(long = "timeout-ms")]
        timeout_ms: Option<u64>,
    },
}

fn init_tracing() {
    let env = std::env::var("VIGIL_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("VIGIL_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid VIGIL_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Mirror { gvk, all_namespaces, only_issues, sort, desc, search, filters, once } => {
            let scope = ViewScope { all_namespaces, only_issues };
            let mut filter_state = FilterState::default();
            for f in &filters {
                filter_state.set(NamedFilter::from_str(f).map_err(|e| anyhow!(e))?, true);
            }
            let sort = sort.map(|s| SortState { sort_by: Column::from_str(&s).unwrap_or_else(|never| match never {}), sort_desc: desc });
            let args = MirrorArgs { gvk, namespace: cli.namespace, scope, sort, search, filters: filter_state, once };
            mirror(args, &settings, cli.output).await
        }
        Commands::Wait { gvk, name, last_operation, timeout_ms } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(settings.ready_timeout);
            match wait(&gvk, cli.namespace, &name, last_operation, timeout, &settings).await {
                Ok(obj) => {
                    match cli.output {
                        Output::Human => println!("{} ready", obj.display_name()),
                        Output::Json => println!("{}", serde_json::to_string_pretty(&obj)?),
                    }
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "wait failed");
                    Err(e)
                }
            }
        }
    }
}

struct MirrorArgs {
    gvk: String,
    namespace: Option<String>,
    scope: ViewScope,
    sort: Option<SortState>,
    search: Option<String>,
    filters: FilterState,
    once: bool,
}

async fn mirror(args: MirrorArgs, settings: &Settings, output: Output) -> Result<()> {
    let client = Client::try_default().await.context("building kube client")?;
    let hub = SignalHub::new(settings.hub_capacity);
    let namespace = if args.scope.all_namespaces { None } else { args.namespace.clone() };
    let mut target = WatchTarget::new(args.gvk.clone()).namespace(namespace);
    if args.scope.issues_overview() {
        target = target.labels("shoot.gardener.cloud/status!=healthy");
    }
    info!(gvk = %args.gvk, ns = ?target.namespace, scope = ?args.scope, "mirror invoked");

    let mut view = ViewMaintainer::new(args.scope)
        .with_tickets(Arc::new(TicketBoard::new()), settings.hide_ticket_labels.clone());
    view.set_sort(args.sort);
    if let Some(s) = &args.search {
        view.set_search(s);
    }
    view.set_filters(args.filters);
    let (handle, view_task) = spawn_view(view, Normalizer::new(args.gvk.clone()), hub.subscribe());

    let shutdown = CancellationToken::new();
    let watcher = spawn_watch(client, target, settings.clone(), hub, shutdown.clone());
    let mut epochs = handle.subscribe_epoch();
    let mut last = *epochs.borrow();
    loop {
        tokio::select! {
            changed = epochs.changed() => {
                if changed.is_err() {
                    warn!("view stopped");
                    break;
                }
                let epoch = *epochs.borrow_and_update();
                if epoch == last {
                    continue;
                }
                last = epoch;
                let snap = handle.current();
                if args.once && !snap.synced {
                    continue;
                }
                render(&snap, args.scope.all_namespaces, output)?;
                if args.once {
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received; shutting down mirror");
                break;
            }
        }
    }
    shutdown.cancel();
    if let Err(e) = watcher.await.context("joining watcher")? {
        error!(error = ?e, "watcher failed");
    }
    if let Ok(Err(e)) = view_task.await {
        error!(error = %e, "view failed");
    }
    Ok(())
}

fn render(snap: &ViewSnapshot, all_namespaces: bool, output: Output) -> Result<()> {
    match output {
        Output::Json => println!("{}", serde_json::to_string(snap)?),
        Output::Human => {
            let cols = shoot_columns(all_namespaces);
            let header: Vec<String> = cols.iter().map(|c| format!("{:<w$}", c.label, w = c.width)).collect();
            println!("# epoch {} ({} of {})", snap.epoch, snap.items.len(), snap.total);
            println!("{}", header.join(" "));
            let tickets = vigil_view::NoTickets;
            for item in &snap.items {
                let row: Vec<String> = cols
                    .iter()
                    .map(|c| {
                        let v = raw_value(&c.column, item, &tickets).unwrap_or_else(|| "-".to_string());
                        format!("{:<w$}", truncate(&v, c.width), w = c.width)
                    })
                    .collect();
                println!("{}", row.join(" "));
            }
        }
    }
    Ok(())
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

async fn wait(
    gvk: &str,
    namespace: Option<String>,
    name: &str,
    last_operation: bool,
    timeout: Duration,
    settings: &Settings,
) -> Result<Resource> {
    let client = Client::try_default().await.context("building kube client")?;
    let hub = SignalHub::new(settings.hub_capacity);
    let watcher = ReadinessWatcher::new(hub.clone(), KeyPath::name(), Normalizer::new(gvk.to_string()));
    let predicate: Box<dyn Fn(&Resource) -> Readiness + Send + Sync> = if last_operation {
        Box::new(last_operation_succeeded())
    } else {
        Box::new(phase_is("Ready"))
    };
    info!(gvk, name, timeout_ms = timeout.as_millis() as u64, "wait invoked");

    // register before the transport starts so the initial listing is seen
    let pending = watcher.watch(name, predicate, timeout)?;
    let shutdown = CancellationToken::new();
    let target = WatchTarget::new(gvk).namespace(namespace).object(name);
    let transport = spawn_watch(client, target, settings.clone(), hub, shutdown.clone());
    let result = pending.wait().await;
    shutdown.cancel();
    if let Ok(Err(e)) = transport.await {
        warn!(error = ?e, "watcher failed");
    }
    Ok(result?)
}
