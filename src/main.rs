// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use coredns_operator::{
    admin::{self, AdminState},
    catalog::Catalog,
    cluster::KubeClusterClient,
    config::FileConfigSource,
    constants::{
        DEFAULT_ADMIN_ADDR, DEFAULT_APP_NAME, DEFAULT_CONFIG_POLL_INTERVAL_SECS,
        DEFAULT_METRICS_ADDR, DEFAULT_UPDATE_STATUS_INTERVAL_SECS, EVENT_CHANNEL_CAPACITY, FIELD_MANAGER,
        LEASE_DURATION_SECS, LEASE_GRACE_SECS, OPERATOR_NAME,
    },
    context::{Context, OperatorIdentity},
    events::{ActionName, ActionRequest, ChannelEventSource, EventKind},
    publisher::ConfigMapPublisher,
    reconcilers::{actions::run_action, Reconciler},
    runtime::{self, EventLoop},
    state::ConfigMapStateStore,
};
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};
use kube_lease_manager::LeaseManagerBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Reconciliation controller for CoreDNS on Kubernetes.
#[derive(Debug, Parser)]
#[command(name = "coredns-operator", version, about)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct Settings {
    /// Desired-state configuration file (YAML mapping of options)
    #[arg(long, global = true, env = "COREDNS_OPERATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Operating namespace of this controller
    #[arg(long, global = true, env = "POD_NAMESPACE", default_value = "default")]
    namespace: String,

    #[arg(long, global = true, default_value = DEFAULT_APP_NAME)]
    app_name: String,

    /// Instance identifier; defaults to the UID of the operating namespace
    #[arg(long, global = true)]
    instance_id: Option<String>,

    /// Seconds between periodic update-status events
    #[arg(long, default_value_t = DEFAULT_UPDATE_STATUS_INTERVAL_SECS)]
    update_status_interval: u64,

    /// Seconds between configuration file checks
    #[arg(long, default_value_t = DEFAULT_CONFIG_POLL_INTERVAL_SECS)]
    config_poll_interval: u64,

    /// Address serving `/metrics` and `/healthz`
    #[arg(long, default_value = DEFAULT_METRICS_ADDR)]
    metrics_addr: SocketAddr,

    /// Address serving the event and action routes
    #[arg(long, default_value = DEFAULT_ADMIN_ADDR)]
    admin_addr: SocketAddr,

    /// Act as primary unconditionally
    #[arg(long)]
    no_leader_election: bool,

    #[arg(long)]
    lease_name: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the controller (default)
    Run,
    /// List bundled release versions
    ListVersions,
    /// List desired and owned resources
    ListResources(ActionArgs),
    /// Delete owned resources that are no longer desired
    ScrubResources(ActionArgs),
    /// Create desired resources that are missing
    SyncResources(ActionArgs),
}

#[derive(Debug, Args)]
struct ActionArgs {
    /// Manifest name substring
    #[arg(long)]
    manifest: Option<String>,

    /// Whitespace-separated resource kind substrings
    #[arg(long)]
    resources: Option<String>,
}

impl Command {
    fn action(&self) -> Option<ActionRequest> {
        let (name, args) = match self {
            Command::Run => return None,
            Command::ListVersions => return Some(ActionRequest::new(ActionName::ListVersions)),
            Command::ListResources(args) => (ActionName::ListResources, args),
            Command::ScrubResources(args) => (ActionName::ScrubResources, args),
            Command::SyncResources(args) => (ActionName::SyncResources, args),
        };
        Some(ActionRequest::new(name).with_filters(args.manifest.clone(), args.resources.clone()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name(OPERATOR_NAME)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn init_tracing() {
    // Respects RUST_LOG (default info) and RUST_LOG_FORMAT=json
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("TLS crypto provider already installed");
    }

    info!(namespace = %cli.settings.namespace, "Starting CoreDNS operator");

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let context = build_context(&cli.settings, client.clone()).await?;

    match cli.command.as_ref().and_then(Command::action) {
        Some(request) => run_cli_action(&context, &request).await,
        None => run_controller(cli.settings, client, context).await,
    }
}

async fn build_context(settings: &Settings, client: Client) -> Result<Arc<Context>> {
    let instance_id = match &settings.instance_id {
        Some(id) => id.clone(),
        None => namespace_uid(client.clone(), &settings.namespace).await?,
    };
    let identity = OperatorIdentity::new(&settings.app_name, &settings.namespace, &instance_id);
    debug!(instance = %identity.short_id(), "Resolved controller identity");

    let cluster = Arc::new(KubeClusterClient::new(client));
    Ok(Arc::new(Context {
        client: cluster.clone(),
        store: Arc::new(ConfigMapStateStore::new(
            cluster.clone(),
            &settings.app_name,
            &settings.namespace,
        )),
        publisher: Arc::new(ConfigMapPublisher::new(
            cluster,
            &settings.app_name,
            &settings.namespace,
        )),
        config: Arc::new(FileConfigSource::new(settings.config.clone())),
        catalog: Arc::new(Catalog::bundled()),
        identity,
    }))
}

async fn namespace_uid(client: Client, namespace: &str) -> Result<String> {
    let api: Api<Namespace> = Api::all(client);
    let ns = api
        .get(namespace)
        .await
        .with_context(|| format!("Failed to read namespace {namespace}"))?;
    ns.metadata
        .uid
        .with_context(|| format!("Namespace {namespace} has no UID"))
}

async fn run_cli_action(context: &Context, request: &ActionRequest) -> Result<()> {
    match run_action(context, request, true).await {
        Ok(result) => {
            print!("{}", serde_yaml::to_string(&result)?);
            Ok(())
        }
        Err(message) => anyhow::bail!(message),
    }
}

async fn leadership(
    settings: &Settings,
    client: Client,
) -> Result<(watch::Receiver<bool>, Option<watch::Sender<bool>>)> {
    if settings.no_leader_election {
        info!("Leader election disabled, running as primary");
        let (tx, rx) = watch::channel(true);
        return Ok((rx, Some(tx)));
    }

    let lease_name = settings
        .lease_name
        .clone()
        .unwrap_or_else(|| format!("{}-{OPERATOR_NAME}", settings.app_name));
    let holder = std::env::var("HOSTNAME").unwrap_or_else(|_| OPERATOR_NAME.to_string());
    let manager = LeaseManagerBuilder::new(client, &lease_name)
        .with_namespace(&settings.namespace)
        .with_identity(&holder)
        .with_field_manager(FIELD_MANAGER)
        .with_duration(LEASE_DURATION_SECS)
        .with_grace(LEASE_GRACE_SECS)
        .build()
        .await
        .context("Failed to create lease manager")?;

    info!(lease = %lease_name, holder = %holder, "Leader election enabled");
    let (rx, task) = manager.watch().await;
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(_)) => debug!("Lease manager stopped"),
            Ok(Err(e)) => error!(error = %e, "Lease manager failed"),
            Err(e) => error!(error = %e, "Lease manager task panicked"),
        }
    });
    Ok((rx, None))
}

async fn run_controller(settings: Settings, client: Client, context: Arc<Context>) -> Result<()> {
    let (sender, source) = ChannelEventSource::channel(EVENT_CHANNEL_CAPACITY);
    let (leader_rx, _static_leader) = leadership(&settings, client.clone()).await?;

    let mut producers = vec![
        runtime::spawn_update_status_timer(
            sender.clone(),
            Duration::from_secs(settings.update_status_interval),
        ),
        runtime::spawn_leadership_forwarder(sender.clone(), leader_rx.clone()),
        runtime::spawn_consumer_watcher(
            sender.clone(),
            client,
            &settings.namespace,
            &settings.app_name,
        ),
        runtime::spawn_sighup(sender.clone()).context("Failed to install SIGHUP handler")?,
    ];
    if let Some(path) = settings.config.clone() {
        producers.push(runtime::spawn_config_poller(
            sender.clone(),
            path,
            Duration::from_secs(settings.config_poll_interval),
        ));
    }

    let admin_state = AdminState {
        sender: sender.clone(),
    };
    let metrics_listener = TcpListener::bind(settings.metrics_addr)
        .await
        .with_context(|| format!("Failed to bind metrics address {}", settings.metrics_addr))?;
    let control_listener = TcpListener::bind(settings.admin_addr)
        .await
        .with_context(|| format!("Failed to bind admin address {}", settings.admin_addr))?;
    if !settings.admin_addr.ip().is_loopback() {
        warn!(addr = %settings.admin_addr, "Admin control routes are reachable from outside the pod");
    }

    let (stop_admin, admin_stopped) = watch::channel(false);
    let admin_tasks = [
        (metrics_listener, admin::metrics_router(admin_state.clone())),
        (control_listener, admin::control_router(admin_state)),
    ]
    .map(|(listener, router)| {
        let mut stopped = admin_stopped.clone();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = stopped.changed().await;
            };
            if let Err(e) = admin::serve(listener, router, shutdown).await {
                error!(error = %e, "Admin server failed");
            }
        })
    });

    sender
        .send(EventKind::Install)
        .await
        .context("Failed to queue install event")?;

    let reconciler = Reconciler::new(context).await;
    EventLoop::new(reconciler, source, sender, leader_rx)
        .run(runtime::shutdown_signal())
        .await;

    for producer in producers {
        producer.abort();
    }
    if stop_admin.send(true).is_err() {
        warn!("Admin servers already stopped");
    }
    for task in admin_tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Admin server task did not stop cleanly");
        }
    }
    info!("CoreDNS operator stopped");
    Ok(())
}
