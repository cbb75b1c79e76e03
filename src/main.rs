use futures::StreamExt;
use group_sync_operator::controller::{reconcile, watch_groupsyncs, Context, ReconcileError};
use group_sync_operator::crd::groupsync::GroupSync;
use group_sync_operator::server::{
    create_metrics, run_health_server, shutdown_channel, wait_for_signal, ReadinessState,
};
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Delay before retrying a GroupSync whose reconcile failed
const ERROR_REQUEUE: Duration = Duration::from_secs(10);

/// Runtime settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
struct ControllerConfig {
    /// Port of the health and metrics server (`GROUP_SYNC_HEALTH_PORT`)
    health_port: u16,
    /// Only watch GroupSyncs in this namespace (`GROUP_SYNC_WATCH_NAMESPACE`)
    watch_namespace: Option<String>,
    /// Reporting component of published events (`GROUP_SYNC_CONTROLLER_NAME`)
    controller_name: String,
}

impl ControllerConfig {
    const DEFAULT_HEALTH_PORT: u16 = 8080;
    const DEFAULT_CONTROLLER_NAME: &'static str = "group-sync-operator";

    fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let health_port = match set("GROUP_SYNC_HEALTH_PORT") {
            Some(port) => port.trim().parse().map_err(|e| {
                anyhow::anyhow!("Invalid GROUP_SYNC_HEALTH_PORT '{}': {}", port, e)
            })?,
            None => Self::DEFAULT_HEALTH_PORT,
        };

        Ok(ControllerConfig {
            health_port,
            watch_namespace: set("GROUP_SYNC_WATCH_NAMESPACE"),
            controller_name: set("GROUP_SYNC_CONTROLLER_NAME")
                .unwrap_or_else(|| Self::DEFAULT_CONTROLLER_NAME.to_string()),
        })
    }
}

/// Error policy for the controller
///
/// The reconciler has already published the event and error condition; this
/// only schedules the retry.
fn error_policy(groupsync: Arc<GroupSync>, error: &ReconcileError, _ctx: Arc<Context>) -> Action {
    warn!(
        groupsync = ?groupsync.name_any(),
        error = %error,
        "Reconcile error (will retry)"
    );
    Action::requeue(ERROR_REQUEUE)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // kube and reqwest both use rustls; pick ring before either builds a client
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ControllerConfig::from_env()?;
    info!(?config, "Starting group sync controller");

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let readiness = ReadinessState::new();
    let metrics = create_metrics()?;

    let client = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };
    info!("Connected to Kubernetes cluster");

    let health_handle = {
        let readiness = readiness.clone();
        let metrics = metrics.clone();
        let signal = shutdown_signal.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(port, readiness, metrics, signal).await {
                error!(error = %e, "Health server failed");
            }
        })
    };

    let groupsyncs: Api<GroupSync> = match &config.watch_namespace {
        Some(namespace) => {
            info!(namespace = %namespace, "Watching GroupSyncs in a single namespace");
            Api::namespaced(client.clone(), namespace)
        }
        None => Api::all(client.clone()),
    };

    let ctx = Arc::new(Context::new(
        client,
        &config.controller_name,
        Some(metrics),
    ));

    readiness.set_ready();
    info!("Controller ready, starting reconciliation loop");

    let mut controller_shutdown = shutdown_signal.clone();
    let (store, stream) = watch_groupsyncs(groupsyncs, watcher::Config::default());
    let controller = Controller::for_stream(stream, store)
        .graceful_shutdown_on(async move { controller_shutdown.wait().await })
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Ok((obj, action)) = res {
                debug!(groupsync = %obj, ?action, "Reconciled");
            }
        });

    tokio::select! {
        _ = controller => {
            info!("Controller stream ended");
        }
        signal = wait_for_signal() => {
            match signal {
                Ok(name) => info!(signal = name, "Initiating graceful shutdown"),
                Err(e) => error!(error = %e, "Signal handling failed, shutting down"),
            }
            readiness.set_not_ready();
        }
    }

    shutdown_controller.shutdown();
    if let Err(e) = health_handle.await {
        warn!(error = %e, "Health server task did not finish cleanly");
    }

    info!("Group sync controller shut down");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
