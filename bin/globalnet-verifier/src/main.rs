use anyhow::{Context, Result};
use futures::future::try_join_all;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use verifier_core::{AuditConfig, Auditor, ClusterConfig, ClusterStore, ClusterTarget, KubeStore, SnapshotStore};

mod render;

use render::OutputFormat;

const DEFAULT_CONFIG_PATH: &str = "verifier.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::var("VERIFIER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let format = OutputFormat::from_env(std::env::var("VERIFIER_OUTPUT").ok().as_deref())?;

    info!("Starting globalnet-verifier with config {}", config_path);
    let config = AuditConfig::load(&config_path)
        .await
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    let clusters = try_join_all(config.clusters.iter().map(connect)).await?;

    let auditor = Auditor::new(config);
    let cancel = auditor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping audit before the next stage");
            cancel.cancel();
        }
    });

    let report = auditor.run(clusters).await;
    render::print(&report, format)?;

    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Build the store for one configured cluster
async fn connect(cluster: &ClusterConfig) -> Result<ClusterTarget<ClusterStore>> {
    let store = match (&cluster.snapshot, &cluster.context) {
        (Some(path), _) => {
            info!("Cluster {} reads snapshot {}", cluster.name, path.display());
            ClusterStore::Snapshot(SnapshotStore::from_file(path).await?)
        }
        (None, Some(context)) => {
            info!("Cluster {} uses kubeconfig context {}", cluster.name, context);
            ClusterStore::Kube(KubeStore::for_context(context).await?)
        }
        (None, None) => {
            info!("Cluster {} uses the default kubeconfig", cluster.name);
            ClusterStore::Kube(KubeStore::try_default().await?)
        }
    };
    Ok(ClusterTarget::new(cluster.name.clone(), store))
}
