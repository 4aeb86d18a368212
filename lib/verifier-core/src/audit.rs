//! Multi-cluster audit orchestration
//!
//! One audit run:
//! 1. checks the Kubernetes version of every cluster, then looks up its
//!    Submariner install and Endpoints
//! 2. checks the union of all Endpoints for overlapping subnets, once
//! 3. verifies the Globalnet allocation chain of every Globalnet cluster
//!
//! Clusters are independent, so steps 1 and 3 run one task per cluster.

use crate::allocation::AllocationVerifier;
use crate::config::AuditConfig;
use crate::overlap::check_overlap;
use crate::report::{Entry, Finding, Reporter, Severity, StatusLog};
use crate::store::ResourceStore;
use crate::version::check_kubernetes_version;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;
use verifier_api::{Endpoint, Submariner};

/// Name of the report section holding cluster-set wide checks
pub const CLUSTER_SET_SECTION: &str = "cluster-set";

/// A cluster to audit and the store to read it through
pub struct ClusterTarget<S> {
    pub name: String,
    pub store: Arc<S>,
}

impl<S> ClusterTarget<S> {
    pub fn new(name: impl Into<String>, store: S) -> Self {
        Self {
            name: name.into(),
            store: Arc::new(store),
        }
    }
}

/// Outcome of one report section
#[derive(Clone, Debug, Serialize)]
pub struct SectionReport {
    pub name: String,
    pub passed: bool,
    pub entries: Vec<Entry>,
}

impl SectionReport {
    fn from_log(log: &StatusLog) -> Self {
        Self {
            name: log.section().to_string(),
            passed: !log.has_failures(),
            entries: log.entries(),
        }
    }
}

/// Result of a whole audit run
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sections: Vec<SectionReport>,
}

impl AuditReport {
    pub fn has_failures(&self) -> bool {
        self.sections.iter().any(|s| !s.passed)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.entries)
            .filter(|e| e.severity == severity)
            .count()
    }

    pub fn section(&self, name: &str) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Digest of the message set, independent of emission order
    pub fn fingerprint(&self) -> String {
        let mut lines: Vec<String> = self
            .sections
            .iter()
            .flat_map(|s| {
                s.entries
                    .iter()
                    .map(move |e| format!("{}\t{}\t{}", s.name, e.severity, e.message))
            })
            .collect();
        lines.sort();

        let mut hasher = Sha256::new();
        for line in &lines {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

/// What the discovery pass learned about one cluster
struct Discovery {
    install: Option<Submariner>,
    endpoints: Vec<Endpoint>,
}

/// Runs audits over a set of clusters
pub struct Auditor {
    config: Arc<AuditConfig>,
    cancel: CancellationToken,
}

impl Auditor {
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the audit before its next stage
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audit every cluster and return the report, sections in cluster order
    /// after the cluster-set section
    pub async fn run<S: ResourceStore + 'static>(&self, clusters: Vec<ClusterTarget<S>>) -> AuditReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Starting audit of {} clusters", clusters.len());

        let logs: Vec<Arc<StatusLog>> = clusters
            .iter()
            .map(|c| Arc::new(StatusLog::new(c.name.clone())))
            .collect();

        // Discovery, one task per cluster
        let handles: Vec<JoinHandle<Discovery>> = clusters
            .iter()
            .zip(&logs)
            .map(|(cluster, log)| {
                let store = cluster.store.clone();
                let log = log.clone();
                let config = self.config.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move { discover(store.as_ref(), &config, &cancel, log.as_ref()).await })
            })
            .collect();

        let mut discoveries = Vec::with_capacity(handles.len());
        for (handle, log) in handles.into_iter().zip(&logs) {
            discoveries.push(join_or_report(handle, log, "discovery").await.unwrap_or(Discovery {
                install: None,
                endpoints: Vec::new(),
            }));
        }

        // Overlap detection over the union of endpoints
        let cluster_set = StatusLog::new(CLUSTER_SET_SECTION);
        let globalnet = discoveries
            .iter()
            .filter_map(|d| d.install.as_ref())
            .any(Submariner::globalnet_enabled);
        if discoveries.iter().any(|d| d.install.is_some()) {
            if self.cancel.is_cancelled() {
                cluster_set.finding(
                    Finding::Cancelled,
                    "Audit cancelled before checking for overlapping CIDRs".to_string(),
                );
            } else {
                let endpoints = union_endpoints(&discoveries);
                check_overlap(&endpoints, globalnet, &cluster_set);
            }
        }

        // Allocation checks, one task per Globalnet cluster
        let mut handles: Vec<Option<JoinHandle<bool>>> = Vec::with_capacity(clusters.len());
        for ((cluster, log), discovery) in clusters.iter().zip(&logs).zip(&discoveries) {
            let Some(install) = &discovery.install else {
                handles.push(None);
                continue;
            };
            if !install.globalnet_enabled() {
                log.success("Globalnet is not installed - skipping".to_string());
                handles.push(None);
                continue;
            }

            let store = cluster.store.clone();
            let log = log.clone();
            let config = self.config.clone();
            let cancel = self.cancel.clone();
            handles.push(Some(tokio::spawn(async move {
                AllocationVerifier::new(store.as_ref(), &config)
                    .with_cancellation(cancel)
                    .verify(log.as_ref())
                    .await
            })));
        }

        for (handle, log) in handles.into_iter().zip(&logs) {
            if let Some(handle) = handle {
                join_or_report(handle, log, "allocation check").await;
            }
        }

        let mut sections = vec![SectionReport::from_log(&cluster_set)];
        sections.extend(logs.iter().map(|log| SectionReport::from_log(log)));

        let report = AuditReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sections,
        };
        info!(
            %run_id,
            failures = report.count(Severity::Failure),
            warnings = report.count(Severity::Warning),
            "Audit finished"
        );
        report
    }
}

/// Await a cluster task, recording a failure in its section if it panicked
async fn join_or_report<T>(handle: JoinHandle<T>, log: &StatusLog, task: &str) -> Option<T> {
    match handle.await {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Cluster {} {} task failed: {}", log.section(), task, e);
            log.failure(format!("The {} task for cluster {:?} failed: {}", task, log.section(), e));
            None
        }
    }
}

/// Check the Kubernetes version, then look up the Submariner install and the
/// Endpoints visible in one cluster
async fn discover<S: ResourceStore>(
    store: &S,
    config: &AuditConfig,
    cancel: &CancellationToken,
    reporter: &dyn Reporter,
) -> Discovery {
    let mut discovery = Discovery {
        install: None,
        endpoints: Vec::new(),
    };

    if cancel.is_cancelled() {
        reporter.finding(
            Finding::Cancelled,
            "Audit cancelled before looking up the Submariner installation".to_string(),
        );
        return discovery;
    }

    check_kubernetes_version(store, config.min_kubernetes_version, reporter).await;

    let installs: Vec<Submariner> = match store.list(None, None).await {
        Ok(installs) => installs,
        Err(e) => {
            reporter.finding(
                Finding::StoreUnavailable,
                format!("Error listing the Submariner resources: {}", e),
            );
            return discovery;
        }
    };

    let Some(install) = installs.into_iter().next() else {
        reporter.finding(
            Finding::NotInstalled,
            "Submariner is not installed - skipping".to_string(),
        );
        return discovery;
    };

    debug!(
        "Submariner installed as cluster {:?}, Globalnet CIDR {:?}",
        install.spec.cluster_id, install.spec.global_cidr
    );
    let namespace = install.endpoint_namespace(&config.submariner_namespace);
    match store.list::<Endpoint>(Some(namespace.as_str()), None).await {
        Ok(endpoints) => {
            debug!("Found {} endpoints in {}", endpoints.len(), namespace);
            discovery.endpoints = endpoints;
        }
        Err(e) => {
            reporter.finding(
                Finding::StoreUnavailable,
                format!("Error listing the Submariner endpoints: {}", e),
            );
        }
    }

    discovery.install = Some(install);
    discovery
}

/// Union of endpoints across clusters, dropping the copies every cluster
/// holds of its peers' endpoints
fn union_endpoints(discoveries: &[Discovery]) -> Vec<Endpoint> {
    let mut seen = HashSet::new();
    discoveries
        .iter()
        .flat_map(|d| d.endpoints.iter())
        .filter(|e| seen.insert(e.identity()))
        .cloned()
        .collect()
}
