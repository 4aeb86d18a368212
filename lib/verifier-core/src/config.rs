//! Audit configuration
//!
//! Everything the audit needs is carried in [`AuditConfig`] and handed to
//! the [`Auditor`](crate::audit::Auditor); checks never read the process
//! environment.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::version::KubernetesVersion;
use verifier_api::submariner::CLUSTER_GLOBAL_EGRESS_IP_NAME;

/// How an egress pool without a requested size is judged
///
/// The two pool kinds have historically disagreed on whether an unset size
/// is valid, so the choice is made per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnsetPoolSize {
    /// An unset size never matches the allocation
    #[default]
    Reject,
    /// An unset size means unbounded and accepts any allocation
    Unbounded,
}

/// Unset-size policy for each egress pool kind
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSizePolicy {
    /// ClusterGlobalEgressIP singleton
    #[serde(default)]
    pub cluster_pool: UnsetPoolSize,

    /// Namespaced GlobalEgressIP pools
    #[serde(default)]
    pub selector_pools: UnsetPoolSize,
}

/// One cluster taking part in the audit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Name used in the report
    pub name: String,

    /// Kubeconfig context; the current context is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Offline dump to audit instead of a live cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

/// Audit configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditConfig {
    /// Clusters to audit, in report order
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,

    /// Well-known name of the cluster egress pool singleton
    #[serde(default = "default_cluster_egress_ip_name")]
    pub cluster_egress_ip_name: String,

    /// Unset pool size handling
    #[serde(default)]
    pub pool_sizes: PoolSizePolicy,

    /// Namespace holding the Endpoints when the Submariner resource does not say
    #[serde(default = "default_submariner_namespace")]
    pub submariner_namespace: String,

    /// Oldest Kubernetes release accepted by the version check
    #[serde(default)]
    pub min_kubernetes_version: KubernetesVersion,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            cluster_egress_ip_name: default_cluster_egress_ip_name(),
            pool_sizes: PoolSizePolicy::default(),
            submariner_namespace: default_submariner_namespace(),
            min_kubernetes_version: KubernetesVersion::default(),
        }
    }
}

impl AuditConfig {
    /// Parse a YAML configuration document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: AuditConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.clusters.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "at least one cluster must be configured".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for cluster in &self.clusters {
            if cluster.name.is_empty() {
                return Err(CoreError::InvalidConfiguration(
                    "cluster name must not be empty".to_string(),
                ));
            }
            if !names.insert(cluster.name.as_str()) {
                return Err(CoreError::InvalidConfiguration(format!(
                    "cluster {:?} is configured more than once",
                    cluster.name
                )));
            }
            if cluster.context.is_some() && cluster.snapshot.is_some() {
                return Err(CoreError::InvalidConfiguration(format!(
                    "cluster {:?} sets both a context and a snapshot",
                    cluster.name
                )));
            }
        }

        if self.cluster_egress_ip_name.is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "clusterEgressIpName must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_cluster_egress_ip_name() -> String {
    CLUSTER_GLOBAL_EGRESS_IP_NAME.to_string()
}

fn default_submariner_namespace() -> String {
    "submariner-operator".to_string()
}
