use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// ClusterGlobalEgressIP - the cluster-wide pool of global IPs used as
/// source addresses for egress traffic. Only the default instance is
/// supported.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "submariner.io",
    version = "v1",
    kind = "ClusterGlobalEgressIP",
    plural = "clusterglobalegressips",
    namespaced,
    derive = "Default",
    status = "GlobalEgressIPStatus",
)]
pub struct ClusterGlobalEgressIPSpec {
    /// Number of global IPs requested; unset leaves the size to the controller
    #[serde(default, rename = "numberOfIPs", skip_serializing_if = "Option::is_none")]
    pub number_of_ips: Option<i32>,
}

/// GlobalEgressIP - a pool of global IPs for the pods of one namespace,
/// optionally narrowed by a pod selector
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "submariner.io",
    version = "v1",
    kind = "GlobalEgressIP",
    plural = "globalegressips",
    namespaced,
    derive = "Default",
    status = "GlobalEgressIPStatus",
)]
pub struct GlobalEgressIPSpec {
    /// Number of global IPs requested
    #[serde(default, rename = "numberOfIPs", skip_serializing_if = "Option::is_none")]
    pub number_of_ips: Option<i32>,

    /// Pods the pool applies to (match labels only)
    #[serde(default, rename = "podSelector", skip_serializing_if = "Option::is_none")]
    pub pod_selector: Option<PodSelector>,
}

/// Pod selector for a GlobalEgressIP
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PodSelector {
    #[serde(default)]
    pub match_labels: std::collections::BTreeMap<String, String>,
}

/// Allocation status shared by both egress IP kinds
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GlobalEgressIPStatus {
    /// Conditions set by the Globalnet controller
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Global IPs allocated to this pool
    #[serde(default, rename = "allocatedIPs")]
    pub allocated_ips: Vec<String>,
}

/// Common view over the two egress pool kinds
pub trait EgressPool {
    fn requested_ips(&self) -> Option<i32>;
    fn pool_status(&self) -> Option<&GlobalEgressIPStatus>;

    fn allocated_ips(&self) -> &[String] {
        self.pool_status()
            .map(|s| s.allocated_ips.as_slice())
            .unwrap_or_default()
    }

    fn conditions(&self) -> &[Condition] {
        self.pool_status()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}

impl EgressPool for ClusterGlobalEgressIP {
    fn requested_ips(&self) -> Option<i32> {
        self.spec.number_of_ips
    }

    fn pool_status(&self) -> Option<&GlobalEgressIPStatus> {
        self.status.as_ref()
    }
}

impl EgressPool for GlobalEgressIP {
    fn requested_ips(&self) -> Option<i32> {
        self.spec.number_of_ips
    }

    fn pool_status(&self) -> Option<&GlobalEgressIPStatus> {
        self.status.as_ref()
    }
}
