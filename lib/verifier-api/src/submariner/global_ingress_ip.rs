use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// GlobalIngressIP - the global IP allocated so that an exported service
/// (or a headless service pod) is reachable from other clusters. Named
/// after the exported service it serves.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "submariner.io",
    version = "v1",
    kind = "GlobalIngressIP",
    plural = "globalingressips",
    namespaced,
    derive = "Default",
    status = "GlobalIngressIPStatus",
)]
#[serde(rename_all = "camelCase")]
pub struct GlobalIngressIPSpec {
    /// Target: "ClusterIPService" or "HeadlessServicePod"
    #[serde(default)]
    pub target: String,

    /// Service the IP is allocated for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_ref: Option<LocalObjectRef>,

    /// Pod the IP is allocated for (headless services)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_ref: Option<LocalObjectRef>,
}

/// Reference to an object in the same namespace
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct LocalObjectRef {
    pub name: String,
}

/// Status of a GlobalIngressIP
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GlobalIngressIPStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Allocated global IP; empty until the controller assigns one
    #[serde(default, rename = "allocatedIP")]
    pub allocated_ip: String,
}

impl GlobalIngressIP {
    /// Allocated IP, or an empty string when no status was written yet
    pub fn allocated_ip(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.allocated_ip.as_str())
            .unwrap_or_default()
    }
}
