use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Endpoint from the Submariner gateway - the network identity a cluster
/// advertises to the rest of the cluster set. Field names follow the
/// snake_case wire format used by the gateway.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "submariner.io",
    version = "v1",
    kind = "Endpoint",
    plural = "endpoints",
    namespaced,
    derive = "Default",
)]
pub struct EndpointSpec {
    /// Cluster that owns this endpoint
    pub cluster_id: String,

    /// Name of the cable (tunnel) this endpoint terminates
    #[serde(default)]
    pub cable_name: String,

    /// Hostname of the gateway node
    #[serde(default)]
    pub hostname: String,

    /// Subnets (CIDRs) routed through this endpoint
    #[serde(default)]
    pub subnets: Vec<String>,

    /// Private IP of the gateway node
    #[serde(default)]
    pub private_ip: String,

    /// Public IP of the gateway node
    #[serde(default)]
    pub public_ip: String,

    /// Cable driver in use
    #[serde(default)]
    pub backend: String,
}

impl Endpoint {
    /// Identity of an endpoint across synced copies in different clusters
    pub fn identity(&self) -> (String, String) {
        (self.spec.cluster_id.clone(), self.spec.cable_name.clone())
    }
}
