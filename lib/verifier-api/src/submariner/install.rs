use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Submariner install resource from the operator - one per cluster,
/// records how the cluster joined the cluster set
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "submariner.io",
    version = "v1alpha1",
    kind = "Submariner",
    plural = "submariners",
    namespaced,
    derive = "Default",
)]
#[serde(rename_all = "camelCase")]
pub struct SubmarinerSpec {
    /// Cluster identifier within the cluster set
    #[serde(default, rename = "clusterID")]
    pub cluster_id: String,

    /// Global CIDR assigned to this cluster; empty when Globalnet is disabled
    #[serde(default, rename = "globalCIDR")]
    pub global_cidr: String,

    /// Namespace where the Submariner components run
    #[serde(default)]
    pub namespace: String,
}

impl Submariner {
    pub fn globalnet_enabled(&self) -> bool {
        !self.spec.global_cidr.is_empty()
    }

    /// Namespace the gateway publishes its Endpoints in: the component
    /// namespace in `spec.namespace`, else the namespace of this resource, else
    /// `fallback`
    pub fn endpoint_namespace(&self, fallback: &str) -> String {
        if !self.spec.namespace.is_empty() {
            return self.spec.namespace.clone();
        }
        self.metadata
            .namespace
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_namespace_precedence() {
        let mut install = Submariner::new("submariner", SubmarinerSpec::default());
        assert_eq!(install.endpoint_namespace("submariner-operator"), "submariner-operator");

        install.metadata.namespace = Some("operators".to_string());
        assert_eq!(install.endpoint_namespace("submariner-operator"), "operators");

        install.spec.namespace = "gateway".to_string();
        assert_eq!(install.endpoint_namespace("submariner-operator"), "gateway");
        assert!(!install.globalnet_enabled());
    }
}
