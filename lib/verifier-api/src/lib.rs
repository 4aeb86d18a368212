//! Typed bindings for the multi-cluster networking resources the verifier audits
//!
//! This library defines the custom resources read by the globalnet verifier:
//! - Endpoint: a cluster gateway and the subnets it advertises
//! - Submariner: the per-cluster install resource (Globalnet CIDR, namespace)
//! - ClusterGlobalEgressIP / GlobalEgressIP: egress IP pool requests
//! - GlobalIngressIP: the global IP allocated for an exported service
//! - ServiceExport: a service exported to the cluster set

pub mod condition;
pub mod multicluster;
pub mod relation;
pub mod submariner;

pub use condition::Condition;
pub use multicluster::ServiceExport;
pub use relation::ExportedServiceRef;
pub use submariner::{
    ClusterGlobalEgressIP, Endpoint, GlobalEgressIP, GlobalIngressIP, Submariner,
};
