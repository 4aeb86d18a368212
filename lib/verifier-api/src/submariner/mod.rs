//! Bindings to the Submariner CRDs
//!
//! This module provides type-safe Rust bindings to the Submariner
//! custom resources whose combined state the verifier cross-checks:
//! gateway endpoints, the install resource and the Globalnet IP
//! allocation resources.

pub mod endpoint;
pub mod global_egress_ip;
pub mod global_ingress_ip;
pub mod install;

pub use endpoint::Endpoint;
pub use global_egress_ip::{ClusterGlobalEgressIP, EgressPool, GlobalEgressIP};
pub use global_ingress_ip::GlobalIngressIP;
pub use install::Submariner;

/// Default name of the cluster-wide egress IP pool
pub const CLUSTER_GLOBAL_EGRESS_IP_NAME: &str = "cluster-egress.submariner.io";

/// Condition type set by the Globalnet controller once IPs are allocated
pub const GLOBAL_EGRESS_IP_ALLOCATED: &str = "Allocated";
