//! Bindings to the Kubernetes Multi-Cluster Services API

pub mod service_export;

pub use service_export::ServiceExport;

/// API group for MCS resources
pub const API_GROUP: &str = "multicluster.x-k8s.io";
