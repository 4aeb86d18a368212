//! Globalnet multi-cluster verification
//!
//! This library provides:
//! - Kubernetes version support checks
//! - Subnet overlap detection across the Endpoints of a cluster set
//! - Allocation consistency checks from egress pools to exported services
//! - Resource stores backed by a live cluster or an offline snapshot
//! - Multi-cluster audit orchestration and reporting

pub mod allocation;
pub mod audit;
pub mod config;
pub mod error;
pub mod overlap;
pub mod report;
pub mod store;
pub mod version;

pub use allocation::{AllocationVerifier, Stage};
pub use audit::{AuditReport, Auditor, ClusterTarget, SectionReport, CLUSTER_SET_SECTION};
pub use config::{AuditConfig, ClusterConfig, PoolSizePolicy, UnsetPoolSize};
pub use error::{CoreError, Result, StoreError, StoreResult};
pub use overlap::check_overlap;
pub use report::{Entry, Finding, Reporter, Severity, StatusLog};
pub use store::{ClusterStore, KubeStore, ResourceStore, SnapshotStore};
pub use version::{check_kubernetes_version, KubernetesVersion};
