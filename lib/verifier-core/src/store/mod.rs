//! Read access to cluster state
//!
//! The verifier only ever lists and gets objects. Everything it needs goes
//! through [`ResourceStore`], so checks run unchanged against a live cluster
//! ([`KubeStore`]) or an offline dump ([`SnapshotStore`]).

mod live;
mod snapshot;

pub use live::KubeStore;
pub use snapshot::SnapshotStore;

use crate::error::StoreResult;
use kube::Resource;
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Namespaced Kubernetes object the store can return
pub trait StoreResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + DeserializeOwned
    + Serialize
    + Clone
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<K> StoreResource for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + DeserializeOwned
        + Serialize
        + Clone
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// Eventually consistent read interface over cluster resources
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// List objects of kind `K`, across all namespaces when `namespace` is
    /// `None`, optionally filtered by an equality label selector
    async fn list<K: StoreResource>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> StoreResult<Vec<K>>;

    /// Get one object of kind `K` by namespace and name
    async fn get<K: StoreResource>(&self, namespace: &str, name: &str) -> StoreResult<K>;

    /// Git version reported by the API server, e.g. `v1.29.4`
    async fn server_version(&self) -> StoreResult<String>;
}

/// Store selected per cluster at runtime
pub enum ClusterStore {
    Kube(KubeStore),
    Snapshot(SnapshotStore),
}

#[async_trait]
impl ResourceStore for ClusterStore {
    async fn list<K: StoreResource>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> StoreResult<Vec<K>> {
        match self {
            ClusterStore::Kube(store) => store.list(namespace, label_selector).await,
            ClusterStore::Snapshot(store) => store.list(namespace, label_selector).await,
        }
    }

    async fn get<K: StoreResource>(&self, namespace: &str, name: &str) -> StoreResult<K> {
        match self {
            ClusterStore::Kube(store) => store.get(namespace, name).await,
            ClusterStore::Snapshot(store) => store.get(namespace, name).await,
        }
    }

    async fn server_version(&self) -> StoreResult<String> {
        match self {
            ClusterStore::Kube(store) => store.server_version().await,
            ClusterStore::Snapshot(store) => store.server_version().await,
        }
    }
}
