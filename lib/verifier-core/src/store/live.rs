//! Kubernetes API backed store

use super::{ResourceStore, StoreResource};
use crate::error::{Result, StoreError, StoreResult};
use async_trait::async_trait;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::debug;

/// KubeStore wraps a Kubernetes client for read-only access
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Create a store from the default kubeconfig or in-cluster config
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// Create a store for a named kubeconfig context
    pub async fn for_context(context: &str) -> Result<Self> {
        let kubeconfig = Kubeconfig::read()?;
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
        let client = Client::try_from(config)?;
        Ok(Self { client })
    }

    fn api<K: StoreResource>(&self, namespace: Option<&str>) -> Api<K> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

fn map_error<K: StoreResource>(err: kube::Error, namespace: &str, name: &str) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::SerdeError(e) => StoreError::Decode {
            kind: K::kind(&()).to_string(),
            message: e.to_string(),
        },
        e => StoreError::Api(e.to_string()),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn list<K: StoreResource>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> StoreResult<Vec<K>> {
        let api = self.api::<K>(namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let list = api
            .list(&params)
            .await
            .map_err(|e| map_error::<K>(e, namespace.unwrap_or_default(), ""))?;

        debug!(
            "Listed {} {} resources (namespace: {}, selector: {})",
            list.items.len(),
            K::kind(&()),
            namespace.unwrap_or("*"),
            label_selector.unwrap_or("-")
        );
        Ok(list.items)
    }

    async fn get<K: StoreResource>(&self, namespace: &str, name: &str) -> StoreResult<K> {
        debug!("Getting {} {}/{}", K::kind(&()), namespace, name);
        self.api::<K>(Some(namespace))
            .get(name)
            .await
            .map_err(|e| map_error::<K>(e, namespace, name))
    }

    async fn server_version(&self) -> StoreResult<String> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| StoreError::Api(e.to_string()))?;
        debug!("API server reports version {}", info.git_version);
        Ok(info.git_version)
    }
}
