//! In-memory store over a dump of cluster objects
//!
//! Objects are kept as raw JSON keyed by `apiVersion/kind` and decoded on
//! read, the same way the API server hands them to a client. A dump may also
//! carry the API server's `/version` response, either bare or as the
//! `serverVersion` field of `kubectl version -o json`.

use super::{ResourceStore, StoreResource};
use crate::error::{CoreError, Result, StoreError, StoreResult};
use async_trait::async_trait;
use kube::ResourceExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Contents {
    // Map of "apiVersion/kind" to raw objects, in insertion order
    objects: HashMap<String, Vec<Value>>,
    // gitVersion of the dumped API server
    server_version: Option<String>,
}

#[derive(Default)]
struct Failures {
    // Kinds whose every read fails with the given message
    reads: HashMap<String, String>,
    // Kinds whose list reads fail; gets still succeed
    lists: HashMap<String, String>,
}

/// SnapshotStore serves list/get reads from a fixed set of objects
pub struct SnapshotStore {
    contents: Arc<RwLock<Contents>>,
    failures: Arc<RwLock<Failures>>,
}

fn type_key(api_version: &str, kind: &str) -> String {
    format!("{}/{}", api_version, kind)
}

fn key_of<K: StoreResource>() -> String {
    type_key(&K::api_version(&()), &K::kind(&()))
}

/// Append `value` to `contents`, flattening `List` documents
fn add_value(contents: &mut Contents, value: Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => {
            for item in items {
                add_value(contents, item)?;
            }
            Ok(())
        }
        Value::Object(ref map) => {
            if let Some(Value::Array(items)) = map.get("items") {
                for item in items.clone() {
                    add_value(contents, item)?;
                }
                return Ok(());
            }
            if let Some(server) = map.get("serverVersion") {
                return add_value(contents, server.clone());
            }

            let api_version = map.get("apiVersion").and_then(Value::as_str);
            let kind = map.get("kind").and_then(Value::as_str);
            let key = match (api_version, kind, map.get("gitVersion")) {
                (Some(api_version), Some(kind), _) => type_key(api_version, kind),
                (None, None, Some(Value::String(version))) => {
                    contents.server_version = Some(version.clone());
                    return Ok(());
                }
                _ => {
                    return Err(CoreError::InvalidSnapshot(
                        "object is missing apiVersion or kind".to_string(),
                    ))
                }
            };
            contents.objects.entry(key).or_default().push(value);
            Ok(())
        }
        other => Err(CoreError::InvalidSnapshot(format!(
            "expected an object, found {}",
            other
        ))),
    }
}

/// One equality-based label selector requirement
#[derive(Debug, PartialEq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
        }
    }
}

fn parse_selector(selector: &str) -> StoreResult<Vec<Requirement>> {
    let mut requirements = Vec::new();
    for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let requirement = if let Some((k, v)) = term.split_once("!=") {
            Requirement::NotEquals(k.trim().to_string(), v.trim().to_string())
        } else if let Some((k, v)) = term.split_once("==") {
            Requirement::Equals(k.trim().to_string(), v.trim().to_string())
        } else if let Some((k, v)) = term.split_once('=') {
            Requirement::Equals(k.trim().to_string(), v.trim().to_string())
        } else {
            return Err(StoreError::Api(format!(
                "unsupported label selector term {:?}",
                term
            )));
        };
        requirements.push(requirement);
    }
    Ok(requirements)
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            contents: Arc::new(RwLock::new(Contents::default())),
            failures: Arc::new(RwLock::new(Failures::default())),
        }
    }

    /// Build a store from raw objects; `List` documents and arrays are flattened
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut contents = Contents::default();
        for value in values {
            add_value(&mut contents, value)?;
        }

        Ok(Self {
            contents: Arc::new(RwLock::new(contents)),
            failures: Arc::new(RwLock::new(Failures::default())),
        })
    }

    /// Build a store from a (possibly multi-document) YAML or JSON dump
    pub fn from_yaml(text: &str) -> Result<Self> {
        let mut values = Vec::new();
        for document in serde_yaml::Deserializer::from_str(text) {
            values.push(Value::deserialize(document)?);
        }
        Self::from_values(values)
    }

    /// Load a dump from disk
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let store = Self::from_yaml(&text)?;
        debug!(
            "Loaded snapshot {} with {} objects",
            path.display(),
            store.object_count().await
        );
        Ok(store)
    }

    /// Add a typed object
    pub async fn insert<K: StoreResource>(&self, object: &K) -> Result<()> {
        let mut value = serde_json::to_value(object)?;
        if let Value::Object(map) = &mut value {
            map.insert("apiVersion".to_string(), Value::from(K::api_version(&()).to_string()));
            map.insert("kind".to_string(), Value::from(K::kind(&()).to_string()));
        }
        self.insert_value(value).await
    }

    /// Add a raw object carrying its own apiVersion and kind
    pub async fn insert_value(&self, value: Value) -> Result<()> {
        let mut contents = self.contents.write().await;
        add_value(&mut contents, value)
    }

    /// Record the API server version reported by the store
    pub async fn set_server_version(&self, version: impl Into<String>) {
        self.contents.write().await.server_version = Some(version.into());
    }

    /// Make every read of kind `K` fail with a non-NotFound error
    pub async fn fail<K: StoreResource>(&self, message: impl Into<String>) {
        let mut failures = self.failures.write().await;
        failures.reads.insert(key_of::<K>(), message.into());
    }

    /// Make list reads of kind `K` fail while gets keep succeeding
    pub async fn fail_list<K: StoreResource>(&self, message: impl Into<String>) {
        let mut failures = self.failures.write().await;
        failures.lists.insert(key_of::<K>(), message.into());
    }

    /// Total number of objects held
    pub async fn object_count(&self) -> usize {
        let contents = self.contents.read().await;
        contents.objects.values().map(Vec::len).sum()
    }

    async fn check_failure<K: StoreResource>(&self, listing: bool) -> StoreResult<()> {
        let failures = self.failures.read().await;
        let key = key_of::<K>();
        let message = failures
            .reads
            .get(&key)
            .or_else(|| listing.then(|| failures.lists.get(&key)).flatten());
        match message {
            Some(message) => Err(StoreError::Api(message.clone())),
            None => Ok(()),
        }
    }

    async fn decode_all<K: StoreResource>(&self) -> StoreResult<Vec<K>> {
        let contents = self.contents.read().await;
        contents
            .objects
            .get(&key_of::<K>())
            .into_iter()
            .flatten()
            .map(|value| {
                serde_json::from_value::<K>(value.clone()).map_err(|e| StoreError::Decode {
                    kind: K::kind(&()).to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceStore for SnapshotStore {
    async fn list<K: StoreResource>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> StoreResult<Vec<K>> {
        self.check_failure::<K>(true).await?;
        let requirements = match label_selector {
            Some(selector) => parse_selector(selector)?,
            None => Vec::new(),
        };

        let items: Vec<K> = self
            .decode_all::<K>()
            .await?
            .into_iter()
            .filter(|object| namespace.map_or(true, |ns| object.namespace().as_deref() == Some(ns)))
            .filter(|object| requirements.iter().all(|r| r.matches(object.labels())))
            .collect();

        debug!(
            "Listed {} {} resources from snapshot",
            items.len(),
            K::kind(&())
        );
        Ok(items)
    }

    async fn get<K: StoreResource>(&self, namespace: &str, name: &str) -> StoreResult<K> {
        self.check_failure::<K>(false).await?;
        self.decode_all::<K>()
            .await?
            .into_iter()
            .find(|object| {
                object.name_any() == name && object.namespace().as_deref() == Some(namespace)
            })
            .ok_or_else(|| StoreError::NotFound {
                kind: K::kind(&()).to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn server_version(&self) -> StoreResult<String> {
        self.contents
            .read()
            .await
            .server_version
            .clone()
            .ok_or_else(|| StoreError::NotFound {
                kind: "Version".to_string(),
                namespace: String::new(),
                name: "server".to_string(),
            })
    }
}
