use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid audit configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Kubernetes error: {0}")]
    KubernetesError(#[from] kube::error::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Errors returned by a [`ResourceStore`](crate::store::ResourceStore) read
///
/// `NotFound` is kept apart from every other failure: several checks treat
/// a missing object as an expected state while any other error means the
/// data could not be read at all.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("{kind} \"{namespace}/{name}\" not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{0}")]
    Api(String),

    #[error("failed to decode {kind}: {message}")]
    Decode { kind: String, message: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
