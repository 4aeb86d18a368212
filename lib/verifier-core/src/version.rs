//! Kubernetes version support check

use crate::error::StoreError;
use crate::report::{Finding, Reporter};
use crate::store::ResourceStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Oldest Kubernetes release Submariner supports
pub const MIN_KUBERNETES_VERSION: KubernetesVersion = KubernetesVersion {
    major: 1,
    minor: 19,
    patch: 0,
};

/// Numeric Kubernetes release, ordered by major, minor, patch
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KubernetesVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Default for KubernetesVersion {
    fn default() -> Self {
        MIN_KUBERNETES_VERSION
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Leading digits of a version component; providers append suffixes such
/// as the `+` in EKS minors
fn leading_number(component: &str) -> Option<u64> {
    let end = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    component[..end].parse().ok()
}

impl FromStr for KubernetesVersion {
    type Err = String;

    /// Accepts `v1.29.4`, `1.29`, `v1.27.8-eks-8cb36c9` and similar
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s.trim().trim_start_matches('v');
        let core = core.split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');

        let mut next = |required: bool| match parts.next() {
            Some(part) => leading_number(part).ok_or_else(|| format!("invalid version {:?}", s)),
            None if required => Err(format!("invalid version {:?}", s)),
            None => Ok(0),
        };

        Ok(Self {
            major: next(true)?,
            minor: next(true)?,
            patch: next(false)?,
        })
    }
}

impl TryFrom<String> for KubernetesVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KubernetesVersion> for String {
    fn from(version: KubernetesVersion) -> Self {
        version.to_string()
    }
}

/// Verify the cluster runs a Kubernetes release at or above `minimum`
pub async fn check_kubernetes_version<S: ResourceStore>(
    store: &S,
    minimum: KubernetesVersion,
    reporter: &dyn Reporter,
) -> bool {
    reporter.start("Checking Submariner support for the Kubernetes version");

    let reported = match store.server_version().await {
        Ok(version) => version,
        Err(StoreError::NotFound { .. }) => {
            reporter.finding(
                Finding::KubernetesVersionUnknown,
                "The Kubernetes version is not known - skipping the version check".to_string(),
            );
            reporter.end();
            return true;
        }
        Err(e) => {
            reporter.finding(
                Finding::StoreUnavailable,
                format!("Error retrieving the Kubernetes server version: {}", e),
            );
            reporter.end();
            return false;
        }
    };

    let version = match reported.parse::<KubernetesVersion>() {
        Ok(version) => version,
        Err(e) => {
            reporter.finding(
                Finding::UnsupportedKubernetesVersion,
                format!("Unable to interpret the Kubernetes version: {}", e),
            );
            reporter.end();
            return false;
        }
    };
    debug!("Kubernetes version {} parsed as {}", reported, version);

    if version < minimum {
        reporter.finding(
            Finding::UnsupportedKubernetesVersion,
            format!(
                "Kubernetes version {:?} is older than the minimum supported version {}",
                reported, minimum
            ),
        );
        reporter.end();
        return false;
    }

    reporter.end_with_success(format!("Kubernetes version {:?} is supported", reported));
    true
}
