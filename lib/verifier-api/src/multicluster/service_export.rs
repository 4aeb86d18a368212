use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use super::API_GROUP;
use crate::condition::Condition;

/// ServiceExport declares that the Service with the same namespace and
/// name should be exported to the cluster set.
///
/// Exports are created without a `spec`, so the resource is written out by
/// hand instead of derived: a derived custom resource requires the field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceExport {
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ServiceExportSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ServiceExportStatus>,
}

/// The MCS API defines no fields for a ServiceExport spec
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceExportSpec {}

/// Status of a ServiceExport
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceExportStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ServiceExport {
    pub const VERSION: &'static str = "v1alpha1";
    pub const KIND: &'static str = "ServiceExport";

    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: None,
            status: None,
        }
    }
}

impl Resource for ServiceExport {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(Self::KIND)
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(API_GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(Self::VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("serviceexports")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
