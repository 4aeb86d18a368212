//! Label-based relation between a ServiceExport and its internal Service
//!
//! The platform does not enforce this reference: the Globalnet controller
//! creates a Service labelled with the export's name, and the only way back
//! is a label selector in the export's namespace.

/// Label carried by internal Services created for an exported service
pub const EXPORTED_SERVICE_REF_LABEL: &str = "submariner.io/exportedServiceRef";

/// Lookup key from an exported service to its derived internal Service
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExportedServiceRef {
    pub namespace: String,
    pub export_name: String,
}

impl ExportedServiceRef {
    pub fn new(namespace: impl Into<String>, export_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            export_name: export_name.into(),
        }
    }

    /// Equality label selector matching the internal Services for this export
    pub fn label_selector(&self) -> String {
        format!("{}={}", EXPORTED_SERVICE_REF_LABEL, self.export_name)
    }
}

impl std::fmt::Display for ExportedServiceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.export_name)
    }
}
