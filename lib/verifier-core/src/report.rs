//! Status reporting for audit checks
//!
//! Checks never abort on a business-rule violation. They record an entry and
//! keep going; the caller inspects [`Reporter::has_failures`] once a batch of
//! checks has run.

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// Severity of a recorded entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Failure,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "success"),
            Severity::Warning => write!(f, "warning"),
            Severity::Failure => write!(f, "failure"),
        }
    }
}

/// Every class of finding the verifier can produce
///
/// The severity of each class is decided here and nowhere else, so a new
/// check only has to pick a variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Finding {
    /// A resource collection could not be read
    StoreUnavailable,
    /// The audit was cancelled before a stage started
    Cancelled,
    /// Two endpoints claim the same cluster
    DuplicateEndpoint,
    /// A subnet of one cluster overlaps a subnet of another
    CidrOverlap,
    /// An endpoint advertises a subnet that is not a valid CIDR
    InvalidCidr,
    /// The cluster egress pool is not a singleton
    EgressPoolMultiplicity,
    /// The default cluster egress pool does not exist
    EgressPoolMissing,
    /// Requested and allocated egress IP counts differ
    EgressCountMismatch,
    /// The egress pool has no allocation condition
    EgressConditionMissing,
    /// The egress pool allocation condition is not true
    EgressAllocationFailed,
    /// The Service behind an export does not exist
    ExportServiceMissing,
    /// The Service behind an export could not be read
    ServiceLookupFailed,
    /// No GlobalIngressIP exists for an export that needs one
    IngressAllocationMissing,
    /// The GlobalIngressIP exists but has no IP yet
    IngressIpUnallocated,
    /// Internal Services for an export could not be listed
    InternalServiceLookupFailed,
    /// No internal Service exists for an export
    InternalServiceMissing,
    /// More than one internal Service exists for an export
    InternalServiceAmbiguous,
    /// The internal Service carries no external IP
    InternalServiceNoExternalIp,
    /// The internal Service external IP differs from the allocated IP
    ExternalIpMismatch,
    /// Globalnet or Submariner is not deployed on a cluster
    NotInstalled,
    /// The cluster runs a Kubernetes release Submariner does not support
    UnsupportedKubernetesVersion,
    /// The Kubernetes version of the cluster could not be determined
    KubernetesVersionUnknown,
}

impl Finding {
    pub fn severity(self) -> Severity {
        match self {
            Finding::ExportServiceMissing
            | Finding::NotInstalled
            | Finding::KubernetesVersionUnknown => Severity::Warning,
            _ => Severity::Failure,
        }
    }
}

/// One message recorded by a check
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub severity: Severity,
    /// Classification for warnings and failures raised by a check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding: Option<Finding>,
    /// Description of the bracket the entry was recorded in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    pub message: String,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let glyph = match self.severity {
            Severity::Success => "✓",
            Severity::Warning => "⚠",
            Severity::Failure => "✗",
        };
        write!(f, "{} {}", glyph, self.message)
    }
}

/// Sink for check outcomes
pub trait Reporter: Send + Sync {
    /// Open a bracket for a group of related checks
    fn start(&self, description: &str);

    /// Close the current bracket
    fn end(&self);

    /// Record an entry
    fn record(&self, severity: Severity, finding: Option<Finding>, message: String);

    /// Whether any failure has been recorded
    fn has_failures(&self) -> bool;

    fn success(&self, message: String) {
        self.record(Severity::Success, None, message);
    }

    fn warning(&self, message: String) {
        self.record(Severity::Warning, None, message);
    }

    fn failure(&self, message: String) {
        self.record(Severity::Failure, None, message);
    }

    /// Record a classified finding with the severity of its class
    fn finding(&self, finding: Finding, message: String) {
        self.record(finding.severity(), Some(finding), message);
    }

    /// Close the current bracket with a success message
    fn end_with_success(&self, message: String) {
        self.success(message);
        self.end();
    }
}

#[derive(Default)]
struct LogState {
    current: Option<String>,
    entries: Vec<Entry>,
}

/// Accumulating reporter, safe to share between tasks
///
/// Entries are kept in emission order and mirrored as tracing events.
pub struct StatusLog {
    section: String,
    state: Mutex<LogState>,
}

impl StatusLog {
    /// Create an empty log for one section of an audit (a cluster, or the
    /// cluster set as a whole)
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            state: Mutex::new(LogState::default()),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    // Entries are pushed whole; a poisoned lock still guards consistent state
    fn state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the recorded entries
    pub fn entries(&self) -> Vec<Entry> {
        self.state().entries.clone()
    }

    /// Entries of one finding class
    pub fn findings(&self, finding: Finding) -> Vec<Entry> {
        self.entries()
            .into_iter()
            .filter(|e| e.finding == Some(finding))
            .collect()
    }

    /// Number of entries at the given severity
    pub fn count(&self, severity: Severity) -> usize {
        self.state()
            .entries
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }
}

impl Reporter for StatusLog {
    fn start(&self, description: &str) {
        info!(section = %self.section, "{}", description);
        self.state().current = Some(description.to_string());
    }

    fn end(&self) {
        self.state().current = None;
    }

    fn record(&self, severity: Severity, finding: Option<Finding>, message: String) {
        match severity {
            Severity::Success => info!(section = %self.section, "{}", message),
            Severity::Warning => warn!(section = %self.section, ?finding, "{}", message),
            Severity::Failure => error!(section = %self.section, ?finding, "{}", message),
        }

        let mut state = self.state();
        let check = state.current.clone();
        state.entries.push(Entry {
            severity,
            finding,
            check,
            message,
        });
    }

    fn has_failures(&self) -> bool {
        self.count(Severity::Failure) > 0
    }
}
