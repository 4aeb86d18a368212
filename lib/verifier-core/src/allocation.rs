//! Globalnet allocation consistency checks for one cluster
//!
//! Five stages run in order:
//! 1. the cluster egress pool singleton is present, sized and allocated
//! 2. every namespaced egress pool is sized as requested
//! 3. every exported ClusterIP service has a GlobalIngressIP with an IP
//! 4. exactly one internal Service realizes each allocation
//! 5. the internal Service external IP equals the allocated IP
//!
//! Stages 3 to 5 run as one pass per export. A stage stops early only when a
//! collection cannot be read; business-rule violations are recorded and the
//! stage moves on to the next object.

use crate::config::{AuditConfig, PoolSizePolicy, UnsetPoolSize};
use crate::error::StoreError;
use crate::report::{Finding, Reporter};
use crate::store::ResourceStore;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use verifier_api::condition::find_condition;
use verifier_api::submariner::{EgressPool, GLOBAL_EGRESS_IP_ALLOCATED};
use verifier_api::{
    ClusterGlobalEgressIP, ExportedServiceRef, GlobalEgressIP, GlobalIngressIP, ServiceExport,
};

/// Service type whose exports need a global ingress IP
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";

/// Stages of the allocation check, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ClusterEgressPool,
    SelectorEgressPools,
    ExportedServices,
}

impl Stage {
    pub const ALL: [Stage; 3] = [
        Stage::ClusterEgressPool,
        Stage::SelectorEgressPools,
        Stage::ExportedServices,
    ];

    pub fn description(self) -> &'static str {
        match self {
            Stage::ClusterEgressPool => "cluster egress IP pool",
            Stage::SelectorEgressPools => "namespace egress IP pools",
            Stage::ExportedServices => "exported service ingress IPs",
        }
    }
}

/// Outcome of one link of the export chain
enum Step<T> {
    /// Continue with the next link
    Next(T),
    /// Nothing further to verify for this export
    Done,
    /// A failure was recorded for this export
    Broken,
    /// The collection could not be read; abandon the stage
    Abort,
}

/// Checks the Globalnet allocation chain of one cluster
pub struct AllocationVerifier<'a, S> {
    store: &'a S,
    cluster_egress_ip_name: &'a str,
    pool_sizes: PoolSizePolicy,
    cancel: CancellationToken,
}

impl<'a, S: ResourceStore> AllocationVerifier<'a, S> {
    pub fn new(store: &'a S, config: &'a AuditConfig) -> Self {
        Self {
            store,
            cluster_egress_ip_name: &config.cluster_egress_ip_name,
            pool_sizes: config.pool_sizes.clone(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop before the next stage once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run all stages; true when none recorded a failure
    pub async fn verify(&self, reporter: &dyn Reporter) -> bool {
        reporter.start("Checking Globalnet configuration");

        let mut passed = true;
        for stage in Stage::ALL {
            if self.cancel.is_cancelled() {
                reporter.finding(
                    Finding::Cancelled,
                    format!("Audit cancelled before checking the {}", stage.description()),
                );
                reporter.end();
                return false;
            }

            info!("Checking {}", stage.description());
            let stage_passed = match stage {
                Stage::ClusterEgressPool => self.check_cluster_egress_pool(reporter).await,
                Stage::SelectorEgressPools => self.check_selector_egress_pools(reporter).await,
                Stage::ExportedServices => self.check_exported_services(reporter).await,
            };
            debug!("Stage {:?} passed: {}", stage, stage_passed);
            passed &= stage_passed;
        }

        if passed {
            reporter.end_with_success("Globalnet is enabled and properly configured".to_string());
        } else {
            reporter.end();
        }
        passed
    }

    /// Stage 1: the default ClusterGlobalEgressIP exists alone, is sized as
    /// requested and reports a successful allocation
    pub async fn check_cluster_egress_pool(&self, reporter: &dyn Reporter) -> bool {
        let pools: Vec<ClusterGlobalEgressIP> = match self.store.list(None, None).await {
            Ok(pools) => pools,
            Err(e) => {
                reporter.finding(
                    Finding::StoreUnavailable,
                    format!("Error listing the ClusterGlobalEgressIP resources: {}", e),
                );
                return false;
            }
        };

        let mut passed = true;
        if pools.len() != 1 {
            reporter.finding(
                Finding::EgressPoolMultiplicity,
                format!(
                    "Found {} ClusterGlobalEgressIP resources but only the default instance ({}) is supported",
                    pools.len(),
                    self.cluster_egress_ip_name
                ),
            );
            passed = false;
        }

        let Some(pool) = pools
            .iter()
            .find(|p| p.name_any() == self.cluster_egress_ip_name)
        else {
            reporter.finding(
                Finding::EgressPoolMissing,
                format!(
                    "Couldn't find the default ClusterGlobalEgressIP resource ({})",
                    self.cluster_egress_ip_name
                ),
            );
            return false;
        };

        let name = pool.name_any();
        passed &= check_pool_size(
            pool,
            &format!("ClusterGlobalEgressIP {:?}", name),
            self.pool_sizes.cluster_pool,
            reporter,
        );

        match find_condition(pool.conditions(), GLOBAL_EGRESS_IP_ALLOCATED) {
            None => {
                reporter.finding(
                    Finding::EgressConditionMissing,
                    format!(
                        "ClusterGlobalEgressIP {:?} is missing the {:?} status condition",
                        name, GLOBAL_EGRESS_IP_ALLOCATED
                    ),
                );
                passed = false;
            }
            Some(condition) if !condition.is_true() => {
                reporter.finding(
                    Finding::EgressAllocationFailed,
                    format!(
                        "The allocation of global IPs for ClusterGlobalEgressIP {:?} failed with reason {:?} and message {:?}",
                        name, condition.reason, condition.message
                    ),
                );
                passed = false;
            }
            Some(_) => {}
        }

        passed
    }

    /// Stage 2: every GlobalEgressIP is sized as requested
    pub async fn check_selector_egress_pools(&self, reporter: &dyn Reporter) -> bool {
        let pools: Vec<GlobalEgressIP> = match self.store.list(None, None).await {
            Ok(pools) => pools,
            Err(e) => {
                reporter.finding(
                    Finding::StoreUnavailable,
                    format!("Error listing the GlobalEgressIP resources: {}", e),
                );
                return false;
            }
        };

        let mut passed = true;
        for pool in &pools {
            let label = format!(
                "GlobalEgressIP \"{}/{}\"",
                pool.namespace().unwrap_or_default(),
                pool.name_any()
            );
            passed &= check_pool_size(pool, &label, self.pool_sizes.selector_pools, reporter);
        }
        passed
    }

    /// Stages 3 to 5 for every ServiceExport in the cluster
    pub async fn check_exported_services(&self, reporter: &dyn Reporter) -> bool {
        let exports: Vec<ServiceExport> = match self.store.list(None, None).await {
            Ok(exports) => exports,
            Err(e) => {
                reporter.finding(
                    Finding::StoreUnavailable,
                    format!("Error listing the ServiceExport resources: {}", e),
                );
                return false;
            }
        };

        let mut passed = true;
        for export in &exports {
            let relation =
                ExportedServiceRef::new(export.namespace().unwrap_or_default(), export.name_any());

            let ingress = match self.resolve_ingress(&relation, reporter).await {
                Step::Next(ingress) => ingress,
                Step::Done => continue,
                Step::Broken => {
                    passed = false;
                    continue;
                }
                Step::Abort => return false,
            };

            let service = match self.lookup_internal_service(&relation, reporter).await {
                Step::Next(service) => service,
                Step::Done => continue,
                Step::Broken => {
                    passed = false;
                    continue;
                }
                Step::Abort => return false,
            };

            passed &= verify_external_ip(&relation, &ingress, &service, reporter);
        }
        passed
    }

    /// Stage 3: resolve the exported Service and its GlobalIngressIP
    async fn resolve_ingress(
        &self,
        relation: &ExportedServiceRef,
        reporter: &dyn Reporter,
    ) -> Step<GlobalIngressIP> {
        let service: Service = match self
            .store
            .get(&relation.namespace, &relation.export_name)
            .await
        {
            Ok(service) => service,
            Err(StoreError::NotFound { .. }) => {
                reporter.finding(
                    Finding::ExportServiceMissing,
                    format!(
                        "No matching Service resource found for exported service \"{}\"",
                        relation
                    ),
                );
                return Step::Done;
            }
            Err(e) => {
                reporter.finding(
                    Finding::ServiceLookupFailed,
                    format!("Error retrieving Service \"{}\": {}", relation, e),
                );
                return Step::Broken;
            }
        };

        // Headless and other service types get per-pod or no global IPs
        if service_type(&service) != SERVICE_TYPE_CLUSTER_IP {
            debug!("Skipping exported service {} of type {}", relation, service_type(&service));
            return Step::Done;
        }

        let ingress: GlobalIngressIP = match self
            .store
            .get(&relation.namespace, &relation.export_name)
            .await
        {
            Ok(ingress) => ingress,
            Err(StoreError::NotFound { .. }) => {
                reporter.finding(
                    Finding::IngressAllocationMissing,
                    format!(
                        "No matching GlobalIngressIP resource found for exported service \"{}\"",
                        relation
                    ),
                );
                return Step::Broken;
            }
            Err(e) => {
                reporter.finding(
                    Finding::StoreUnavailable,
                    format!(
                        "Error retrieving GlobalIngressIP for exported service \"{}\": {}",
                        relation, e
                    ),
                );
                return Step::Abort;
            }
        };

        if ingress.allocated_ip().is_empty() {
            reporter.finding(
                Finding::IngressIpUnallocated,
                format!(
                    "No global IP was allocated for the GlobalIngressIP associated with exported service \"{}\"",
                    relation
                ),
            );
            return Step::Broken;
        }

        Step::Next(ingress)
    }

    /// Stage 4: find the single internal Service created for the export
    async fn lookup_internal_service(
        &self,
        relation: &ExportedServiceRef,
        reporter: &dyn Reporter,
    ) -> Step<Service> {
        let selector = relation.label_selector();
        let mut services: Vec<Service> = match self
            .store
            .list(Some(relation.namespace.as_str()), Some(selector.as_str()))
            .await
        {
            Ok(services) => services,
            Err(e) => {
                reporter.finding(
                    Finding::InternalServiceLookupFailed,
                    format!(
                        "Error listing internal Services for exported service \"{}\": {}",
                        relation, e
                    ),
                );
                return Step::Broken;
            }
        };

        match services.len() {
            0 => {
                reporter.finding(
                    Finding::InternalServiceMissing,
                    format!("No internal service found for exported service \"{}\"", relation),
                );
                Step::Broken
            }
            1 => Step::Next(services.remove(0)),
            count => {
                reporter.finding(
                    Finding::InternalServiceAmbiguous,
                    format!(
                        "Found {} internal services for exported service \"{}\" - expected 1",
                        count, relation
                    ),
                );
                Step::Broken
            }
        }
    }
}

fn service_type(service: &Service) -> &str {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        .unwrap_or(SERVICE_TYPE_CLUSTER_IP)
}

/// Compare the requested pool size with the number of allocated IPs
fn check_pool_size<P: EgressPool>(
    pool: &P,
    label: &str,
    unset: UnsetPoolSize,
    reporter: &dyn Reporter,
) -> bool {
    let allocated = pool.allocated_ips().len();
    let matches = match (pool.requested_ips(), unset) {
        (Some(requested), _) => usize::try_from(requested).map_or(false, |r| r == allocated),
        (None, UnsetPoolSize::Unbounded) => true,
        (None, UnsetPoolSize::Reject) => false,
    };

    if !matches {
        let requested = pool
            .requested_ips()
            .map_or_else(|| "unset".to_string(), |n| n.to_string());
        reporter.finding(
            Finding::EgressCountMismatch,
            format!(
                "The number of requested IPs ({}) does not match the number allocated ({}) for {}",
                requested, allocated, label
            ),
        );
    }
    matches
}

/// Stage 5: the internal Service must expose exactly the allocated IP
fn verify_external_ip(
    relation: &ExportedServiceRef,
    ingress: &GlobalIngressIP,
    service: &Service,
    reporter: &dyn Reporter,
) -> bool {
    let external_ip = service
        .spec
        .as_ref()
        .and_then(|spec| spec.external_ips.as_ref())
        .and_then(|ips| ips.first());

    let Some(external_ip) = external_ip else {
        reporter.finding(
            Finding::InternalServiceNoExternalIp,
            format!(
                "The internal svc {:?} associated with exported svc \"{}\" has no external IP",
                service.name_any(),
                relation
            ),
        );
        return false;
    };

    if external_ip != ingress.allocated_ip() {
        reporter.finding(
            Finding::ExternalIpMismatch,
            format!(
                "The external IP ({}) for internal svc {:?} associated with exported svc \"{}\" doesn't match allocated IP ({}) in GlobalIngressIP {:?}",
                external_ip,
                service.name_any(),
                relation,
                ingress.allocated_ip(),
                ingress.name_any()
            ),
        );
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Severity, StatusLog};
    use crate::store::SnapshotStore;
    use serde_json::{json, Value};

    fn cluster_pool(name: &str, requested: Option<i32>, allocated: &[&str], condition: Value) -> Value {
        let mut spec = json!({});
        if let Some(n) = requested {
            spec["numberOfIPs"] = json!(n);
        }
        json!({
            "apiVersion": "submariner.io/v1",
            "kind": "ClusterGlobalEgressIP",
            "metadata": { "name": name, "namespace": "submariner-operator" },
            "spec": spec,
            "status": { "allocatedIPs": allocated, "conditions": condition }
        })
    }

    fn allocated() -> Value {
        json!([{ "type": "Allocated", "status": "True", "reason": "Success", "message": "" }])
    }

    fn selector_pool(namespace: &str, name: &str, requested: Option<i32>, allocated: &[&str]) -> Value {
        let mut spec = json!({});
        if let Some(n) = requested {
            spec["numberOfIPs"] = json!(n);
        }
        json!({
            "apiVersion": "submariner.io/v1",
            "kind": "GlobalEgressIP",
            "metadata": { "name": name, "namespace": namespace },
            "spec": spec,
            "status": { "allocatedIPs": allocated }
        })
    }

    fn export(namespace: &str, name: &str) -> Value {
        json!({
            "apiVersion": "multicluster.x-k8s.io/v1alpha1",
            "kind": "ServiceExport",
            "metadata": { "name": name, "namespace": namespace }
        })
    }

    fn service(namespace: &str, name: &str, service_type: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": name, "namespace": namespace },
            "spec": { "type": service_type, "clusterIP": "10.96.0.10" }
        })
    }

    fn ingress(namespace: &str, name: &str, ip: &str) -> Value {
        json!({
            "apiVersion": "submariner.io/v1",
            "kind": "GlobalIngressIP",
            "metadata": { "name": name, "namespace": namespace },
            "spec": { "target": "ClusterIPService", "serviceRef": { "name": name } },
            "status": { "allocatedIP": ip }
        })
    }

    fn internal_service(namespace: &str, name: &str, export: &str, ips: &[&str]) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "labels": { "submariner.io/exportedServiceRef": export }
            },
            "spec": { "type": "ClusterIP", "externalIPs": ips }
        })
    }

    /// A cluster whose allocation chain is fully realized
    fn healthy_cluster() -> Vec<Value> {
        vec![
            cluster_pool("cluster-egress.submariner.io", Some(2), &["242.0.0.1", "242.0.0.2"], allocated()),
            selector_pool("shop", "shop-egress", Some(1), &["242.0.0.3"]),
            export("shop", "cart"),
            service("shop", "cart", "ClusterIP"),
            ingress("shop", "cart", "242.0.0.10"),
            internal_service("shop", "submariner-abc123", "cart", &["242.0.0.10"]),
        ]
    }

    fn store(values: Vec<Value>) -> SnapshotStore {
        SnapshotStore::from_values(values).unwrap()
    }

    #[tokio::test]
    async fn test_complete_chain_passes() {
        let store = store(healthy_cluster());
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(AllocationVerifier::new(&store, &config).verify(&log).await);
        assert_eq!(log.count(Severity::Failure), 0);
        assert_eq!(log.count(Severity::Warning), 0);
        assert_eq!(
            log.entries().last().unwrap().message,
            "Globalnet is enabled and properly configured"
        );
    }

    #[tokio::test]
    async fn test_requested_count_mismatch() {
        let store = store(vec![cluster_pool(
            "default",
            Some(3),
            &["242.0.0.1", "242.0.0.2"],
            allocated(),
        )]);
        let config = AuditConfig {
            cluster_egress_ip_name: "default".to_string(),
            ..Default::default()
        };
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_cluster_egress_pool(&log).await);
        let mismatches = log.findings(Finding::EgressCountMismatch);
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].message.contains("(3)"));
        assert!(mismatches[0].message.contains("(2)"));
        assert_eq!(log.count(Severity::Failure), 1);
    }

    #[tokio::test]
    async fn test_count_and_condition_both_reported() {
        let condition = json!([{
            "type": "Allocated",
            "status": "False",
            "reason": "IPPoolAllocationFailed",
            "message": "pool exhausted"
        }]);
        let store = store(vec![cluster_pool("default", Some(3), &["242.0.0.1"], condition)]);
        let config = AuditConfig {
            cluster_egress_ip_name: "default".to_string(),
            ..Default::default()
        };
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_cluster_egress_pool(&log).await);
        assert_eq!(log.findings(Finding::EgressCountMismatch).len(), 1);
        let failed = log.findings(Finding::EgressAllocationFailed);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].message.contains("\"IPPoolAllocationFailed\""));
        assert!(failed[0].message.contains("\"pool exhausted\""));
    }

    #[tokio::test]
    async fn test_missing_condition() {
        let store = store(vec![cluster_pool(
            "cluster-egress.submariner.io",
            Some(1),
            &["242.0.0.1"],
            json!([]),
        )]);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_cluster_egress_pool(&log).await);
        assert_eq!(log.findings(Finding::EgressConditionMissing).len(), 1);
        assert!(log.findings(Finding::EgressCountMismatch).is_empty());
    }

    #[tokio::test]
    async fn test_cluster_pool_multiplicity() {
        let store = store(vec![
            cluster_pool("cluster-egress.submariner.io", Some(1), &["242.0.0.1"], allocated()),
            cluster_pool("extra", Some(1), &["242.0.0.2"], allocated()),
        ]);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_cluster_egress_pool(&log).await);
        let multiplicity = log.findings(Finding::EgressPoolMultiplicity);
        assert_eq!(multiplicity.len(), 1);
        assert!(multiplicity[0].message.starts_with("Found 2 ClusterGlobalEgressIP"));
        // The default instance is still audited
        assert!(log.findings(Finding::EgressPoolMissing).is_empty());
        assert_eq!(log.count(Severity::Failure), 1);
    }

    #[tokio::test]
    async fn test_cluster_pool_missing() {
        let config = AuditConfig::default();

        let empty = store(vec![]);
        let log = StatusLog::new("east");
        assert!(!AllocationVerifier::new(&empty, &config).check_cluster_egress_pool(&log).await);
        assert_eq!(log.findings(Finding::EgressPoolMultiplicity).len(), 1);
        assert_eq!(log.findings(Finding::EgressPoolMissing).len(), 1);

        let misnamed = store(vec![cluster_pool("other", Some(1), &["242.0.0.1"], allocated())]);
        let log = StatusLog::new("east");
        assert!(!AllocationVerifier::new(&misnamed, &config).check_cluster_egress_pool(&log).await);
        assert!(log.findings(Finding::EgressPoolMultiplicity).is_empty());
        assert_eq!(log.findings(Finding::EgressPoolMissing).len(), 1);
    }

    #[tokio::test]
    async fn test_unset_pool_size_policy() {
        let values = vec![
            cluster_pool("cluster-egress.submariner.io", None, &["242.0.0.1"], allocated()),
            selector_pool("shop", "shop-egress", None, &["242.0.0.3", "242.0.0.4"]),
        ];

        let strict = AuditConfig::default();
        let store = store(values);
        let log = StatusLog::new("east");
        let verifier = AllocationVerifier::new(&store, &strict);
        assert!(!verifier.check_cluster_egress_pool(&log).await);
        assert!(!verifier.check_selector_egress_pools(&log).await);
        let mismatches = log.findings(Finding::EgressCountMismatch);
        assert_eq!(mismatches.len(), 2);
        assert!(mismatches[0].message.contains("(unset)"));

        let lenient = AuditConfig {
            pool_sizes: PoolSizePolicy {
                cluster_pool: UnsetPoolSize::Unbounded,
                selector_pools: UnsetPoolSize::Unbounded,
            },
            ..Default::default()
        };
        let log = StatusLog::new("east");
        let verifier = AllocationVerifier::new(&store, &lenient);
        assert!(verifier.check_cluster_egress_pool(&log).await);
        assert!(verifier.check_selector_egress_pools(&log).await);
        assert!(!log.has_failures());
    }

    #[tokio::test]
    async fn test_unset_policy_is_per_kind() {
        let store = store(vec![
            cluster_pool("cluster-egress.submariner.io", None, &["242.0.0.1"], allocated()),
            selector_pool("shop", "shop-egress", None, &["242.0.0.3"]),
        ]);
        let config = AuditConfig {
            pool_sizes: PoolSizePolicy {
                cluster_pool: UnsetPoolSize::Reject,
                selector_pools: UnsetPoolSize::Unbounded,
            },
            ..Default::default()
        };
        let log = StatusLog::new("east");
        let verifier = AllocationVerifier::new(&store, &config);

        assert!(!verifier.check_cluster_egress_pool(&log).await);
        assert!(verifier.check_selector_egress_pools(&log).await);
    }

    #[tokio::test]
    async fn test_selector_pools_accumulate() {
        let store = store(vec![
            selector_pool("shop", "a", Some(2), &["242.0.0.3"]),
            selector_pool("shop", "b", Some(1), &["242.0.0.4"]),
            selector_pool("bank", "c", Some(1), &[]),
        ]);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_selector_egress_pools(&log).await);
        let mismatches = log.findings(Finding::EgressCountMismatch);
        assert_eq!(mismatches.len(), 2);
        assert!(mismatches[0].message.contains("\"shop/a\""));
        assert!(mismatches[1].message.contains("\"bank/c\""));
    }

    #[tokio::test]
    async fn test_missing_service_is_warning() {
        let mut values = healthy_cluster();
        values.push(export("shop", "ghost"));
        let store = store(values);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        let missing = log.findings(Finding::ExportServiceMissing);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].severity, Severity::Warning);
        assert!(!log.has_failures());
    }

    /// Two exports whose allocation chains are both fully realized
    fn two_exports() -> Vec<Value> {
        vec![
            export("shop", "cart"),
            service("shop", "cart", "ClusterIP"),
            ingress("shop", "cart", "242.0.0.10"),
            internal_service("shop", "submariner-cart", "cart", &["242.0.0.10"]),
            export("bank", "ledger"),
            service("bank", "ledger", "ClusterIP"),
            ingress("bank", "ledger", "242.0.0.11"),
            internal_service("bank", "submariner-ledger", "ledger", &["242.0.0.11"]),
        ]
    }

    #[tokio::test]
    async fn test_two_exports_pass() {
        let store = store(two_exports());
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_service_lookup_error_continues() {
        let store = store(two_exports());
        store.fail::<Service>("connection reset").await;
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        let failed = log.findings(Finding::ServiceLookupFailed);
        assert_eq!(failed.len(), 2);
        assert!(failed[0].message.contains("shop/cart"));
        assert!(failed[1].message.contains("bank/ledger"));
        assert_eq!(log.count(Severity::Failure), 2);
    }

    #[tokio::test]
    async fn test_internal_service_list_error_continues() {
        let store = store(two_exports());
        store.fail_list::<Service>("too many requests").await;
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        let failed = log.findings(Finding::InternalServiceLookupFailed);
        assert_eq!(failed.len(), 2);
        assert!(failed[0].message.contains("shop/cart"));
        assert!(failed[0].message.contains("too many requests"));
        assert!(failed[1].message.contains("bank/ledger"));
        assert_eq!(log.count(Severity::Failure), 2);
    }

    #[tokio::test]
    async fn test_non_cluster_ip_export_is_skipped() {
        let store = store(vec![
            export("shop", "db"),
            service("shop", "db", "LoadBalancer"),
        ]);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_missing_ingress_allocation() {
        let store = store(vec![export("shop", "cart"), service("shop", "cart", "ClusterIP")]);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        assert_eq!(log.findings(Finding::IngressAllocationMissing).len(), 1);
        assert_eq!(log.count(Severity::Failure), 1);
    }

    #[tokio::test]
    async fn test_unallocated_ingress_ip() {
        let store = store(vec![
            export("shop", "cart"),
            service("shop", "cart", "ClusterIP"),
            ingress("shop", "cart", ""),
        ]);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        assert_eq!(log.findings(Finding::IngressIpUnallocated).len(), 1);
        assert_eq!(log.count(Severity::Failure), 1);
    }

    #[tokio::test]
    async fn test_ingress_read_error_aborts_stage() {
        let store = store(vec![
            export("shop", "cart"),
            export("shop", "orders"),
            service("shop", "cart", "ClusterIP"),
            service("shop", "orders", "ClusterIP"),
        ]);
        store.fail::<GlobalIngressIP>("etcd timeout").await;
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        let unavailable = log.findings(Finding::StoreUnavailable);
        assert_eq!(unavailable.len(), 1);
        assert!(unavailable[0].message.contains("shop/cart"));
        assert_eq!(log.count(Severity::Failure), 1);
    }

    #[tokio::test]
    async fn test_internal_service_missing_and_ambiguous() {
        let store = store(vec![
            export("shop", "cart"),
            service("shop", "cart", "ClusterIP"),
            ingress("shop", "cart", "242.0.0.10"),
            export("shop", "orders"),
            service("shop", "orders", "ClusterIP"),
            ingress("shop", "orders", "242.0.0.11"),
            internal_service("shop", "submariner-1", "orders", &["242.0.0.11"]),
            internal_service("shop", "submariner-2", "orders", &["242.0.0.11"]),
            // Same label in another namespace does not count
            internal_service("bank", "submariner-3", "cart", &["242.0.0.10"]),
        ]);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        let missing = log.findings(Finding::InternalServiceMissing);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("shop/cart"));
        let ambiguous = log.findings(Finding::InternalServiceAmbiguous);
        assert_eq!(ambiguous.len(), 1);
        assert!(ambiguous[0].message.starts_with("Found 2 internal services"));
    }

    #[tokio::test]
    async fn test_single_link_corruption_only_fails_ip_check() {
        let mut values = healthy_cluster();
        values.pop();
        values.push(internal_service("shop", "submariner-abc123", "cart", &["242.0.0.11"]));
        let store = store(values);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).verify(&log).await);
        let failures: Vec<_> = log
            .entries()
            .into_iter()
            .filter(|e| e.severity == Severity::Failure)
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].finding, Some(Finding::ExternalIpMismatch));
        assert!(failures[0].message.contains("242.0.0.11"));
        assert!(failures[0].message.contains("242.0.0.10"));
        assert!(failures[0].message.contains("\"submariner-abc123\""));
        assert!(failures[0].message.contains("GlobalIngressIP \"cart\""));
    }

    #[tokio::test]
    async fn test_internal_service_without_external_ip() {
        let mut values = healthy_cluster();
        values.pop();
        values.push(internal_service("shop", "submariner-abc123", "cart", &[]));
        let store = store(values);
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).check_exported_services(&log).await);
        assert_eq!(log.findings(Finding::InternalServiceNoExternalIp).len(), 1);
        assert!(log.findings(Finding::ExternalIpMismatch).is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_aborts_only_its_stage() {
        let store = store(healthy_cluster());
        store.fail::<ClusterGlobalEgressIP>("forbidden").await;
        let config = AuditConfig::default();
        let log = StatusLog::new("east");

        assert!(!AllocationVerifier::new(&store, &config).verify(&log).await);
        let unavailable = log.findings(Finding::StoreUnavailable);
        assert_eq!(unavailable.len(), 1);
        assert!(unavailable[0].message.contains("ClusterGlobalEgressIP"));
        assert_eq!(log.count(Severity::Failure), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_stage() {
        let store = store(healthy_cluster());
        let config = AuditConfig::default();
        let log = StatusLog::new("east");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let verifier = AllocationVerifier::new(&store, &config).with_cancellation(cancel);
        assert!(!verifier.verify(&log).await);
        let cancelled = log.findings(Finding::Cancelled);
        assert_eq!(cancelled.len(), 1);
        assert!(cancelled[0].message.contains("cluster egress IP pool"));
        assert_eq!(log.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let mut values = healthy_cluster();
        values.push(export("shop", "ghost"));
        values.push(selector_pool("bank", "c", Some(2), &[]));
        let store = store(values);
        let config = AuditConfig::default();

        let first = StatusLog::new("east");
        let second = StatusLog::new("east");
        let verifier = AllocationVerifier::new(&store, &config);
        verifier.verify(&first).await;
        verifier.verify(&second).await;

        assert_eq!(first.entries(), second.entries());
    }
}
