//! Subnet overlap detection across cluster endpoints

use crate::report::{Finding, Reporter};
use ipnetwork::IpNetwork;
use kube::ResourceExt;
use std::str::FromStr;
use tracing::debug;
use verifier_api::Endpoint;

/// Whether two networks share at least one address
///
/// CIDR blocks are either disjoint or nested, so it is enough to test
/// whether either one contains the other's network address.
pub fn networks_overlap(a: &IpNetwork, b: &IpNetwork) -> bool {
    match (a, b) {
        (IpNetwork::V4(_), IpNetwork::V4(_)) | (IpNetwork::V6(_), IpNetwork::V6(_)) => {
            a.contains(b.network()) || b.contains(a.network())
        }
        _ => false,
    }
}

/// Whether `subnet` overlaps any network in `networks`
pub fn overlaps_any(networks: &[IpNetwork], subnet: &IpNetwork) -> bool {
    networks.iter().any(|n| networks_overlap(n, subnet))
}

/// An endpoint with its subnets parsed
struct ParsedEndpoint<'a> {
    endpoint: &'a Endpoint,
    // (declared string, parsed network) for every valid subnet
    subnets: Vec<(&'a str, IpNetwork)>,
}

impl<'a> ParsedEndpoint<'a> {
    fn cluster_id(&self) -> &'a str {
        &self.endpoint.spec.cluster_id
    }

    fn networks(&self) -> Vec<IpNetwork> {
        self.subnets.iter().map(|(_, n)| *n).collect()
    }
}

fn parse_endpoint<'a>(endpoint: &'a Endpoint, reporter: &dyn Reporter) -> (ParsedEndpoint<'a>, bool) {
    let mut valid = true;
    let mut subnets = Vec::with_capacity(endpoint.spec.subnets.len());

    for subnet in &endpoint.spec.subnets {
        match IpNetwork::from_str(subnet) {
            Ok(network) => subnets.push((subnet.as_str(), network)),
            Err(e) => {
                reporter.finding(
                    Finding::InvalidCidr,
                    format!(
                        "Error parsing CIDR {:?} in cluster {:?}: {}",
                        subnet, endpoint.spec.cluster_id, e
                    ),
                );
                valid = false;
            }
        }
    }

    (ParsedEndpoint { endpoint, subnets }, valid)
}

/// Verify that no two endpoints claim the same cluster or overlapping subnets
///
/// Every pair is examined even after a failure so the report lists every
/// violation. Returns true when nothing failed.
pub fn check_overlap(endpoints: &[Endpoint], globalnet: bool, reporter: &dyn Reporter) -> bool {
    if globalnet {
        reporter.start("Globalnet deployment detected - checking if globalnet CIDRs overlap");
    } else {
        reporter.start("Non-Globalnet deployment detected - checking if cluster CIDRs overlap");
    }

    debug!("Checking {} endpoints for overlapping CIDRs", endpoints.len());

    let mut failed = false;
    let mut parsed = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let (endpoint, valid) = parse_endpoint(endpoint, reporter);
        failed |= !valid;
        parsed.push(endpoint);
    }

    for (i, source) in parsed.iter().enumerate() {
        let source_networks = source.networks();

        for dest in &parsed[i + 1..] {
            // Only one endpoint per cluster is supported
            if source.cluster_id() == dest.cluster_id() {
                reporter.finding(
                    Finding::DuplicateEndpoint,
                    format!(
                        "Found multiple Submariner endpoints ({:?} and {:?}) in cluster {:?}",
                        source.endpoint.name_any(),
                        dest.endpoint.name_any(),
                        source.cluster_id()
                    ),
                );
                failed = true;
                continue;
            }

            for (subnet, network) in &dest.subnets {
                if overlaps_any(&source_networks, network) {
                    reporter.finding(
                        Finding::CidrOverlap,
                        format!(
                            "CIDR {:?} in cluster {:?} overlaps with cluster {:?} (CIDRs: {:?})",
                            subnet,
                            dest.cluster_id(),
                            source.cluster_id(),
                            source.endpoint.spec.subnets
                        ),
                    );
                    failed = true;
                }
            }
        }
    }

    if failed {
        reporter.end();
        return false;
    }

    if globalnet {
        reporter.end_with_success("Clusters do not have overlapping globalnet CIDRs".to_string());
    } else {
        reporter.end_with_success("Clusters do not have overlapping CIDRs".to_string());
    }
    true
}
