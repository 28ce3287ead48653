//! Pod-to-pod connectivity checks
//!
//! Probe from every client pod directly to an echo pod's IP, first on the
//! same node as the client, then across nodes when the cluster has more than
//! one.

use anyhow::anyhow;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use tracing::info;

use super::traits::{Check, Outcome};
use super::NEEDS_TWO_NODES;
use crate::fixture::{Fixture, CLIENT_DEPLOYMENT, ECHO_PORT};
use crate::probe::probe;

fn pod_ip(pod: &Pod) -> Option<String> {
    pod.status.as_ref().and_then(|s| s.pod_ip.clone())
}

fn pod_name(pod: &Pod) -> String {
    pod.metadata.name.clone().unwrap_or_default()
}

/// Probe `target` from every client pod; first failure wins.
async fn probe_from_all_clients(fixture: &mut Fixture, target: &Pod, what: &str) -> Outcome {
    let Some(ip) = pod_ip(target) else {
        return Outcome::fail(anyhow!("{what} pod has no IP address"));
    };
    for client in fixture.client_pods.clone() {
        let client_name = pod_name(&client);
        info!(pod = %client_name, target = %ip, "probing echo pod");
        if let Err(err) = probe(fixture, &client_name, CLIENT_DEPLOYMENT, &ip, ECHO_PORT).await {
            return Outcome::fail(anyhow::Error::new(err).context(format!(
                "client pod {client_name} could not reach {what} pod at {ip}:{ECHO_PORT}"
            )));
        }
    }
    Outcome::Success
}

/// Client pods can reach the echo pod scheduled on the same node.
pub struct PodToPodIntraNodeCheck;

#[async_trait]
impl Check for PodToPodIntraNodeCheck {
    fn name(&self) -> &'static str {
        "pod-to-pod-intranode-connectivity"
    }

    fn description(&self) -> &'static str {
        "Client pods can reach the echo pod on the same node by IP"
    }

    async fn run(&self, fixture: &mut Fixture) -> Outcome {
        let Some(target) = fixture.echo_same_node_pod.clone() else {
            return Outcome::fail(anyhow!("same-node echo pod was not provisioned"));
        };
        probe_from_all_clients(fixture, &target, "same-node echo").await
    }
}

/// Client pods can reach the echo pod scheduled on a different node.
pub struct PodToPodInterNodeCheck;

#[async_trait]
impl Check for PodToPodInterNodeCheck {
    fn name(&self) -> &'static str {
        "pod-to-pod-internode-connectivity"
    }

    fn description(&self) -> &'static str {
        "Client pods can reach the echo pod on another node by IP"
    }

    async fn run(&self, fixture: &mut Fixture) -> Outcome {
        let Some(target) = fixture.echo_other_node_pod.clone() else {
            return Outcome::skip(NEEDS_TWO_NODES);
        };
        probe_from_all_clients(fixture, &target, "other-node echo").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_metadata() {
        assert_eq!(
            PodToPodIntraNodeCheck.name(),
            "pod-to-pod-intranode-connectivity"
        );
        assert_eq!(
            PodToPodInterNodeCheck.name(),
            "pod-to-pod-internode-connectivity"
        );
        assert!(!PodToPodIntraNodeCheck.description().is_empty());
    }
}
