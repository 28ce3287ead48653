//! Pod-to-service connectivity checks
//!
//! Probe the echo Services by DNS name from every client pod, exercising the
//! cluster's service proxying and DNS on top of plain pod networking.

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::info;

use super::traits::{Check, Outcome};
use super::NEEDS_TWO_NODES;
use crate::fixture::{Fixture, CLIENT_DEPLOYMENT, ECHO_OTHER_NODE, ECHO_PORT, ECHO_SAME_NODE};
use crate::probe::probe;

async fn probe_service(fixture: &mut Fixture, service: &str) -> Outcome {
    for client in fixture.client_pods.clone() {
        let client_name = client.metadata.name.clone().unwrap_or_default();
        info!(pod = %client_name, service = %service, "probing echo Service");
        if let Err(err) = probe(fixture, &client_name, CLIENT_DEPLOYMENT, service, ECHO_PORT).await
        {
            return Outcome::fail(anyhow::Error::new(err).context(format!(
                "client pod {client_name} could not reach Service {service}:{ECHO_PORT}"
            )));
        }
    }
    Outcome::Success
}

/// Client pods can reach the same-node echo workload through its Service.
pub struct PodToServiceIntraNodeCheck;

#[async_trait]
impl Check for PodToServiceIntraNodeCheck {
    fn name(&self) -> &'static str {
        "pod-to-service-intranode-connectivity"
    }

    fn description(&self) -> &'static str {
        "Client pods can reach the same-node echo workload through its Service"
    }

    async fn run(&self, fixture: &mut Fixture) -> Outcome {
        if fixture.echo_same_node_pod.is_none() {
            return Outcome::fail(anyhow!("same-node echo pod was not provisioned"));
        }
        probe_service(fixture, ECHO_SAME_NODE).await
    }
}

/// Client pods can reach the other-node echo workload through its Service.
pub struct PodToServiceInterNodeCheck;

#[async_trait]
impl Check for PodToServiceInterNodeCheck {
    fn name(&self) -> &'static str {
        "pod-to-service-internode-connectivity"
    }

    fn description(&self) -> &'static str {
        "Client pods can reach the other-node echo workload through its Service"
    }

    async fn run(&self, fixture: &mut Fixture) -> Outcome {
        if !fixture.has_cross_node_fixture() {
            return Outcome::skip(NEEDS_TWO_NODES);
        }
        probe_service(fixture, ECHO_OTHER_NODE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_metadata() {
        assert_eq!(
            PodToServiceIntraNodeCheck.name(),
            "pod-to-service-intranode-connectivity"
        );
        assert_eq!(
            PodToServiceInterNodeCheck.name(),
            "pod-to-service-internode-connectivity"
        );
    }
}
