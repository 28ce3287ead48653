//! Deny-all ingress policy check
//!
//! Applies a namespace-wide deny-all-ingress NetworkPolicy, verifies that the
//! previously reachable echo Service becomes unreachable, then removes the
//! policy again. A connection that still succeeds while the policy is active
//! means the platform is not enforcing policies and fails the check.

use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicySpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tokio::time::Instant;
use tracing::{debug, info};

use super::traits::{Check, Outcome};
use crate::fixture::workloads::workload_labels;
use crate::fixture::{Fixture, CLIENT_DEPLOYMENT, ECHO_PORT, ECHO_SAME_NODE};
use crate::probe::connect_command;

const POLICY_NAME: &str = "deny-all-ingress";
const POLICY_READY_POLL: Duration = Duration::from_secs(2);
const POLICY_READY_TIMEOUT: Duration = Duration::from_secs(60);

fn deny_all_ingress(namespace: &str) -> NetworkPolicy {
    NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(POLICY_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(workload_labels(POLICY_NAME)),
            ..Default::default()
        },
        spec: Some(NetworkPolicySpec {
            // Empty pod selector, no ingress rules: every pod in the
            // namespace rejects all inbound traffic.
            pod_selector: LabelSelector::default(),
            policy_types: Some(vec!["Ingress".to_string()]),
            ..Default::default()
        }),
    }
}

/// Verifies that a deny-all-ingress NetworkPolicy is actually enforced.
pub struct DenyAllIngressCheck;

impl DenyAllIngressCheck {
    async fn verify_isolation(&self, fixture: &Fixture) -> anyhow::Result<()> {
        // The policy object existing is not the same as it being programmed,
        // but it is the strongest signal the API surface offers.
        let start = Instant::now();
        loop {
            if fixture
                .cluster
                .get_network_policy(&fixture.namespace, POLICY_NAME)
                .await
                .is_ok()
            {
                break;
            }
            if start.elapsed() >= POLICY_READY_TIMEOUT {
                return Err(anyhow!(
                    "NetworkPolicy {POLICY_NAME} was not visible after {POLICY_READY_TIMEOUT:?}"
                ));
            }
            tokio::time::sleep(POLICY_READY_POLL).await;
        }
        info!(policy = POLICY_NAME, "network policy applied");

        let command = connect_command(ECHO_SAME_NODE, ECHO_PORT);
        for client in &fixture.client_pods {
            let client_name = client.metadata.name.clone().unwrap_or_default();
            match fixture
                .cluster
                .exec(
                    &fixture.namespace,
                    &client_name,
                    CLIENT_DEPLOYMENT,
                    &command,
                )
                .await
            {
                Ok(_) => {
                    return Err(anyhow!(
                        "client pod {client_name} could still reach Service {ECHO_SAME_NODE}:{ECHO_PORT} \
                         while the deny-all ingress policy was active"
                    ));
                }
                Err(err) => {
                    debug!(pod = %client_name, error = %err, "connection blocked as expected");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Check for DenyAllIngressCheck {
    fn name(&self) -> &'static str {
        "deny-all-ingress-policy"
    }

    fn description(&self) -> &'static str {
        "A deny-all ingress NetworkPolicy blocks previously working connectivity"
    }

    async fn run(&self, fixture: &mut Fixture) -> Outcome {
        if fixture.echo_same_node_pod.is_none() {
            return Outcome::fail(anyhow!("same-node echo pod was not provisioned"));
        }

        if let Err(err) = fixture
            .cluster
            .create_network_policy(&fixture.namespace, &deny_all_ingress(&fixture.namespace))
            .await
        {
            return Outcome::fail(
                anyhow::Error::new(err).context("creating deny-all ingress NetworkPolicy"),
            );
        }

        // Always remove the policy, whatever the verdict: later checks rely
        // on connectivity being restored.
        let verdict = self.verify_isolation(fixture).await;
        if let Err(err) = fixture
            .cluster
            .delete_network_policy(&fixture.namespace, POLICY_NAME)
            .await
        {
            return Outcome::fail(
                anyhow::Error::new(err).context("deleting deny-all ingress NetworkPolicy"),
            );
        }
        info!(policy = POLICY_NAME, "network policy deleted");

        verdict.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_denies_all_ingress_for_every_pod() {
        let policy = deny_all_ingress("postflight-test-abc12345");
        assert_eq!(policy.metadata.name.as_deref(), Some(POLICY_NAME));
        let spec = policy.spec.unwrap();
        assert_eq!(spec.policy_types, Some(vec!["Ingress".to_string()]));
        // Empty selector matches all pods; absent rules deny everything.
        assert_eq!(spec.pod_selector, LabelSelector::default());
        assert!(spec.ingress.is_none());
    }

    #[test]
    fn check_metadata() {
        assert_eq!(DenyAllIngressCheck.name(), "deny-all-ingress-policy");
        assert!(!DenyAllIngressCheck.description().is_empty());
    }
}
