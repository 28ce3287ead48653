//! Fixture lifecycle
//!
//! The fixture is the shared live environment for one run: a randomized
//! isolation namespace holding a client Deployment, an echo Deployment pinned
//! to the same node as the client, and — when the cluster has at least two
//! nodes — a second echo Deployment forced onto a different node, each echo
//! workload fronted by a ClusterIP Service.
//!
//! The fixture is owned by exactly one run. Provisioning is fail-fast; the
//! teardown deletes the namespace (cascading everything inside it), tolerates
//! partially-created or already-absent state, and must be invoked exactly
//! once per run whatever the run's outcome.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

use crate::cluster::ClusterOps;
use crate::error::{Error, Result};
use crate::report::Reporter;

pub mod workloads;

use workloads::{
    echo_service, other_node_affinity, same_node_affinity, workload_deployment, workload_labels,
    WorkloadParams,
};

pub const NAMESPACE_PREFIX: &str = "postflight-test";
pub const CLIENT_DEPLOYMENT: &str = "test-client";
pub const ECHO_SAME_NODE: &str = "echo-same-node";
pub const ECHO_OTHER_NODE: &str = "echo-other-node";
pub const ECHO_PORT: i32 = 80;

const ROLE_CLIENT: &str = "client";
const ROLE_ECHO: &str = "echo";
const AGNHOST_IMAGE: &str = "registry.k8s.io/e2e-test-images/agnhost:2.29";
const POD_READY_TIMEOUT: Duration = Duration::from_secs(60);
const POD_READY_POLL: Duration = Duration::from_secs(1);

/// Generate a uniquely named isolation namespace for one run.
pub fn generate_namespace(prefix: &str) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    format!("{prefix}-{suffix}")
}

/// The shared live environment passed to every check in turn.
pub struct Fixture {
    pub cluster: Arc<dyn ClusterOps>,
    pub namespace: String,
    pub client_pods: Vec<Pod>,
    /// First pod of the echo workload co-located with the client.
    pub echo_same_node_pod: Option<Pod>,
    /// First pod of the cross-node echo workload; `None` on single-node
    /// clusters, in which case dependent checks must report themselves
    /// skipped.
    pub echo_other_node_pod: Option<Pod>,
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("namespace", &self.namespace)
            .field("client_pods", &self.client_pods)
            .field("echo_same_node_pod", &self.echo_same_node_pod)
            .field("echo_other_node_pod", &self.echo_other_node_pod)
            .finish_non_exhaustive()
    }
}

impl Fixture {
    /// Whether the cross-node half of the fixture was provisioned.
    pub fn has_cross_node_fixture(&self) -> bool {
        self.echo_other_node_pod.is_some()
    }
}

/// Builds and tears down the fixture for one run.
pub struct FixtureManager {
    cluster: Arc<dyn ClusterOps>,
    platform_namespace: String,
    agent_daemon_set: String,
    namespace: String,
    reporter: Reporter,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl FixtureManager {
    pub fn new(
        cluster: Arc<dyn ClusterOps>,
        platform_namespace: impl Into<String>,
        agent_daemon_set: impl Into<String>,
        reporter: Reporter,
    ) -> Self {
        Self {
            cluster,
            platform_namespace: platform_namespace.into(),
            agent_daemon_set: agent_daemon_set.into(),
            namespace: generate_namespace(NAMESPACE_PREFIX),
            reporter,
            poll_interval: POD_READY_POLL,
            ready_timeout: POD_READY_TIMEOUT,
        }
    }

    /// The isolation namespace chosen for this run.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Provision the fixture. Any error is fatal and aborts the run before a
    /// single check executes; the caller must still invoke [`teardown`]
    /// afterwards.
    ///
    /// [`teardown`]: FixtureManager::teardown
    pub async fn provision(&self) -> Result<Fixture> {
        self.reporter.info("Verifying platform installation...");
        self.cluster
            .get_daemon_set(&self.platform_namespace, &self.agent_daemon_set)
            .await
            .map_err(|source| Error::Precondition {
                daemonset: self.agent_daemon_set.clone(),
                source,
            })?;

        self.reporter.info(format!(
            "Creating Namespace {} for post-installation checks...",
            self.namespace
        ));
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(self.namespace.clone()),
                labels: Some(workload_labels(&self.namespace)),
                ..Default::default()
            },
            ..Default::default()
        };
        self.cluster
            .create_namespace(&namespace)
            .await
            .map_err(|source| self.provision_error(format!("Namespace {}", self.namespace), source))?;

        self.reporter
            .info(format!("Deploying echo Service {ECHO_SAME_NODE}..."));
        self.cluster
            .create_service(&self.namespace, &echo_service(ECHO_SAME_NODE, ECHO_PORT))
            .await
            .map_err(|source| self.provision_error(format!("Service {ECHO_SAME_NODE}"), source))?;

        self.create_workload(
            ECHO_SAME_NODE,
            ROLE_ECHO,
            vec![
                "/agnhost".to_string(),
                "netexec".to_string(),
                format!("--http-port={ECHO_PORT}"),
            ],
            Some(same_node_affinity(CLIENT_DEPLOYMENT)),
        )
        .await?;

        self.reporter
            .info(format!("Deploying client Deployment {CLIENT_DEPLOYMENT}..."));
        self.create_workload(
            CLIENT_DEPLOYMENT,
            ROLE_CLIENT,
            vec!["/agnhost".to_string(), "pause".to_string()],
            None,
        )
        .await?;

        let nodes = self
            .cluster
            .list_nodes()
            .await
            .map_err(|source| self.provision_error("Node list".to_string(), source))?;
        let multi_node = nodes.len() >= 2;

        let mut created = vec![CLIENT_DEPLOYMENT, ECHO_SAME_NODE];
        if multi_node {
            self.reporter
                .info(format!("Deploying echo Service {ECHO_OTHER_NODE}..."));
            self.cluster
                .create_service(&self.namespace, &echo_service(ECHO_OTHER_NODE, ECHO_PORT))
                .await
                .map_err(|source| self.provision_error(format!("Service {ECHO_OTHER_NODE}"), source))?;
            self.create_workload(
                ECHO_OTHER_NODE,
                ROLE_ECHO,
                vec![
                    "/agnhost".to_string(),
                    "netexec".to_string(),
                    format!("--http-port={ECHO_PORT}"),
                ],
                Some(other_node_affinity(CLIENT_DEPLOYMENT)),
            )
            .await?;
            created.push(ECHO_OTHER_NODE);
        } else {
            self.reporter
                .info("Skipping cross-node workloads: multiple Nodes are not available");
        }

        self.wait_for_ready(&created).await?;

        let client_pods = self.pods_for(CLIENT_DEPLOYMENT).await?;
        let echo_same_node_pod = self.pods_for(ECHO_SAME_NODE).await?.into_iter().next();
        let echo_other_node_pod = if multi_node {
            self.pods_for(ECHO_OTHER_NODE).await?.into_iter().next()
        } else {
            None
        };

        self.reporter.info("Fixture is ready");
        Ok(Fixture {
            cluster: self.cluster.clone(),
            namespace: self.namespace.clone(),
            client_pods,
            echo_same_node_pod,
            echo_other_node_pod,
        })
    }

    /// Delete the isolation namespace, cascading everything inside it.
    ///
    /// Best-effort and idempotent: an absent namespace is not an error, and
    /// failures are reported without masking the run's primary verdict.
    pub async fn teardown(&self) {
        self.reporter
            .info(format!("Deleting Namespace {}...", self.namespace));
        if let Err(err) = self.cluster.delete_namespace(&self.namespace).await {
            self.reporter.warning(format!(
                "Failed to delete Namespace {}: {err}",
                self.namespace
            ));
        }
    }

    fn provision_error(&self, what: String, source: crate::cluster::ClusterError) -> Error {
        Error::Provision { what, source }
    }

    async fn create_workload(
        &self,
        name: &str,
        role: &str,
        command: Vec<String>,
        affinity: Option<k8s_openapi::api::core::v1::Affinity>,
    ) -> Result<()> {
        let deployment = workload_deployment(WorkloadParams {
            name,
            role,
            image: AGNHOST_IMAGE,
            command,
            port: ECHO_PORT,
            affinity,
        });
        self.cluster
            .create_deployment(&self.namespace, &deployment)
            .await
            .map_err(|source| self.provision_error(format!("Deployment {name}"), source))
    }

    /// Poll until every named Deployment reports its requested replica count
    /// ready, or the ceiling elapses.
    async fn wait_for_ready(&self, deployments: &[&str]) -> Result<()> {
        let start = Instant::now();
        loop {
            let mut pending = Vec::new();
            for name in deployments {
                let deployment = self.cluster.get_deployment(&self.namespace, name).await?;
                let requested = deployment
                    .spec
                    .as_ref()
                    .and_then(|s| s.replicas)
                    .unwrap_or(1);
                let ready = deployment
                    .status
                    .as_ref()
                    .and_then(|s| s.ready_replicas)
                    .unwrap_or(0);
                if ready < requested {
                    pending.push((*name).to_string());
                }
            }
            if pending.is_empty() {
                return Ok(());
            }
            if start.elapsed() >= self.ready_timeout {
                return Err(Error::ReadinessTimeout {
                    pending,
                    timeout: self.ready_timeout,
                });
            }
            debug!(pending = ?pending, "waiting for Deployments to become ready");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn pods_for(&self, deployment: &str) -> Result<Vec<Pod>> {
        self.cluster
            .list_pods(&self.namespace, &format!("name={deployment}"))
            .await
            .map_err(|source| self.provision_error(format!("Pod list for {deployment}"), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_namespaces_are_prefixed_and_unique() {
        let a = generate_namespace(NAMESPACE_PREFIX);
        let b = generate_namespace(NAMESPACE_PREFIX);
        assert!(a.starts_with("postflight-test-"));
        assert_eq!(a.len(), NAMESPACE_PREFIX.len() + 1 + 8);
        assert_ne!(a, b);
        let suffix = &a[NAMESPACE_PREFIX.len() + 1..];
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
