//! In-memory fake cluster for testing postflight
//!
//! [`FakeCluster`] implements the harness's cluster-client contract without
//! any network access, recording every mutation so tests can assert on what
//! the harness did. Behavior is scripted through builder methods.
//!
//! # Example
//!
//! ```rust
//! use postflight_testkit::FakeCluster;
//!
//! // Single-node cluster whose deployments never become ready.
//! let cluster = FakeCluster::new().with_nodes(1).without_ready_deployments();
//! assert_eq!(cluster.node_count(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, PodStatus, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use postflight::cluster::{ClusterError, ClusterOps, ExecOutput};

#[derive(Default)]
struct State {
    namespaces: Vec<String>,
    deleted_namespaces: Vec<String>,
    deployments: Vec<Deployment>,
    services: Vec<String>,
    policies: BTreeMap<String, NetworkPolicy>,
    pods: Vec<Pod>,
    exec_log: Vec<Vec<String>>,
}

/// Scriptable in-memory implementation of [`ClusterOps`].
///
/// Defaults: two nodes, the agent DaemonSet present, deployments ready as
/// soon as they are created, and every exec succeeding.
pub struct FakeCluster {
    nodes: usize,
    agent_present: bool,
    deployments_ready: bool,
    fail_deployment_create: bool,
    exec_failures: Vec<String>,
    fail_all_execs: bool,
    enforce_policies: bool,
    state: Mutex<State>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            nodes: 2,
            agent_present: true,
            deployments_ready: true,
            fail_deployment_create: false,
            exec_failures: Vec::new(),
            fail_all_execs: false,
            enforce_policies: true,
            state: Mutex::new(State::default()),
        }
    }

    /// Set the number of nodes the cluster reports.
    pub fn with_nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes;
        self
    }

    /// The agent DaemonSet lookup fails (platform not installed).
    pub fn without_agent(mut self) -> Self {
        self.agent_present = false;
        self
    }

    /// Deployments never report any ready replicas.
    pub fn without_ready_deployments(mut self) -> Self {
        self.deployments_ready = false;
        self
    }

    /// Every Deployment create fails.
    pub fn failing_deployment_create(mut self) -> Self {
        self.fail_deployment_create = true;
        self
    }

    /// Execs whose command line contains `pattern` fail with a non-zero exit.
    pub fn failing_exec_containing(mut self, pattern: impl Into<String>) -> Self {
        self.exec_failures.push(pattern.into());
        self
    }

    /// Every exec fails with a non-zero exit.
    pub fn failing_all_execs(mut self) -> Self {
        self.fail_all_execs = true;
        self
    }

    /// Connections keep succeeding even while a deny-all ingress policy
    /// exists (simulates a platform that does not enforce policies).
    pub fn without_policy_enforcement(mut self) -> Self {
        self.enforce_policies = false;
        self
    }

    // ── Assertion accessors ──────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.nodes
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.state.lock().unwrap().namespaces.clone()
    }

    pub fn deleted_namespaces(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_namespaces.clone()
    }

    pub fn deployment_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .iter()
            .filter_map(|d| d.metadata.name.clone())
            .collect()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.state.lock().unwrap().services.clone()
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.state.lock().unwrap().policies.keys().cloned().collect()
    }

    /// Every command executed in a pod, in order.
    pub fn exec_log(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().exec_log.clone()
    }

    fn synthesize_pod(&self, deployment: &Deployment, index: usize) -> Pod {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        Pod {
            metadata: ObjectMeta {
                name: Some(format!("{name}-0")),
                labels: Some(BTreeMap::from([("name".to_string(), name)])),
                ..Default::default()
            },
            status: Some(PodStatus {
                pod_ip: Some(format!("10.0.{index}.2")),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn get_daemon_set(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<DaemonSet, ClusterError> {
        if !self.agent_present {
            return Err(ClusterError::NotFound {
                kind: "DaemonSet",
                name: name.to_string(),
            });
        }
        Ok(DaemonSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), ClusterError> {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        self.state.lock().unwrap().namespaces.push(name);
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.deleted_namespaces.push(name.to_string());
        // Deleting an absent namespace is not an error.
        state.namespaces.retain(|n| n != name);
        Ok(())
    }

    async fn create_deployment(
        &self,
        _namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), ClusterError> {
        if self.fail_deployment_create {
            return Err(ClusterError::Unexpected(
                "injected Deployment create failure".to_string(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        let index = state.deployments.len();
        let pod = self.synthesize_pod(deployment, index);
        state.deployments.push(deployment.clone());
        state.pods.push(pod);
        Ok(())
    }

    async fn get_deployment(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Deployment, ClusterError> {
        let state = self.state.lock().unwrap();
        let deployment = state
            .deployments
            .iter()
            .find(|d| d.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: "Deployment",
                name: name.to_string(),
            })?;
        let requested = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let ready = if self.deployments_ready { requested } else { 0 };
        Ok(Deployment {
            status: Some(DeploymentStatus {
                replicas: Some(requested),
                ready_replicas: Some(ready),
                ..Default::default()
            }),
            ..deployment
        })
    }

    async fn create_service(&self, _namespace: &str, service: &Service) -> Result<(), ClusterError> {
        let name = service.metadata.name.clone().unwrap_or_default();
        self.state.lock().unwrap().services.push(name);
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        Ok((0..self.nodes)
            .map(|i| Node {
                metadata: ObjectMeta {
                    name: Some(format!("node-{i}")),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect())
    }

    async fn list_pods(
        &self,
        _namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, ClusterError> {
        let (key, value) = label_selector.split_once('=').ok_or_else(|| {
            ClusterError::Unexpected(format!("unsupported selector: {label_selector}"))
        })?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .pods
            .iter()
            .filter(|p| {
                p.metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(key))
                    .map(|v| v == value)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn create_network_policy(
        &self,
        _namespace: &str,
        policy: &NetworkPolicy,
    ) -> Result<(), ClusterError> {
        let name = policy.metadata.name.clone().unwrap_or_default();
        self.state.lock().unwrap().policies.insert(name, policy.clone());
        Ok(())
    }

    async fn get_network_policy(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<NetworkPolicy, ClusterError> {
        self.state
            .lock()
            .unwrap()
            .policies
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: "NetworkPolicy",
                name: name.to_string(),
            })
    }

    async fn delete_network_policy(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        self.state
            .lock()
            .unwrap()
            .policies
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClusterError::NotFound {
                kind: "NetworkPolicy",
                name: name.to_string(),
            })
    }

    async fn exec(
        &self,
        _namespace: &str,
        _pod: &str,
        _container: &str,
        command: &[String],
    ) -> Result<ExecOutput, ClusterError> {
        let deny_active = {
            let mut state = self.state.lock().unwrap();
            state.exec_log.push(command.to_vec());
            self.enforce_policies && !state.policies.is_empty()
        };
        let line = command.join(" ");
        if self.fail_all_execs || deny_active || self.exec_failures.iter().any(|p| line.contains(p))
        {
            return Err(ClusterError::Exec {
                message: "command terminated with exit code 1".to_string(),
                stdout: String::new(),
                stderr: "TIMEOUT\n".to_string(),
            });
        }
        Ok(ExecOutput {
            stdout: "OK".to_string(),
            stderr: String::new(),
        })
    }
}
