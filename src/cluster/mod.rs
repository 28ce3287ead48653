//! Cluster client contract
//!
//! The harness only depends on this small set of operations, not on any
//! specific transport. The production implementation is [`KubeCluster`];
//! tests drive the harness through an in-memory fake.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use thiserror::Error;

mod kube;

pub use kube::KubeCluster;

/// Errors from cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] ::kube::Error),

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("command failed: {message}")]
    Exec {
        message: String,
        stdout: String,
        stderr: String,
    },

    #[error("{0}")]
    Unexpected(String),
}

/// Captured output streams of a command executed inside a pod.
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Operations the harness needs from the cluster control plane.
///
/// Every call is blocking from the caller's perspective and cancellable by
/// dropping the future; none of them retry internally.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn get_daemon_set(&self, namespace: &str, name: &str)
        -> Result<DaemonSet, ClusterError>;

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), ClusterError>;

    /// Deletes the namespace and everything in it. Succeeds when the
    /// namespace is already absent.
    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), ClusterError>;

    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<Deployment, ClusterError>;

    async fn create_service(&self, namespace: &str, service: &Service)
        -> Result<(), ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError>;

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, ClusterError>;

    async fn create_network_policy(
        &self,
        namespace: &str,
        policy: &NetworkPolicy,
    ) -> Result<(), ClusterError>;

    async fn get_network_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<NetworkPolicy, ClusterError>;

    async fn delete_network_policy(&self, namespace: &str, name: &str)
        -> Result<(), ClusterError>;

    /// Executes `command` inside the named container and captures both output
    /// streams. A non-zero exit status is an [`ClusterError::Exec`] carrying
    /// the captured streams.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<ExecOutput, ClusterError>;
}
