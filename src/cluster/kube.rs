//! kube-rs backed implementation of [`ClusterOps`].

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::{Api, AttachParams, DeleteParams, ListParams, PostParams};
use kube::config::Kubeconfig;
use kube::Client;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{ClusterError, ClusterOps, ExecOutput};

/// Cluster client backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Build a client from the ambient configuration (kubeconfig or
    /// in-cluster service account) and return it together with the cluster
    /// name used as the reporter prefix.
    pub async fn try_default() -> Result<(Self, String), ClusterError> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Unexpected(format!("unable to build client: {e}")))?;
        let cluster_name = Kubeconfig::read()
            .ok()
            .and_then(|kc| kc.current_context)
            .unwrap_or_else(|| "in-cluster".to_string());
        Ok((Self { client }, cluster_name))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

async fn slurp(reader: Option<impl AsyncRead + Unpin>) -> String {
    let mut buf = String::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_string(&mut buf).await;
    }
    buf
}

#[async_trait]
impl ClusterOps for KubeCluster {
    async fn get_daemon_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DaemonSet, ClusterError> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.create(&PostParams::default(), namespace).await?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Already gone — teardown must be idempotent.
            Err(kube::Error::Api(ref e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<(), ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), deployment).await?;
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Deployment, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<(), ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), service).await?;
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        Ok(api.list(&params).await?.items)
    }

    async fn create_network_policy(
        &self,
        namespace: &str,
        policy: &NetworkPolicy,
    ) -> Result<(), ClusterError> {
        let api: Api<NetworkPolicy> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), policy).await?;
        Ok(())
    }

    async fn get_network_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<NetworkPolicy, ClusterError> {
        let api: Api<NetworkPolicy> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn delete_network_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        let api: Api<NetworkPolicy> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> Result<ExecOutput, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams::default()
            .container(container)
            .stdout(true)
            .stderr(true);
        let mut attached = api.exec(pod, command.iter().cloned(), &params).await?;

        let out = attached.stdout();
        let err = attached.stderr();
        let (stdout, stderr) = tokio::join!(slurp(out), slurp(err));

        let status = match attached.take_status() {
            Some(fut) => fut.await,
            None => None,
        };
        attached
            .join()
            .await
            .map_err(|e| ClusterError::Unexpected(format!("exec join failed: {e}")))?;

        if let Some(status) = status {
            if status.status.as_deref() == Some("Failure") {
                return Err(ClusterError::Exec {
                    message: status
                        .message
                        .unwrap_or_else(|| "command terminated abnormally".to_string()),
                    stdout,
                    stderr,
                });
            }
        }
        Ok(ExecOutput { stdout, stderr })
    }
}
