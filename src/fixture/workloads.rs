//! Builders for the fixture's Kubernetes objects
//!
//! Plain constructors for the client/echo Deployments and their Services.
//! Placement is expressed through required (anti-)affinity on the hostname
//! topology key, so the scheduler either honors it or leaves the workload
//! pending, which the readiness wait turns into a fatal error.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, PodAffinity, PodAffinityTerm, PodAntiAffinity, PodSpec,
    PodTemplateSpec, Service, ServicePort, ServiceSpec, Toleration,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, LabelSelectorRequirement, ObjectMeta,
};

/// Scheduling-topology unit used for co-location and anti-co-location.
pub const TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// Parameters for a fixture workload Deployment.
pub struct WorkloadParams<'a> {
    pub name: &'a str,
    pub role: &'a str,
    pub image: &'a str,
    pub command: Vec<String>,
    pub port: i32,
    pub affinity: Option<Affinity>,
}

pub fn workload_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), "postflight".to_string()),
        ("component".to_string(), "installation-checker".to_string()),
        ("name".to_string(), name.to_string()),
    ])
}

fn name_selector_term(peer: &str) -> PodAffinityTerm {
    PodAffinityTerm {
        label_selector: Some(LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "name".to_string(),
                operator: "In".to_string(),
                values: Some(vec![peer.to_string()]),
            }]),
            ..Default::default()
        }),
        topology_key: TOPOLOGY_KEY.to_string(),
        ..Default::default()
    }
}

/// Required co-location with the named workload (same node).
pub fn same_node_affinity(peer: &str) -> Affinity {
    Affinity {
        pod_affinity: Some(PodAffinity {
            required_during_scheduling_ignored_during_execution: Some(vec![name_selector_term(
                peer,
            )]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Required anti-co-location with the named workload (different node).
pub fn other_node_affinity(peer: &str) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            required_during_scheduling_ignored_during_execution: Some(vec![name_selector_term(
                peer,
            )]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Single-replica Deployment for a fixture workload.
///
/// Tolerates the control-plane taint so single-node clusters (where the only
/// node is a control-plane node) can still schedule the fixture.
pub fn workload_deployment(params: WorkloadParams<'_>) -> Deployment {
    let labels = workload_labels(params.name);
    Deployment {
        metadata: ObjectMeta {
            name: Some(params.name.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(BTreeMap::from([(
                    "name".to_string(),
                    params.name.to_string(),
                )])),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: params.name.to_string(),
                        image: Some(params.image.to_string()),
                        command: Some(params.command),
                        ports: Some(vec![ContainerPort {
                            container_port: params.port,
                            name: Some(params.role.to_string()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    affinity: params.affinity,
                    tolerations: Some(vec![Toleration {
                        key: Some("node-role.kubernetes.io/control-plane".to_string()),
                        operator: Some("Exists".to_string()),
                        effect: Some("NoSchedule".to_string()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// ClusterIP Service fronting an echo workload.
pub fn echo_service(name: &str, port: i32) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(workload_labels(name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            ports: Some(vec![ServicePort {
                name: Some(name.to_string()),
                port,
                ..Default::default()
            }]),
            selector: Some(BTreeMap::from([("name".to_string(), name.to_string())])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_node_affinity_requires_co_location() {
        let affinity = same_node_affinity("test-client");
        let terms = affinity
            .pod_affinity
            .unwrap()
            .required_during_scheduling_ignored_during_execution
            .unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].topology_key, TOPOLOGY_KEY);
        let exprs = terms[0]
            .label_selector
            .as_ref()
            .unwrap()
            .match_expressions
            .as_ref()
            .unwrap();
        assert_eq!(exprs[0].values, Some(vec!["test-client".to_string()]));
        assert!(affinity.pod_anti_affinity.is_none());
    }

    #[test]
    fn other_node_affinity_requires_anti_co_location() {
        let affinity = other_node_affinity("test-client");
        assert!(affinity.pod_affinity.is_none());
        let terms = affinity
            .pod_anti_affinity
            .unwrap()
            .required_during_scheduling_ignored_during_execution
            .unwrap();
        assert_eq!(terms[0].topology_key, TOPOLOGY_KEY);
    }

    #[test]
    fn deployment_carries_labels_and_toleration() {
        let deployment = workload_deployment(WorkloadParams {
            name: "echo-same-node",
            role: "echo",
            image: "example.test/agnhost:2.29",
            command: vec!["/agnhost".into(), "netexec".into()],
            port: 80,
            affinity: None,
        });
        assert_eq!(deployment.metadata.name.as_deref(), Some("echo-same-node"));
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        let pod_spec = spec.template.spec.unwrap();
        assert_eq!(pod_spec.containers[0].name, "echo-same-node");
        let tolerations = pod_spec.tolerations.unwrap();
        assert_eq!(
            tolerations[0].key.as_deref(),
            Some("node-role.kubernetes.io/control-plane")
        );
        let labels = spec.template.metadata.unwrap().labels.unwrap();
        assert_eq!(labels.get("name").map(String::as_str), Some("echo-same-node"));
        assert_eq!(labels.get("app").map(String::as_str), Some("postflight"));
    }

    #[test]
    fn service_selects_workload_by_name() {
        let service = echo_service("echo-other-node", 80);
        let spec = service.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        assert_eq!(
            spec.selector.unwrap().get("name").map(String::as_str),
            Some("echo-other-node")
        );
        assert_eq!(spec.ports.unwrap()[0].port, 80);
    }
}
