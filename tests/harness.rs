//! End-to-end harness tests against an in-memory fake cluster.
//!
//! These drive the real fixture manager, registry, and runner through
//! `FakeCluster`, covering the outcome accounting, filtering, topology
//! skipping, readiness timeout, and teardown behavior.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use postflight::checks::{Check, Outcome, Registry};
use postflight::cluster::ClusterOps;
use postflight::fixture::{Fixture, FixtureManager, CLIENT_DEPLOYMENT, ECHO_OTHER_NODE, ECHO_SAME_NODE};
use postflight::report::Reporter;
use postflight::runner::{compile_run_filter, RunStats, Runner};
use postflight::Error;
use postflight_testkit::FakeCluster;

#[derive(Clone, Copy)]
enum Behavior {
    Pass,
    Fail,
    Skip,
}

/// Check with a scripted outcome that records its invocations.
struct ScriptedCheck {
    name: &'static str,
    behavior: Behavior,
    invocations: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Check for ScriptedCheck {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "scripted check"
    }

    async fn run(&self, _fixture: &mut Fixture) -> Outcome {
        self.invocations.lock().unwrap().push(self.name);
        match self.behavior {
            Behavior::Pass => Outcome::Success,
            Behavior::Fail => Outcome::fail(anyhow::anyhow!("scripted failure")),
            Behavior::Skip => Outcome::skip("requires 2 nodes"),
        }
    }
}

struct Harness {
    fake: Arc<FakeCluster>,
    manager: FixtureManager,
    reporter: Reporter,
}

fn harness(fake: FakeCluster) -> Harness {
    let fake = Arc::new(fake);
    let cluster: Arc<dyn ClusterOps> = fake.clone();
    let reporter = Reporter::new("fake-cluster");
    let manager = FixtureManager::new(cluster, "kube-system", "node-agent", reporter.clone());
    Harness {
        fake,
        manager,
        reporter,
    }
}

fn scripted_registry(
    checks: &[(&'static str, Behavior)],
    invocations: &Arc<Mutex<Vec<&'static str>>>,
) -> Registry {
    let mut registry = Registry::new();
    for (name, behavior) in checks {
        registry.register(Arc::new(ScriptedCheck {
            name,
            behavior: *behavior,
            invocations: invocations.clone(),
        }));
    }
    registry
}

#[tokio::test]
async fn passing_and_failing_checks_are_both_counted() {
    let h = harness(FakeCluster::new());
    let mut fixture = h.manager.provision().await.expect("provisioning failed");

    let invocations = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(
        &[("ok", Behavior::Pass), ("bad", Behavior::Fail)],
        &invocations,
    );

    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, None)
        .await;
    h.manager.teardown().await;

    assert_eq!(
        stats,
        RunStats {
            success: 1,
            failure: 1,
            skipped: 0
        }
    );
    assert!(!stats.all_passed());
    assert_eq!(stats.total(), 2);
    assert_eq!(
        h.fake.deleted_namespaces(),
        vec![h.manager.namespace().to_string()]
    );
}

#[tokio::test]
async fn filter_excludes_checks_from_invocation_and_stats() {
    let h = harness(FakeCluster::new());
    let mut fixture = h.manager.provision().await.unwrap();

    let invocations = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(
        &[("ok", Behavior::Pass), ("bad", Behavior::Fail)],
        &invocations,
    );

    let filter = compile_run_filter(Some("^ok$")).unwrap();
    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, filter.as_ref())
        .await;

    assert_eq!(
        stats,
        RunStats {
            success: 1,
            failure: 0,
            skipped: 0
        }
    );
    assert!(stats.all_passed());
    assert_eq!(*invocations.lock().unwrap(), vec!["ok"]);
}

#[tokio::test]
async fn skipped_checks_never_fail_the_run() {
    let h = harness(FakeCluster::new());
    let mut fixture = h.manager.provision().await.unwrap();

    let invocations = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(&[("needs-two-nodes", Behavior::Skip)], &invocations);

    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, None)
        .await;

    assert_eq!(
        stats,
        RunStats {
            success: 0,
            failure: 0,
            skipped: 1
        }
    );
    assert!(stats.all_passed());
}

#[tokio::test]
async fn filter_matching_nothing_yields_zero_stats() {
    let h = harness(FakeCluster::new());
    let mut fixture = h.manager.provision().await.unwrap();

    let invocations = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(
        &[("ok", Behavior::Pass), ("bad", Behavior::Fail)],
        &invocations,
    );

    let filter = compile_run_filter(Some("^no-such-check$")).unwrap();
    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, filter.as_ref())
        .await;

    assert_eq!(stats, RunStats::default());
    assert!(stats.all_passed());
    assert!(invocations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn checks_run_in_registration_order() {
    let h = harness(FakeCluster::new());
    let mut fixture = h.manager.provision().await.unwrap();

    let invocations = Arc::new(Mutex::new(Vec::new()));
    let registry = scripted_registry(
        &[
            ("charlie", Behavior::Pass),
            ("alpha", Behavior::Pass),
            ("bravo", Behavior::Pass),
        ],
        &invocations,
    );

    Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, None)
        .await;

    assert_eq!(*invocations.lock().unwrap(), vec!["charlie", "alpha", "bravo"]);
}

#[tokio::test]
async fn two_node_cluster_provisions_the_full_fixture() {
    let h = harness(FakeCluster::new());
    let fixture = h.manager.provision().await.unwrap();

    assert_eq!(
        h.fake.deployment_names(),
        vec![ECHO_SAME_NODE, CLIENT_DEPLOYMENT, ECHO_OTHER_NODE]
    );
    assert_eq!(h.fake.service_names(), vec![ECHO_SAME_NODE, ECHO_OTHER_NODE]);
    assert_eq!(fixture.client_pods.len(), 1);
    assert!(fixture.echo_same_node_pod.is_some());
    assert!(fixture.has_cross_node_fixture());
}

#[tokio::test]
async fn single_node_cluster_skips_cross_node_fixture_and_checks() {
    let h = harness(FakeCluster::new().with_nodes(1));
    let mut fixture = h.manager.provision().await.unwrap();

    // No cross-node objects at all: no Deployment, no Service, no pod ref.
    assert_eq!(
        h.fake.deployment_names(),
        vec![ECHO_SAME_NODE, CLIENT_DEPLOYMENT]
    );
    assert_eq!(h.fake.service_names(), vec![ECHO_SAME_NODE]);
    assert!(!fixture.has_cross_node_fixture());

    // The dependent built-in checks report Skipped, never Failed.
    let registry = Registry::with_defaults();
    let filter = compile_run_filter(Some("internode")).unwrap();
    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, filter.as_ref())
        .await;
    assert_eq!(
        stats,
        RunStats {
            success: 0,
            failure: 0,
            skipped: 2
        }
    );
    assert!(stats.all_passed());
}

#[tokio::test]
async fn builtin_checks_pass_on_a_healthy_cluster() {
    let h = harness(FakeCluster::new());
    let mut fixture = h.manager.provision().await.unwrap();

    let registry = Registry::with_defaults();
    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, None)
        .await;

    assert_eq!(
        stats,
        RunStats {
            success: 5,
            failure: 0,
            skipped: 0
        }
    );
    // The deny-all policy was cleaned up again.
    assert!(h.fake.policy_names().is_empty());
    // Probes went through the bounded agnhost connect command.
    let log = h.fake.exec_log();
    assert!(!log.is_empty());
    assert_eq!(log[0][0], "/agnhost");
    assert!(log[0].contains(&"--timeout=5s".to_string()));
}

#[tokio::test]
async fn unenforced_policy_fails_the_ingress_check() {
    let h = harness(FakeCluster::new().without_policy_enforcement());
    let mut fixture = h.manager.provision().await.unwrap();

    let registry = Registry::with_defaults();
    let filter = compile_run_filter(Some("^deny-all-ingress-policy$")).unwrap();
    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, filter.as_ref())
        .await;

    assert_eq!(
        stats,
        RunStats {
            success: 0,
            failure: 1,
            skipped: 0
        }
    );
    // Cleanup still happened despite the failure.
    assert!(h.fake.policy_names().is_empty());
}

#[tokio::test]
async fn unreachable_pods_fail_the_connectivity_checks() {
    let h = harness(FakeCluster::new().failing_all_execs());
    let mut fixture = h.manager.provision().await.unwrap();

    let registry = Registry::with_defaults();
    let filter = compile_run_filter(Some("^pod-to-pod-intranode")).unwrap();
    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, filter.as_ref())
        .await;

    assert_eq!(
        stats,
        RunStats {
            success: 0,
            failure: 1,
            skipped: 0
        }
    );
}

#[tokio::test]
async fn targeted_exec_failure_only_fails_the_affected_check() {
    let h = harness(FakeCluster::new().failing_exec_containing("echo-other-node:80"));
    let mut fixture = h.manager.provision().await.unwrap();

    let registry = Registry::with_defaults();
    let filter = compile_run_filter(Some("^pod-to-service")).unwrap();
    let stats = Runner::new(h.reporter.clone())
        .run_all(&registry, &mut fixture, filter.as_ref())
        .await;

    assert_eq!(
        stats,
        RunStats {
            success: 1,
            failure: 1,
            skipped: 0
        }
    );
}

#[tokio::test]
async fn readiness_timeout_aborts_before_any_check() {
    let h = harness(FakeCluster::new().without_ready_deployments());
    let cluster: Arc<dyn ClusterOps> = h.fake.clone();
    let manager = FixtureManager::new(cluster, "kube-system", "node-agent", h.reporter.clone())
        .with_ready_timeout(Duration::from_millis(50))
        .with_poll_interval(Duration::from_millis(10));

    let err = manager.provision().await.unwrap_err();
    assert!(matches!(err, Error::ReadinessTimeout { .. }));

    // Zero checks ran: nothing was ever executed in a pod.
    assert!(h.fake.exec_log().is_empty());

    // Teardown is still attempted against the chosen namespace.
    manager.teardown().await;
    assert_eq!(
        h.fake.deleted_namespaces(),
        vec![manager.namespace().to_string()]
    );
}

#[tokio::test]
async fn missing_agent_fails_the_precondition_before_anything_is_created() {
    let h = harness(FakeCluster::new().without_agent());

    let err = h.manager.provision().await.unwrap_err();
    assert!(matches!(err, Error::Precondition { .. }));
    assert!(h.fake.namespaces().is_empty());

    // Teardown against the never-created namespace is a harmless no-op.
    h.manager.teardown().await;
    assert_eq!(h.fake.deleted_namespaces().len(), 1);
}

#[tokio::test]
async fn partial_provisioning_failure_still_tears_down() {
    let h = harness(FakeCluster::new().failing_deployment_create());

    let err = h.manager.provision().await.unwrap_err();
    assert!(matches!(err, Error::Provision { .. }));
    // The namespace was created before the failure.
    assert_eq!(
        h.fake.namespaces(),
        vec![h.manager.namespace().to_string()]
    );

    h.manager.teardown().await;
    assert!(h.fake.namespaces().is_empty());
    assert_eq!(
        h.fake.deleted_namespaces(),
        vec![h.manager.namespace().to_string()]
    );
}

#[tokio::test]
async fn teardown_tolerates_an_absent_namespace() {
    let h = harness(FakeCluster::new());
    let _fixture = h.manager.provision().await.unwrap();

    h.manager.teardown().await;
    // A second teardown of the now-absent namespace must not fail.
    h.manager.teardown().await;
    assert_eq!(h.fake.deleted_namespaces().len(), 2);
    assert!(h.fake.namespaces().is_empty());
}
