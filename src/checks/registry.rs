//! Check registry
//!
//! An explicit, ordered registry constructed once at process start and passed
//! by reference into the runner. Registration order is execution order, so
//! run logs are reproducible across invocations.

use std::sync::Arc;

use tracing::warn;

use super::ingress_policy::DenyAllIngressCheck;
use super::pod_to_pod::{PodToPodInterNodeCheck, PodToPodIntraNodeCheck};
use super::pod_to_service::{PodToServiceInterNodeCheck, PodToServiceIntraNodeCheck};
use super::traits::Check;

/// Ordered mapping from check name to check.
#[derive(Default)]
pub struct Registry {
    entries: Vec<(String, Arc<dyn Check>)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in checks. Plain connectivity
    /// runs before the policy check, which temporarily breaks connectivity.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PodToPodIntraNodeCheck));
        registry.register(Arc::new(PodToPodInterNodeCheck));
        registry.register(Arc::new(PodToServiceIntraNodeCheck));
        registry.register(Arc::new(PodToServiceInterNodeCheck));
        registry.register(Arc::new(DenyAllIngressCheck));
        registry
    }

    /// Register a check under its own name. Always succeeds; registering a
    /// duplicate name warns and replaces the existing entry in place, so the
    /// collision is visible rather than silently masked.
    pub fn register(&mut self, check: Arc<dyn Check>) {
        let name = check.name();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            warn!(check = name, "check is already registered, replacing it");
            entry.1 = check;
        } else {
            self.entries.push((name.to_string(), check));
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.clone())
    }

    /// All checks in registration order.
    pub fn all(&self) -> impl Iterator<Item = (&str, &Arc<dyn Check>)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{Outcome, Check};
    use crate::fixture::Fixture;
    use async_trait::async_trait;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Check for Named {
        fn name(&self) -> &'static str {
            self.0
        }
        fn description(&self) -> &'static str {
            self.1
        }
        async fn run(&self, _fixture: &mut Fixture) -> Outcome {
            Outcome::Success
        }
    }

    #[test]
    fn default_checks_are_registered_in_order() {
        let registry = Registry::with_defaults();
        let names: Vec<_> = registry.all().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "pod-to-pod-intranode-connectivity",
                "pod-to-pod-internode-connectivity",
                "pod-to-service-intranode-connectivity",
                "pod-to-service-internode-connectivity",
                "deny-all-ingress-policy",
            ]
        );
    }

    #[test]
    fn registration_preserves_insertion_order() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Named("b", "second letter")));
        registry.register(Arc::new(Named("a", "first letter")));
        registry.register(Arc::new(Named("c", "third letter")));
        let names: Vec<_> = registry.all().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicate_registration_replaces_in_place() {
        let mut registry = Registry::new();
        registry.register(Arc::new(Named("a", "original")));
        registry.register(Arc::new(Named("b", "other")));
        registry.register(Arc::new(Named("a", "replacement")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a").unwrap().description(), "replacement");
        // Position is preserved, only the entry is swapped.
        let names: Vec<_> = registry.all().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn get_unknown_check_is_none() {
        let registry = Registry::with_defaults();
        assert!(registry.get("no-such-check").is_none());
    }
}
