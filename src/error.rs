//! Harness error taxonomy
//!
//! All of these abort the run before any check executes. Failures inside an
//! individual check never surface here; they are contained by the runner and
//! reported through [`crate::checks::Outcome`].

use std::time::Duration;

use thiserror::Error;

use crate::cluster::ClusterError;

/// Fatal errors of the verification harness.
#[derive(Debug, Error)]
pub enum Error {
    /// The `--run` filter is not a valid regular expression.
    #[error("invalid regex for run filter: {0}")]
    Filter(#[from] regex::Error),

    /// The platform's per-node agent is absent or not queryable, meaning the
    /// platform itself is not correctly installed.
    #[error("unable to determine status of agent DaemonSet {daemonset}: {source}")]
    Precondition {
        daemonset: String,
        #[source]
        source: ClusterError,
    },

    /// Creating or listing a fixture resource failed.
    #[error("unable to create {what}: {source}")]
    Provision {
        what: String,
        #[source]
        source: ClusterError,
    },

    /// Fixture workloads never reached their requested ready replica count.
    #[error("workloads {pending:?} not ready after {timeout:?}")]
    ReadinessTimeout {
        pending: Vec<String>,
        timeout: Duration,
    },

    /// Any other cluster-level fault (client construction, status polling).
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

/// Short alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_timeout_names_pending_workloads() {
        let err = Error::ReadinessTimeout {
            pending: vec!["echo-same-node".into()],
            timeout: Duration::from_secs(60),
        };
        let msg = err.to_string();
        assert!(msg.contains("echo-same-node"));
        assert!(msg.contains("not ready"));
    }

    #[test]
    fn filter_error_from_bad_regex() {
        let err: Error = regex::Regex::new("(").unwrap_err().into();
        assert!(matches!(err, Error::Filter(_)));
    }
}
