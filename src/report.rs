//! Prefixed console reporting
//!
//! Every line is prefixed with the cluster name so output from different
//! clusters can be told apart when runs are aggregated in CI logs.

use colored::Colorize;

const BANNER: &str =
    "-------------------------------------------------------------------------------------------";

/// Leveled console output for a single run.
///
/// Stateless beyond the cluster-name prefix; cloning is cheap.
#[derive(Debug, Clone)]
pub struct Reporter {
    prefix: String,
}

impl Reporter {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            prefix: cluster_name.into(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        println!("[{}] {}", self.prefix, msg.as_ref());
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        println!("[{}] {}", self.prefix, msg.as_ref().green());
    }

    pub fn warning(&self, msg: impl AsRef<str>) {
        println!("[{}] {}", self.prefix, msg.as_ref().yellow());
    }

    pub fn failure(&self, msg: impl AsRef<str>) {
        println!("[{}] {}", self.prefix, msg.as_ref().red());
    }

    /// Bannered section header printed before each check.
    pub fn header(&self, msg: impl AsRef<str>) {
        self.info(BANNER);
        self.info(msg);
        self.info(BANNER);
    }
}
