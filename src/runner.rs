//! Sequential check execution
//!
//! Iterates the registry in order, applies the optional name filter, invokes
//! each matching check against the shared fixture, and classifies every
//! outcome. Checks excluded by the filter are not invoked and not counted.

use regex::Regex;

use crate::checks::{Outcome, Registry};
use crate::error::Result;
use crate::fixture::Fixture;
use crate::report::Reporter;

/// Per-run outcome counts.
///
/// Invariant: `success + failure + skipped` equals the number of checks
/// actually invoked.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.success + self.failure + self.skipped
    }

    /// Skips never fail a run.
    pub fn all_passed(&self) -> bool {
        self.failure == 0
    }
}

/// Compile the optional run filter. An empty or absent pattern runs
/// everything; an invalid pattern aborts before anything is provisioned.
pub fn compile_run_filter(filter: Option<&str>) -> Result<Option<Regex>> {
    match filter {
        None | Some("") => Ok(None),
        Some(pattern) => Ok(Some(Regex::new(pattern)?)),
    }
}

/// Runs registered checks strictly one at a time.
pub struct Runner {
    reporter: Reporter,
}

impl Runner {
    pub fn new(reporter: Reporter) -> Self {
        Self { reporter }
    }

    /// Execute every registered check whose name matches `filter` (all of
    /// them when `filter` is `None`), in registration order, sequentially.
    ///
    /// Check failures are fully contained here; they never propagate past
    /// the per-check boundary.
    pub async fn run_all(
        &self,
        registry: &Registry,
        fixture: &mut Fixture,
        filter: Option<&Regex>,
    ) -> RunStats {
        let mut stats = RunStats::default();
        for (name, check) in registry.all() {
            if let Some(filter) = filter {
                if !filter.is_match(name) {
                    continue;
                }
            }
            self.reporter.header(format!("Running check: {name}"));
            match check.run(fixture).await {
                Outcome::Success => {
                    self.reporter.success(format!("Check {name} passed"));
                    stats.success += 1;
                }
                Outcome::Skipped(reason) => {
                    self.reporter
                        .warning(format!("Check {name} was skipped: {reason}"));
                    stats.skipped += 1;
                }
                Outcome::Failed(err) => {
                    // {:#} renders the whole context chain on one line.
                    self.reporter.failure(format!("Check {name} failed: {err:#}"));
                    stats.failure += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(compile_run_filter(None).unwrap().is_none());
        assert!(compile_run_filter(Some("")).unwrap().is_none());
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let err = compile_run_filter(Some("(unclosed")).unwrap_err();
        assert!(matches!(err, crate::Error::Filter(_)));
    }

    #[test]
    fn anchored_filter_compiles() {
        let filter = compile_run_filter(Some("^ok$")).unwrap().unwrap();
        assert!(filter.is_match("ok"));
        assert!(!filter.is_match("not-ok"));
    }

    #[test]
    fn stats_accounting() {
        let stats = RunStats {
            success: 2,
            failure: 1,
            skipped: 3,
        };
        assert_eq!(stats.total(), 6);
        assert!(!stats.all_passed());
        assert!(RunStats::default().all_passed());
    }
}
