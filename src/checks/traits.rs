//! Check trait and outcome classification

use async_trait::async_trait;

use crate::fixture::Fixture;

/// Result of one check invocation.
///
/// The variant is the classification: no error-chain inspection is ever
/// needed to tell a skip from a failure, however much context the inner
/// error accumulates.
#[derive(Debug)]
pub enum Outcome {
    Success,
    /// The check's structural prerequisites are absent (for example a
    /// single-node cluster); never counts against the run.
    Skipped(String),
    Failed(anyhow::Error),
}

impl Outcome {
    pub fn skip(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn fail(err: impl Into<anyhow::Error>) -> Self {
        Outcome::Failed(err.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl From<anyhow::Result<()>> for Outcome {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// A named unit of verification.
///
/// Implementations must return [`Outcome::Skipped`] rather than
/// [`Outcome::Failed`] when a structural prerequisite makes the check
/// inapplicable. Checks may mutate fixture-adjacent cluster state; the
/// runner guarantees no two checks ever run concurrently.
#[async_trait]
pub trait Check: Send + Sync {
    /// Unique registration name (used by the run filter).
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Run the check against the shared fixture.
    async fn run(&self, fixture: &mut Fixture) -> Outcome;
}
