//! Unit runners.
//!
//! A unit is one source executed against one target. Runners never return an
//! error: every fault is logged at this boundary and folded into a
//! [`UnitOutcome`], and the unit's progress entry always ends in a terminal
//! status.

pub mod api;
pub mod tool;

use std::collections::BTreeSet;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::domain::NormalizedDomain;
use crate::error::SourceError;
use crate::progress::{SourceHandle, SourceStatus};

/// Resolved result of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Success(BTreeSet<NormalizedDomain>),
    Failure(String),
    TimedOut,
    Cancelled,
}

impl UnitOutcome {
    pub fn status(&self) -> SourceStatus {
        match self {
            UnitOutcome::Success(_) => SourceStatus::Completed,
            UnitOutcome::TimedOut => SourceStatus::Timeout,
            UnitOutcome::Failure(_) | UnitOutcome::Cancelled => SourceStatus::Failed,
        }
    }

    /// Number of valid subdomains this unit reported.
    pub fn found(&self) -> usize {
        match self {
            UnitOutcome::Success(found) => found.len(),
            _ => 0,
        }
    }

    /// Degrade to the (possibly empty) discovered set.
    pub fn into_domains(self) -> BTreeSet<NormalizedDomain> {
        match self {
            UnitOutcome::Success(found) => found,
            _ => BTreeSet::new(),
        }
    }

    /// Log a source fault and classify it.
    pub(crate) fn from_error(source: &str, err: SourceError) -> Self {
        if err.is_timeout() {
            warn!(source = %source, "Task timed out: {}", err);
            return UnitOutcome::TimedOut;
        }

        match &err {
            SourceError::ExecutableNotFound(_) => {
                error!(source = %source, "{}; make sure the tool is installed", err)
            }
            _ => error!(source = %source, "Task failed: {}", err),
        }
        UnitOutcome::Failure(err.to_string())
    }
}

/// Everything a runner needs for one unit.
pub struct UnitContext<'a> {
    pub domain: &'a NormalizedDomain,
    pub timeout: Duration,
    pub progress: SourceHandle<'a>,
    pub cancel: &'a CancellationToken,
}

/// Mark the unit running, race it against cancellation and record the
/// terminal status.
pub(crate) async fn supervise<F>(ctx: &UnitContext<'_>, work: F) -> UnitOutcome
where
    F: Future<Output = UnitOutcome>,
{
    ctx.progress.start().await;
    let started = Instant::now();

    let outcome = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => UnitOutcome::Cancelled,
        outcome = work => outcome,
    };

    debug!(
        source = %ctx.progress.name(),
        domain = %ctx.domain,
        status = %outcome.status(),
        found = outcome.found(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Unit finished"
    );

    ctx.progress.finish(outcome.found(), outcome.status()).await;
    outcome
}

/// Keep valid, normalized entries from raw candidate strings.
pub(crate) fn collect_valid<I, S>(source: &str, candidates: I) -> BTreeSet<NormalizedDomain>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut rejected = 0usize;
    let found: BTreeSet<NormalizedDomain> = candidates
        .into_iter()
        .filter(|candidate| !candidate.as_ref().trim().is_empty())
        .filter_map(|candidate| {
            let parsed = NormalizedDomain::parse(candidate.as_ref());
            if parsed.is_none() {
                rejected += 1;
            }
            parsed
        })
        .collect();

    if rejected > 0 {
        debug!(source = %source, rejected, "Dropped invalid domain candidates");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressTracker;

    fn domains(items: &[&str]) -> BTreeSet<NormalizedDomain> {
        items
            .iter()
            .filter_map(|item| NormalizedDomain::parse(item))
            .collect()
    }

    #[test]
    fn outcome_status_mapping() {
        assert_eq!(
            UnitOutcome::Success(BTreeSet::new()).status(),
            SourceStatus::Completed
        );
        assert_eq!(UnitOutcome::TimedOut.status(), SourceStatus::Timeout);
        assert_eq!(
            UnitOutcome::Failure("boom".into()).status(),
            SourceStatus::Failed
        );
        assert_eq!(UnitOutcome::Cancelled.status(), SourceStatus::Failed);
        assert!(UnitOutcome::TimedOut.into_domains().is_empty());
    }

    #[test]
    fn collect_valid_filters_and_normalizes() {
        let found = collect_valid(
            "test",
            ["*.API.example.com", "", "bad_host.example.com", "10.0.0.1", "www.example.com"],
        );
        assert_eq!(found, domains(&["api.example.com", "www.example.com"]));
    }

    #[tokio::test]
    async fn supervise_reports_cancellation() {
        let tracker = ProgressTracker::default();
        tracker.register(&["slow"]).await;
        let domain = NormalizedDomain::parse("example.com").expect("valid");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let ctx = UnitContext {
            domain: &domain,
            timeout: Duration::from_secs(5),
            progress: tracker.source("slow"),
            cancel: &cancel,
        };
        let outcome = supervise(&ctx, std::future::pending()).await;

        assert_eq!(outcome, UnitOutcome::Cancelled);
        assert_eq!(tracker.snapshot().await["slow"].status, SourceStatus::Failed);
    }
}
