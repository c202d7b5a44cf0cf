use crate::classify::{self, PatternError};
use crate::coverage::{self, CoverageError, CoverageSource};
use crate::delta::{self, DeltaError};
use crate::github::{GitHubError, PullRequestHost};
use crate::publish::{self, PublishOutcome};
use crate::{Report, render};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Hosting(#[from] GitHubError),
    #[error(transparent)]
    Coverage(#[from] CoverageError),
    #[error(transparent)]
    MissingSample(#[from] DeltaError),
}

pub type Result<T> = std::result::Result<T, RunError>;

/// Settings the run needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub pattern: String,
    pub threshold: String,
    pub concurrency: usize,
    /// Render only; do not touch pull request comments.
    pub dry_run: bool,
}

/// What happened to the rendered report on the pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    Skipped,
    Done(PublishOutcome),
    /// Posting failed; the verdict still stands.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No changed file matched the pattern; nothing was measured or posted.
    NoChanges,
    Reported {
        report: Report,
        publish: PublishStatus,
    },
}

impl RunOutcome {
    pub fn passes_threshold(&self) -> bool {
        match self {
            RunOutcome::NoChanges => true,
            RunOutcome::Reported { report, .. } => report.passes_threshold,
        }
    }
}

/// List, classify, sample, diff, render and publish.
///
/// A hosting error while listing files aborts before any coverage work. A
/// failure to post the comment does not discard the report. The threshold
/// verdict is returned, not raised; the caller decides the exit status.
pub fn run(
    host: &dyn PullRequestHost,
    source: &dyn CoverageSource,
    options: &RunOptions,
) -> Result<RunOutcome> {
    // Fetch and classify the changed files
    let pattern = classify::build_pattern(&options.pattern)?;
    let files = host.list_files()?;
    let changes = classify::classify(&files, &pattern);

    if changes.is_empty() {
        tracing::info!(pattern = %options.pattern, "no changed files match, nothing to report");
        return Ok(RunOutcome::NoChanges);
    }

    // Measure base and head; modified files on both sides, added files on head only
    let (base, head) = coverage::sample_both(
        source,
        &changes.modified,
        &changes.head_files(),
        options.concurrency,
    )?;

    // Diff and render
    let deltas = delta::compute_deltas(&base, &head, &changes.modified, &changes.labelled())?;
    let report = render::render(&deltas, &head, &options.threshold);
    tracing::info!(
        rows = deltas.len(),
        passes = report.passes_threshold,
        "rendered coverage report"
    );

    // Post or update the report comment
    let publish_status = if options.dry_run {
        PublishStatus::Skipped
    } else {
        match publish::publish(host, &report.table) {
            Ok(outcome) => PublishStatus::Done(outcome),
            Err(err) => {
                tracing::error!(error = %err, "failed to publish coverage report");
                PublishStatus::Failed(err.to_string())
            }
        }
    };

    Ok(RunOutcome::Reported {
        report,
        publish: publish_status,
    })
}
