use anyhow::{Context, Result};
use std::process::ExitCode;

use flow_coverage::cli::{self, Cli};
use flow_coverage::coverage::FlowCoverage;
use flow_coverage::github::{GitHubClient, PullRequest};
use flow_coverage::publish::comment_body;
use flow_coverage::runner::{self, PublishStatus, RunOptions, RunOutcome};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    match handle_run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            fail(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

/// Run the report and print failure markers. Returns whether the step passes.
fn handle_run(args: &Cli) -> Result<bool> {
    let number = args.pull_request_number()?;
    let pull = PullRequest::from_repository(&args.repository, number)?;
    let token = args.token()?;
    let host = GitHubClient::new(&args.api_url, &token, pull)
        .context("Failed to create GitHub client")?;

    let source = FlowCoverage {
        package_manager: args.package_manager.clone(),
        path: args.path.clone(),
        base_dir: args.base_dir.clone(),
        head_dir: args.head_dir.clone(),
    };
    let options = RunOptions {
        pattern: args.pattern.clone(),
        threshold: args.threshold.clone(),
        concurrency: args.concurrency,
        dry_run: args.dry_run,
    };

    let outcome = runner::run(&host, &source, &options)?;

    let (report, publish) = match &outcome {
        RunOutcome::NoChanges => {
            println!("No changed files match {}", args.pattern);
            return Ok(true);
        }
        RunOutcome::Reported { report, publish } => (report, publish),
    };

    if args.dry_run {
        println!("{}", comment_body(&report.table));
    } else {
        println!("{}", report.table);
    }

    // The exit status follows the threshold verdict alone.
    if let PublishStatus::Failed(message) = publish {
        println!("::warning::Failed to publish coverage comment: {}", message);
    }
    if !outcome.passes_threshold() {
        fail(&format!(
            "A file does not pass the flow threshold of {}",
            args.threshold
        ));
        return Ok(false);
    }

    Ok(true)
}

/// Emit a GitHub Actions error annotation.
fn fail(message: &str) {
    println!("::error::{}", message);
}
