use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no GitHub token: pass --github-token or set GITHUB_TOKEN")]
    MissingToken,
    #[error("no pull request number: pass --pull-request or run on a pull_request event")]
    MissingPullRequest,
    #[error("failed to read event payload {path}: {source}")]
    EventRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse event payload {path}: {source}")]
    EventParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Inputs fall back to the `INPUT_*` variables GitHub Actions sets for a step.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "flow-coverage",
    version,
    about = "Report Flow type-coverage deltas for the files changed in a pull request"
)]
pub struct Cli {
    /// Token for the GitHub API (falls back to GITHUB_TOKEN).
    #[arg(long, env = "INPUT_GITHUB-TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Regex selecting which changed files are measured.
    #[arg(long, env = "INPUT_PATTERN", default_value = r"\.jsx?$")]
    pub pattern: String,

    /// Largest tolerated coverage drop per file, in percentage points.
    /// A non-numeric value disables the check.
    #[arg(long, env = "INPUT_THRESHOLD", default_value = "", allow_hyphen_values = true)]
    pub threshold: String,

    /// Subdirectory of the checkouts where the coverage tool runs.
    #[arg(long, env = "INPUT_PATH", default_value = "")]
    pub path: String,

    /// Command used to launch flow (e.g. "yarn", "npx").
    #[arg(long, env = "INPUT_PACKAGE-MANAGER", default_value = "yarn")]
    pub package_manager: String,

    /// Checkout of the pull request head.
    #[arg(long, default_value = "head")]
    pub head_dir: PathBuf,

    /// Checkout of the pull request base.
    #[arg(long, default_value = "base")]
    pub base_dir: PathBuf,

    /// Repository in owner/repo form.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: String,

    /// Pull request number (read from the event payload if omitted).
    #[arg(long)]
    pub pull_request: Option<u64>,

    /// Event payload of the triggering workflow run.
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// Maximum coverage processes per revision (0 = one per file).
    #[arg(long, default_value = "0")]
    pub concurrency: usize,

    /// Print the comment instead of posting it.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Deserialize)]
struct EventPayload {
    pull_request: Option<EventPullRequest>,
}

#[derive(Deserialize)]
struct EventPullRequest {
    number: u64,
}

impl Cli {
    /// The explicit token, else `GITHUB_TOKEN`.
    pub fn token(&self) -> Result<String, ConfigError> {
        self.github_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
            .ok_or(ConfigError::MissingToken)
    }

    /// The explicit number, else `pull_request.number` from the event payload.
    pub fn pull_request_number(&self) -> Result<u64, ConfigError> {
        if let Some(number) = self.pull_request {
            return Ok(number);
        }
        match &self.event_path {
            Some(path) => read_event_number(path)?.ok_or(ConfigError::MissingPullRequest),
            None => Err(ConfigError::MissingPullRequest),
        }
    }
}

fn read_event_number(path: &Path) -> Result<Option<u64>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::EventRead {
        path: path.to_path_buf(),
        source,
    })?;
    let payload: EventPayload =
        serde_json::from_str(&content).map_err(|source| ConfigError::EventParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(payload.pull_request.map(|pr| pr.number))
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
