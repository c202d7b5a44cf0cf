use crate::{CoverageMap, Percent, Revision};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("failed to run coverage for {filename}: {source}")]
    Spawn {
        filename: String,
        #[source]
        source: std::io::Error,
    },
    #[error("coverage command failed for {filename} ({revision}): {stderr}")]
    CommandFailed {
        filename: String,
        revision: Revision,
        stderr: String,
    },
    #[error("coverage output for {filename} is not valid UTF-8")]
    Utf8 { filename: String },
    #[error("coverage worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, CoverageError>;

/// Something that can report a file's coverage at a revision.
///
/// Implementations must be shareable across threads: samples are taken in
/// parallel.
pub trait CoverageSource: Sync {
    fn coverage(&self, revision: Revision, filename: &str) -> Result<Percent>;
}

/// Runs `<package-manager> flow coverage <file>` inside a revision checkout.
#[derive(Debug, Clone)]
pub struct FlowCoverage {
    pub package_manager: String,
    /// Subdirectory inside each checkout; stripped from filenames.
    pub path: String,
    pub base_dir: PathBuf,
    pub head_dir: PathBuf,
}

impl FlowCoverage {
    fn checkout(&self, revision: Revision) -> &Path {
        match revision {
            Revision::Base => &self.base_dir,
            Revision::Head => &self.head_dir,
        }
    }

    /// Working directory and tool argument for one file.
    pub fn invocation(&self, revision: Revision, filename: &str) -> (PathBuf, String) {
        let root = self.checkout(revision);
        if self.path.is_empty() {
            return (root.to_path_buf(), filename.to_string());
        }
        let clipped = filename.strip_prefix(self.path.as_str()).unwrap_or(filename);
        (root.join(&self.path), clipped.to_string())
    }

    /// The coverage command for one file.
    ///
    /// Without a launcher, `flow` itself is the program.
    pub fn command(&self, revision: Revision, filename: &str) -> Command {
        let (dir, target) = self.invocation(revision, filename);
        let mut parts = self.package_manager.split_whitespace();

        let mut command = match parts.next() {
            Some(launcher) => {
                let mut command = Command::new(launcher);
                command.args(parts).arg("flow");
                command
            }
            None => Command::new("flow"),
        };
        command.arg("coverage").arg(target).current_dir(dir);
        command
    }
}

impl CoverageSource for FlowCoverage {
    fn coverage(&self, revision: Revision, filename: &str) -> Result<Percent> {
        let mut command = self.command(revision, filename);
        tracing::debug!(%revision, file = %filename, ?command, "running flow coverage");

        // Run the tool inside the checkout
        let output = command.output().map_err(|source| CoverageError::Spawn {
            filename: filename.to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(CoverageError::CommandFailed {
                filename: filename.to_string(),
                revision,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Only the percentage matters; the rest of the output is ignored
        let stdout = String::from_utf8(output.stdout).map_err(|_| CoverageError::Utf8 {
            filename: filename.to_string(),
        })?;
        Ok(parse_percent(&stdout))
    }
}

/// Extract the percentage from coverage tool output.
///
/// The value sits between the first `": "` and the next `%`. Output without
/// those markers gives an unparseable `Percent` with empty raw text.
pub fn parse_percent(stdout: &str) -> Percent {
    let raw = stdout
        .find(": ")
        .map(|i| &stdout[i + 2..])
        .and_then(|rest| rest.find('%').map(|end| &rest[..end]))
        .unwrap_or("");

    let percent = Percent::parse(raw);
    if percent.value.is_none() {
        tracing::warn!(output = %stdout.trim(), "could not parse coverage percentage");
    }
    percent
}

/// Sample every file of one revision, at most `concurrency` at a time.
///
/// All samples are collected before returning; the first failure aborts the
/// revision. A `concurrency` of zero means one worker per file.
pub fn sample_revision(
    source: &dyn CoverageSource,
    revision: Revision,
    files: &[String],
    concurrency: usize,
) -> Result<CoverageMap> {
    if files.is_empty() {
        return Ok(CoverageMap::new());
    }

    let workers = match concurrency {
        0 => files.len(),
        n => n.min(files.len()),
    };
    let chunk_size = files.len().div_ceil(workers);

    let results: Vec<Result<Vec<(String, Percent)>>> = std::thread::scope(|s| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                s.spawn(move || {
                    chunk
                        .iter()
                        .map(|f| source.coverage(revision, f).map(|p| (f.clone(), p)))
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(CoverageError::WorkerPanicked)))
            .collect()
    });

    let mut map = CoverageMap::with_capacity(files.len());
    for chunk in results {
        map.extend(chunk?);
    }

    tracing::info!(%revision, files = map.len(), "collected coverage samples");
    Ok(map)
}

/// Sample base and head concurrently.
pub fn sample_both(
    source: &dyn CoverageSource,
    base_files: &[String],
    head_files: &[String],
    concurrency: usize,
) -> Result<(CoverageMap, CoverageMap)> {
    std::thread::scope(|s| {
        let base = s.spawn(|| sample_revision(source, Revision::Base, base_files, concurrency));
        let head = sample_revision(source, Revision::Head, head_files, concurrency)?;
        let base = base.join().unwrap_or(Err(CoverageError::WorkerPanicked))?;
        Ok((base, head))
    })
}
