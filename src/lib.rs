pub mod classify;
pub mod cli;
pub mod coverage;
pub mod delta;
pub mod github;
pub mod publish;
pub mod render;
pub mod runner;

use std::collections::HashMap;
use std::fmt;

/// A file touched by the pull request, as listed by the hosting API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub filename: String,
    /// Free-form status ("added", "modified", "removed", "renamed", ...).
    pub status: String,
}

impl FileChange {
    pub fn new(filename: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            status: status.into(),
        }
    }
}

/// Which side of the pull request a coverage sample was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Revision {
    Base,
    Head,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Base => f.write_str("base"),
            Revision::Head => f.write_str("head"),
        }
    }
}

/// A coverage percentage as reported by the coverage tool.
///
/// The raw text is kept verbatim because label rows print it unformatted.
/// `value` is `None` when the text is not a number.
#[derive(Debug, Clone, PartialEq)]
pub struct Percent {
    pub raw: String,
    pub value: Option<f64>,
}

impl Percent {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        Self { raw, value }
    }
}

impl From<f64> for Percent {
    fn from(value: f64) -> Self {
        Self {
            raw: value.to_string(),
            value: Some(value),
        }
    }
}

/// Coverage for every sampled file of one revision.
pub type CoverageMap = HashMap<String, Percent>;

/// One file's entry in the delta map: numeric XOR label.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaEntry {
    /// head% - base%, unrounded.
    Delta(f64),
    /// One side was unparseable so the subtraction has no numeric value.
    NotANumber,
    /// Status of a file that was not modified ("added", "removed", ...).
    Status(String),
}

impl DeltaEntry {
    /// The text shown in the Delta column for non-numeric entries.
    pub fn label(&self) -> Option<&str> {
        match self {
            DeltaEntry::Delta(_) => None,
            DeltaEntry::NotANumber => Some("NaN"),
            DeltaEntry::Status(status) => Some(status),
        }
    }
}

/// Rendered Markdown table plus the threshold verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub table: String,
    pub passes_threshold: bool,
}
