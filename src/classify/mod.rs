use crate::FileChange;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid file pattern {pattern:?}: {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Files of a pull request that matched the pattern, split by status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    /// Every other status, kept verbatim. Includes nothing from `modified`.
    pub others: Vec<(String, String)>,
    /// All matching files with their status, in listing order.
    pub matched: Vec<FileChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Files whose head coverage is sampled: modified first, then added.
    pub fn head_files(&self) -> Vec<String> {
        self.modified.iter().chain(&self.added).cloned().collect()
    }

    /// Non-modified files with their status, in listing order.
    ///
    /// This is what gets a label entry in the delta map, so added files are
    /// included here as well.
    pub fn labelled(&self) -> Vec<(String, String)> {
        self.matched
            .iter()
            .filter(|f| f.status != "modified")
            .map(|f| (f.filename.clone(), f.status.clone()))
            .collect()
    }
}

/// Compile the filename filter: case-insensitive and multi-line.
pub fn build_pattern(pattern: &str) -> Result<Regex, PatternError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source,
        })
}

/// Drop files not matching `pattern` and partition the rest by status.
///
/// Only the exact statuses "modified" and "added" are recognized; anything
/// else lands in `others` with its status preserved.
pub fn classify(files: &[FileChange], pattern: &Regex) -> ChangeSet {
    let mut set = ChangeSet::default();

    for file in files.iter().filter(|f| pattern.is_match(&f.filename)) {
        match file.status.as_str() {
            "modified" => set.modified.push(file.filename.clone()),
            "added" => set.added.push(file.filename.clone()),
            other => set.others.push((file.filename.clone(), other.to_string())),
        }
        set.matched.push(file.clone());
    }

    tracing::info!(
        modified = set.modified.len(),
        added = set.added.len(),
        others = set.others.len(),
        skipped = files.len() - set.matched.len(),
        "classified pull request files"
    );

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<FileChange> {
        vec![
            FileChange::new("src/a.js", "modified"),
            FileChange::new("src/b.JS", "added"),
            FileChange::new("README.md", "modified"),
            FileChange::new("src/c.js", "removed"),
            FileChange::new("src/d.jsx", "renamed"),
        ]
    }

    #[test]
    fn partitions_by_status() {
        let pattern = build_pattern(r"\.jsx?$").unwrap();
        let set = classify(&files(), &pattern);

        assert_eq!(set.modified, vec!["src/a.js"]);
        assert_eq!(set.added, vec!["src/b.JS"]);
        assert_eq!(
            set.others,
            vec![
                ("src/c.js".to_string(), "removed".to_string()),
                ("src/d.jsx".to_string(), "renamed".to_string()),
            ]
        );
    }

    #[test]
    fn non_matching_files_are_excluded() {
        let pattern = build_pattern(r"\.js$").unwrap();
        let set = classify(&files(), &pattern);

        assert!(set.matched.iter().all(|f| f.filename != "README.md"));
        assert!(set.matched.iter().all(|f| f.filename != "src/d.jsx"));
        assert_eq!(set.matched.len(), 3);
    }

    #[test]
    fn pattern_is_case_insensitive() {
        let pattern = build_pattern(r"\.js$").unwrap();
        assert!(pattern.is_match("lib/Foo.JS"));
    }

    #[test]
    fn status_match_is_exact() {
        let pattern = build_pattern(".*").unwrap();
        let set = classify(&[FileChange::new("a.js", "Modified")], &pattern);

        assert!(set.modified.is_empty());
        assert_eq!(set.others, vec![("a.js".to_string(), "Modified".to_string())]);
    }

    #[test]
    fn empty_when_nothing_matches() {
        let pattern = build_pattern(r"\.py$").unwrap();
        let set = classify(&files(), &pattern);
        assert!(set.is_empty());
    }

    #[test]
    fn head_files_and_labels_follow_listing_order() {
        let pattern = build_pattern(r"\.jsx?$").unwrap();
        let set = classify(&files(), &pattern);

        assert_eq!(set.head_files(), vec!["src/a.js", "src/b.JS"]);
        let labelled: Vec<_> = set.labelled().into_iter().map(|(f, _)| f).collect();
        assert_eq!(labelled, vec!["src/b.JS", "src/c.js", "src/d.jsx"]);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = build_pattern("(").unwrap_err();
        assert!(err.to_string().contains("invalid file pattern"));
    }
}
