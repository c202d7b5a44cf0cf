use crate::{CoverageMap, DeltaEntry, Percent, Revision};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("no {revision} coverage sample for modified file {filename}")]
    MissingSample { filename: String, revision: Revision },
}

pub type Result<T> = std::result::Result<T, DeltaError>;

/// Delta entries keyed by filename, iterated in assembly order.
///
/// Inserting an existing key replaces its entry but keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageDeltas {
    entries: Vec<(String, DeltaEntry)>,
    index: HashMap<String, usize>,
}

impl CoverageDeltas {
    pub fn insert(&mut self, filename: &str, entry: DeltaEntry) {
        match self.index.get(filename) {
            Some(&i) => self.entries[i].1 = entry,
            None => {
                self.index.insert(filename.to_string(), self.entries.len());
                self.entries.push((filename.to_string(), entry));
            }
        }
    }

    pub fn get(&self, filename: &str) -> Option<&DeltaEntry> {
        self.index.get(filename).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeltaEntry)> {
        self.entries.iter().map(|(f, e)| (f.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the delta map in two passes.
///
/// First every modified file gets `head - base`; then every labelled file
/// gets its status, overwriting anything already stored under that name.
/// A modified file missing from either coverage map is an error.
pub fn compute_deltas(
    base: &CoverageMap,
    head: &CoverageMap,
    modified: &[String],
    labelled: &[(String, String)],
) -> Result<CoverageDeltas> {
    let mut deltas = CoverageDeltas::default();

    for filename in modified {
        let head_pct = lookup(head, filename, Revision::Head)?;
        let base_pct = lookup(base, filename, Revision::Base)?;

        let entry = match (head_pct.value, base_pct.value) {
            (Some(h), Some(b)) => DeltaEntry::Delta(h - b),
            _ => {
                tracing::warn!(
                    file = %filename,
                    head = %head_pct.raw,
                    base = %base_pct.raw,
                    "coverage is not numeric, reporting NaN"
                );
                DeltaEntry::NotANumber
            }
        };
        deltas.insert(filename, entry);
    }

    for (filename, status) in labelled {
        deltas.insert(filename, DeltaEntry::Status(status.clone()));
    }

    Ok(deltas)
}

fn lookup<'a>(map: &'a CoverageMap, filename: &str, revision: Revision) -> Result<&'a Percent> {
    map.get(filename).ok_or_else(|| DeltaError::MissingSample {
        filename: filename.to_string(),
        revision,
    })
}
