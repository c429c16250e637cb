//! Choosing which changes go into the first half of a split
//!
//! A [`HunkSelector`] is handed the changes of the commit being split and a
//! staging area seeded with the commit's parent; whatever it stages becomes
//! the first commit.

use crate::diff::{ChangeKind, FileChange};
use crate::error::Result;
use crate::snapshot::StagingArea;

/// Restricts which paths a selection may touch
///
/// An empty filter matches everything; otherwise a path matches if it
/// equals an entry or lies below an entry that names a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    patterns: Vec<String>,
}

impl PathFilter {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim_start_matches("./").trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty() && p != ".")
            .collect();
        Self { patterns }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.is_empty()
            || self.patterns.iter().any(|p| {
                path == p || (path.starts_with(p.as_str()) && path.as_bytes().get(p.len()) == Some(&b'/'))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    /// Offer to hand-edit a change before staging it
    pub allow_edit: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self { allow_edit: true }
    }
}

/// Stages a chosen subset of `changes` into `staging`
pub trait HunkSelector: Send + Sync {
    /// `changes` are already restricted to `filter`. Returning an error
    /// (typically [`crate::HistoryError::EditAborted`]) abandons the split.
    fn select(
        &self,
        staging: &mut StagingArea,
        changes: &[FileChange],
        filter: &PathFilter,
        options: SelectOptions,
    ) -> Result<()>;
}

/// Apply a single change to the staging area.
pub fn stage_change(staging: &mut StagingArea, change: &FileChange) {
    match (change.kind, change.new) {
        (ChangeKind::Deleted, _) | (_, None) => {
            staging.unstage(&change.path);
        }
        (_, Some(file)) => staging.stage(&change.path, file),
    }
}

/// Selects every change the filter lets through, without asking
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterSelector;

impl HunkSelector for FilterSelector {
    fn select(
        &self,
        staging: &mut StagingArea,
        changes: &[FileChange],
        filter: &PathFilter,
        _options: SelectOptions,
    ) -> Result<()> {
        for change in changes.iter().filter(|c| filter.matches(&c.path)) {
            stage_change(staging, change);
        }
        Ok(())
    }
}
