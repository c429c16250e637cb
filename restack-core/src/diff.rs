//! Path-level differences between two snapshots

use std::fmt;

use crate::object::ObjectId;
use crate::snapshot::{self, FileEntry, FlatTree};
use crate::storage::{ObjectStore, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Added => "new file",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

/// One changed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old: Option<FileEntry>,
    pub new: Option<FileEntry>,
}

/// Changes turning `old` into `new`, sorted by path.
pub fn diff_flat(old: &FlatTree, new: &FlatTree) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for (path, before) in old {
        match new.get(path) {
            None => changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Deleted,
                old: Some(*before),
                new: None,
            }),
            Some(after) if after != before => changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Modified,
                old: Some(*before),
                new: Some(*after),
            }),
            Some(_) => {}
        }
    }
    for (path, after) in new {
        if !old.contains_key(path) {
            changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Added,
                old: None,
                new: Some(*after),
            });
        }
    }
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Changes between the trees `old` and `new`.
pub async fn diff_trees<S: ObjectStore + ?Sized>(
    store: &S,
    old: ObjectId,
    new: ObjectId,
) -> Result<Vec<FileChange>> {
    if old == new {
        return Ok(Vec::new());
    }
    let before = snapshot::flatten(store, old).await?;
    let after = snapshot::flatten(store, new).await?;
    Ok(diff_flat(&before, &after))
}

/// Status block appended to a commit message template, every line
/// prefixed with `comment_char`.
pub fn status_summary(changes: &[FileChange], comment_char: char) -> String {
    let mut out = String::new();
    if changes.is_empty() {
        out.push_str(&format!("{} No changes\n", comment_char));
        return out;
    }
    out.push_str(&format!("{} Changes to be committed:\n", comment_char));
    for change in changes {
        out.push_str(&format!(
            "{}\t{:<12}{}\n",
            comment_char,
            format!("{}:", change.kind),
            change.path
        ));
    }
    out
}
