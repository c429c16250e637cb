//! Three-way snapshot merge
//!
//! The replay engine only depends on [`TreeMerger`]; [`PathMerger`] is the
//! built-in implementation and resolves whole files, never hunks.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::object::ObjectId;
use crate::snapshot::{self, FlatTree};
use crate::storage::{ObjectStore, Result};

/// Outcome of a three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// No path changed differently on both sides
    pub clean: bool,
    /// Merged tree; on conflict it holds the left side at conflicting paths
    pub tree_id: ObjectId,
    /// Conflicting paths, sorted
    pub conflicts: Vec<String>,
}

impl MergeResult {
    fn clean(tree_id: ObjectId) -> Self {
        Self {
            clean: true,
            tree_id,
            conflicts: Vec::new(),
        }
    }
}

/// Merges `left` and `right`, two descendants of `ancestor`
#[async_trait]
pub trait TreeMerger: Send + Sync {
    async fn merge(
        &self,
        store: &dyn ObjectStore,
        ancestor: ObjectId,
        left: ObjectId,
        right: ObjectId,
    ) -> Result<MergeResult>;
}

/// Whole-file three-way merge
///
/// For every path: if only one side changed it relative to the ancestor,
/// that side wins; if both sides made the same change, it is taken once;
/// anything else (including edit-versus-delete) is a conflict.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathMerger;

impl PathMerger {
    pub fn merge_flat(ancestor: &FlatTree, left: &FlatTree, right: &FlatTree) -> (FlatTree, Vec<String>) {
        let paths: BTreeSet<&String> = ancestor.keys().chain(left.keys()).chain(right.keys()).collect();
        let mut merged = FlatTree::new();
        let mut conflicts = Vec::new();

        for path in paths {
            let base = ancestor.get(path);
            let ours = left.get(path);
            let theirs = right.get(path);

            let chosen = if ours == theirs || theirs == base {
                ours
            } else if ours == base {
                theirs
            } else {
                conflicts.push(path.clone());
                ours
            };
            if let Some(file) = chosen {
                merged.insert(path.clone(), *file);
            }
        }

        // One side's file against the other side's directory: keep the left
        // side under that name and report it.
        for path in snapshot::path_clashes(&merged) {
            let dir = format!("{}/", path);
            let at_or_below = |p: &String| p == &path || p.starts_with(&dir);
            merged.retain(|p, _| !at_or_below(p));
            merged.extend(left.iter().filter(|(p, _)| at_or_below(*p)).map(|(p, f)| (p.clone(), *f)));
            conflicts.push(path);
        }
        conflicts.sort();
        conflicts.dedup();
        (merged, conflicts)
    }
}

#[async_trait]
impl TreeMerger for PathMerger {
    async fn merge(
        &self,
        store: &dyn ObjectStore,
        ancestor: ObjectId,
        left: ObjectId,
        right: ObjectId,
    ) -> Result<MergeResult> {
        if left == right || right == ancestor {
            return Ok(MergeResult::clean(left));
        }
        if left == ancestor {
            return Ok(MergeResult::clean(right));
        }

        let base = snapshot::flatten(store, ancestor).await?;
        let ours = snapshot::flatten(store, left).await?;
        let theirs = snapshot::flatten(store, right).await?;

        let (merged, conflicts) = Self::merge_flat(&base, &ours, &theirs);
        let tree_id = snapshot::write_tree(store, &merged).await?;
        Ok(MergeResult {
            clean: conflicts.is_empty(),
            tree_id,
            conflicts,
        })
    }
}
