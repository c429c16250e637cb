//! Splitting one commit into two
//!
//! The user picks part of the commit's changes on top of its parent; that
//! becomes the first commit. The second commit has the original tree and
//! the first commit as its parent, so together they end where the original
//! ended.

use crate::context::RewriteContext;
use crate::diff;
use crate::error::{HistoryError, Result};
use crate::object::ObjectId;
use crate::reconstruct;
use crate::select::{HunkSelector, PathFilter, SelectOptions};
use crate::snapshot::StagingArea;
use crate::storage::ObjectStoreExt;

pub const SPLIT_ACTION: &str = "split-out";

/// Split `original` into two commits, returned oldest first.
pub async fn split_commit(
    ctx: &RewriteContext<'_>,
    selector: &dyn HunkSelector,
    original: ObjectId,
    filter: &PathFilter,
) -> Result<(ObjectId, ObjectId)> {
    let commit = ctx.store.load_commit(original).await?;
    let parent = commit.parents.first().copied();
    let parent_tree = ctx.store.commit_tree_id(parent).await?;
    let original_tree = commit.tree_id;

    let changes: Vec<_> = diff::diff_trees(ctx.store, parent_tree, original_tree)
        .await?
        .into_iter()
        .filter(|c| filter.matches(&c.path))
        .collect();

    let mut staging = StagingArea::from_tree(ctx.store, parent_tree).await?;
    selector.select(&mut staging, &changes, filter, SelectOptions { allow_edit: false })?;
    let split_tree = staging.write_tree(ctx.store).await?;

    if split_tree == parent_tree {
        return Err(HistoryError::EmptyResult("split commit is empty".into()));
    }
    if split_tree == original_tree {
        return Err(HistoryError::EmptyResult(
            "split commit tree matches original commit".into(),
        ));
    }

    let first = reconstruct::reconstruct(ctx, split_tree, &commit, commit.parents.clone(), SPLIT_ACTION).await?;
    let second = reconstruct::reconstruct(ctx, original_tree, &commit, vec![first], SPLIT_ACTION).await?;
    tracing::info!(
        "split {} into {} and {}",
        original.short(),
        first.short(),
        second.short()
    );
    Ok((first, second))
}
