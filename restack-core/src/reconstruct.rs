//! Building a replacement commit from an existing one
//!
//! The replacement keeps the source's author (name, email and timestamp)
//! and its extra headers, minus signatures: a rewritten commit is never
//! presented as carrying the original's signature.

use crate::context::RewriteContext;
use crate::diff;
use crate::editor;
use crate::error::Result;
use crate::object::{Commit, ObjectId};
use crate::storage::ObjectStoreExt;

fn rebuild(
    ctx: &RewriteContext<'_>,
    tree_id: ObjectId,
    source: &Commit,
    parents: Vec<ObjectId>,
    message: String,
) -> Commit {
    Commit {
        tree_id,
        parents,
        author: source.author.clone(),
        committer: ctx.committer_for(source),
        message,
        extra_headers: source.unsigned_headers(),
    }
}

/// Create a commit with `tree_id` and `parents` from `source`, letting the
/// user edit the message. `action` names the operation in the template hint.
pub async fn reconstruct(
    ctx: &RewriteContext<'_>,
    tree_id: ObjectId,
    source: &Commit,
    parents: Vec<ObjectId>,
    action: &str,
) -> Result<ObjectId> {
    let base_tree = ctx.store.commit_tree_id(parents.first().copied()).await?;
    let changes = diff::diff_trees(ctx.store, base_tree, tree_id).await?;
    let message = editor::compose_message(
        ctx.editor,
        source.body(),
        action,
        &changes,
        ctx.options.comment_char,
    )?;

    let commit = rebuild(ctx, tree_id, source, parents, message);
    let id = ctx.store.store_commit(commit).await?;
    tracing::debug!("wrote {} commit {}", action, id.short());
    Ok(id)
}

/// Create a commit with `tree_id` and `parents` from `source`, keeping the
/// message verbatim.
pub async fn recreate(
    ctx: &RewriteContext<'_>,
    tree_id: ObjectId,
    source: &Commit,
    parents: Vec<ObjectId>,
) -> Result<ObjectId> {
    let commit = rebuild(ctx, tree_id, source, parents, source.message.clone());
    Ok(ctx.store.store_commit(commit).await?)
}
