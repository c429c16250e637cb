//! The `reword` and `split` rewrites
//!
//! Both follow the same shape: gather the chain from the target commit to
//! the branch tip, build replacement(s) for the target, splice them into
//! the chain, then replay the rest on top and move the branch.

use crate::collect;
use crate::context::RewriteContext;
use crate::error::Result;
use crate::reconstruct;
use crate::select::{HunkSelector, PathFilter};
use crate::splice::{self, RewriteOutcome};
use crate::split;
use crate::storage::ObjectStoreExt;

/// Template hint for reworded commits
pub const REWORD_ACTION: &str = "reworded";

/// A rewrite context paired with the hunk selector `split` needs
pub struct Rewriter<'a> {
    ctx: RewriteContext<'a>,
    selector: &'a dyn HunkSelector,
}

impl<'a> Rewriter<'a> {
    pub fn new(ctx: RewriteContext<'a>, selector: &'a dyn HunkSelector) -> Self {
        Self { ctx, selector }
    }

    pub fn context(&self) -> &RewriteContext<'a> {
        &self.ctx
    }

    pub async fn reword(&self, revision: &str) -> Result<RewriteOutcome> {
        reword(&self.ctx, revision).await
    }

    pub async fn split(&self, revision: &str, filter: &PathFilter) -> Result<RewriteOutcome> {
        split(&self.ctx, self.selector, revision, filter).await
    }
}

/// Edit the message of `revision` and rebuild everything after it.
pub async fn reword(ctx: &RewriteContext<'_>, revision: &str) -> Result<RewriteOutcome> {
    let target = collect::gather(ctx.store, ctx.refs, &ctx.options.branch, revision).await?;
    let original = ctx.store.load_commit(target.original).await?;

    let rewritten = reconstruct::reconstruct(
        ctx,
        original.tree_id,
        &original,
        original.parents.clone(),
        REWORD_ACTION,
    )
    .await?;

    let mut chain = target.chain;
    splice::splice(&mut chain, target.original, &[rewritten])?;
    splice::apply(ctx, &chain, target.parent, target.head, "reword").await
}

/// Split `revision` into two commits, the first holding the changes the
/// selector picks among paths matching `filter`.
pub async fn split(
    ctx: &RewriteContext<'_>,
    selector: &dyn HunkSelector,
    revision: &str,
    filter: &PathFilter,
) -> Result<RewriteOutcome> {
    let target = collect::gather(ctx.store, ctx.refs, &ctx.options.branch, revision).await?;
    let (first, second) = split::split_commit(ctx, selector, target.original, filter).await?;

    let mut chain = target.chain;
    splice::splice(&mut chain, target.original, &[first, second])?;
    splice::apply(ctx, &chain, target.parent, target.head, "split").await
}
