//! Replaying a commit on top of a rewritten base
//!
//! The commit's change (its tree relative to its parent's) is re-applied
//! with a three-way merge. A commit whose change disappears in the merge
//! collapses into its new base; a commit that never changed anything is
//! kept as it was.

use std::collections::HashMap;

use crate::context::RewriteContext;
use crate::error::{HistoryError, Result};
use crate::object::ObjectId;
use crate::reconstruct;
use crate::storage::ObjectStoreExt;

/// Original commit id to the id that replaced it in this rewrite
pub type ReplayMap = HashMap<ObjectId, ObjectId>;

/// What became of a replayed commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replayed {
    /// A new commit was written
    Created(ObjectId),
    /// The change was already contained in the base; this is the base
    Collapsed(ObjectId),
}

impl Replayed {
    pub fn id(&self) -> ObjectId {
        match self {
            Replayed::Created(id) | Replayed::Collapsed(id) => *id,
        }
    }
}

/// Replay `pickme` onto the replayed version of its parent, or onto `onto`
/// if its parent was not replayed in this rewrite.
pub async fn replay(
    ctx: &RewriteContext<'_>,
    pickme: ObjectId,
    replay_map: &ReplayMap,
    onto: ObjectId,
) -> Result<Replayed> {
    let commit = ctx.store.load_commit(pickme).await?;
    let base = commit.sole_parent().ok_or_else(|| {
        HistoryError::Topology(format!(
            "cannot replay {}: expected exactly one parent, found {}",
            pickme,
            commit.parents.len()
        ))
    })?;
    let replayed_base = replay_map.get(&base).copied().unwrap_or(onto);

    let base_tree = ctx.store.load_commit(base).await?.tree_id;
    let replayed_base_tree = ctx.store.load_commit(replayed_base).await?.tree_id;
    let pickme_tree = commit.tree_id;

    let result = ctx
        .merger
        .merge(ctx.store, base_tree, replayed_base_tree, pickme_tree)
        .await?;
    if !result.clean {
        tracing::debug!("replay of {} conflicts in {:?}", pickme.short(), result.conflicts);
        return Err(HistoryError::Conflict {
            commit: pickme,
            paths: result.conflicts,
        });
    }

    if result.tree_id == replayed_base_tree && pickme_tree != base_tree {
        tracing::warn!(
            "dropping {} ({}): its changes are already in {}",
            pickme.short(),
            commit.subject(),
            replayed_base.short()
        );
        return Ok(Replayed::Collapsed(replayed_base));
    }

    let id = reconstruct::recreate(ctx, result.tree_id, &commit, vec![replayed_base]).await?;
    tracing::debug!("replayed {} as {} onto {}", pickme.short(), id.short(), replayed_base.short());
    Ok(Replayed::Created(id))
}
