//! Splicing replacements into a chain and publishing the result

use crate::context::RewriteContext;
use crate::error::{HistoryError, Result};
use crate::object::ObjectId;
use crate::replay::{self, ReplayMap, Replayed};
use crate::storage::ObjectStoreExt;

/// Result of a published rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Branch tip before the rewrite
    pub old_tip: ObjectId,
    /// Branch tip after the rewrite
    pub new_tip: ObjectId,
    /// Rewritten chain, oldest first; collapsed commits are absent
    pub chain: Vec<ObjectId>,
    /// Commits written while replaying
    pub created: usize,
    /// Commits dropped because their change was already in the new base
    pub collapsed: usize,
}

/// Replace the single occurrence of `original` in `chain` with
/// `replacements`, in order.
pub fn splice(chain: &mut Vec<ObjectId>, original: ObjectId, replacements: &[ObjectId]) -> Result<()> {
    let pos = chain
        .iter()
        .position(|id| *id == original)
        .ok_or_else(|| HistoryError::Consistency(format!("could not find commit {} to replace", original)))?;
    chain.splice(pos..=pos, replacements.iter().copied());
    Ok(())
}

/// Replay `chain[1..]` onto `chain[0]` and move the branch to the result.
///
/// `chain[0]` is already rewritten and must have `original_parent` as its
/// parent. The branch only moves if it still points at `original_tip`.
pub async fn apply(
    ctx: &RewriteContext<'_>,
    chain: &[ObjectId],
    original_parent: Option<ObjectId>,
    original_tip: ObjectId,
    action: &str,
) -> Result<RewriteOutcome> {
    let (&base, rest) = chain
        .split_first()
        .ok_or_else(|| HistoryError::Consistency("nothing to apply: empty chain".into()))?;

    let base_parent = ctx.store.load_commit(base).await?.parents.first().copied();
    if base_parent != original_parent {
        return Err(HistoryError::Consistency(format!(
            "rewritten commit {} is not based on the original parent",
            base.short()
        )));
    }

    let mut map = ReplayMap::new();
    map.insert(base, base);
    let mut tip = base;
    let mut rewritten = vec![base];
    let mut created = 0;
    let mut collapsed = 0;

    for &pickme in rest {
        let outcome = replay::replay(ctx, pickme, &map, tip).await?;
        match outcome {
            Replayed::Created(id) => {
                created += 1;
                rewritten.push(id);
            }
            Replayed::Collapsed(_) => collapsed += 1,
        }
        tip = outcome.id();
        map.insert(pickme, tip);
    }

    let label = format!("{}: switch to rewritten {}", action, tip);
    ctx.refs
        .compare_and_swap(&ctx.options.branch, Some(original_tip), tip, &label)
        .await?;
    tracing::info!(
        "{}: {} now at {} (was {}; {} replayed, {} dropped)",
        action,
        ctx.options.branch,
        tip.short(),
        original_tip.short(),
        created,
        collapsed
    );

    Ok(RewriteOutcome {
        old_tip: original_tip,
        new_tip: tip,
        chain: rewritten,
        created,
        collapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RewriteOptions;
    use crate::merge::PathMerger;
    use crate::object::{Blob, Commit, Signature};
    use crate::refs::{MemoryRefStore, RefStore};
    use crate::snapshot::{self, FileEntry, FlatTree, MODE_FILE};
    use crate::storage::MemoryStore;

    fn id(n: u8) -> ObjectId {
        ObjectId::new([n; 32])
    }

    fn no_edit(_: &str) -> Result<String> {
        panic!("apply never edits messages")
    }

    async fn commit(store: &MemoryStore, parents: Vec<ObjectId>, files: &[(&str, &str)], msg: &str) -> ObjectId {
        let mut flat = FlatTree::new();
        for (path, text) in files {
            let blob = store.store_blob(Blob::from_bytes(text.as_bytes().to_vec())).await.unwrap();
            flat.insert(path.to_string(), FileEntry::new(blob, MODE_FILE));
        }
        let tree_id = snapshot::write_tree(store, &flat).await.unwrap();
        let commit = Commit::new(
            tree_id,
            parents,
            Signature::new("Ada", "ada@example.com", 1_000, 0),
            msg.to_string(),
        );
        store.store_commit(commit).await.unwrap()
    }

    #[test]
    fn test_splice_two_into_middle() {
        let (a, b, c, b1, b2) = (id(1), id(2), id(3), id(4), id(5));
        let mut chain = vec![a, b, c];
        splice(&mut chain, b, &[b1, b2]).unwrap();
        assert_eq!(chain, vec![a, b1, b2, c]);
    }

    #[test]
    fn test_splice_one_at_ends() {
        let mut chain = vec![id(1), id(2)];
        splice(&mut chain, id(1), &[id(9)]).unwrap();
        splice(&mut chain, id(2), &[id(8)]).unwrap();
        assert_eq!(chain, vec![id(9), id(8)]);
    }

    #[test]
    fn test_splice_missing_is_a_bug() {
        let mut chain = vec![id(1)];
        let err = splice(&mut chain, id(2), &[id(3)]).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(chain, vec![id(1)]);
    }

    #[tokio::test]
    async fn test_apply_replays_and_publishes() {
        let store = MemoryStore::new();
        let refs = MemoryRefStore::new();
        let a = commit(&store, vec![], &[("f", "1")], "a").await;
        let b = commit(&store, vec![a], &[("f", "1"), ("g", "1")], "b").await;
        let c = commit(&store, vec![b], &[("f", "1"), ("g", "2")], "c").await;
        refs.set("main", c);

        let b2 = commit(&store, vec![a], &[("f", "1"), ("g", "1")], "b reworded").await;
        let ctx = RewriteContext::new(&store, &refs, &PathMerger, &no_edit, RewriteOptions::new("main"));
        let out = apply(&ctx, &[b2, c], Some(a), c, "reword").await.unwrap();

        assert_eq!(out.created, 1);
        assert_eq!(out.collapsed, 0);
        assert_eq!(refs.get("main"), Some(out.new_tip));
        let tip = store.load_commit(out.new_tip).await.unwrap();
        assert_eq!(tip.parents, vec![b2]);
        assert_eq!(tip.tree_id, store.load_commit(c).await.unwrap().tree_id);
        assert_eq!(out.chain, vec![b2, out.new_tip]);

        let log = refs.reflog("main").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].label, format!("reword: switch to rewritten {}", out.new_tip));
        assert_eq!(refs.orig_head().await.unwrap(), Some(c));
    }

    #[tokio::test]
    async fn test_apply_counts_collapsed() {
        let store = MemoryStore::new();
        let refs = MemoryRefStore::new();
        let a = commit(&store, vec![], &[("f", "1")], "a").await;
        let b = commit(&store, vec![a], &[("f", "2")], "b").await;
        refs.set("main", b);

        // New base already contains b's change.
        let a2 = commit(&store, vec![], &[("f", "2")], "a with b").await;
        let ctx = RewriteContext::new(&store, &refs, &PathMerger, &no_edit, RewriteOptions::new("main"));
        let out = apply(&ctx, &[a2, b], None, b, "reword").await.unwrap();
        assert_eq!(out.new_tip, a2);
        assert_eq!(out.collapsed, 1);
        assert_eq!(out.chain, vec![a2]);
    }

    #[tokio::test]
    async fn test_apply_conflict_leaves_branch() {
        let store = MemoryStore::new();
        let refs = MemoryRefStore::new();
        let a = commit(&store, vec![], &[("f", "1")], "a").await;
        let b = commit(&store, vec![a], &[("f", "b")], "b").await;
        refs.set("main", b);

        let a2 = commit(&store, vec![], &[("f", "other")], "a2").await;
        let ctx = RewriteContext::new(&store, &refs, &PathMerger, &no_edit, RewriteOptions::new("main"));
        let err = apply(&ctx, &[a2, b], None, b, "reword").await.unwrap_err();
        assert!(matches!(err, HistoryError::Conflict { .. }));
        assert_eq!(refs.get("main"), Some(b));
        assert!(refs.reflog("main").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_stale_tip_is_race() {
        let store = MemoryStore::new();
        let refs = MemoryRefStore::new();
        let a = commit(&store, vec![], &[("f", "1")], "a").await;
        let elsewhere = commit(&store, vec![a], &[("f", "2")], "moved").await;
        refs.set("main", elsewhere);

        let a2 = commit(&store, vec![], &[("f", "1")], "a2").await;
        let ctx = RewriteContext::new(&store, &refs, &PathMerger, &no_edit, RewriteOptions::new("main"));
        let err = apply(&ctx, &[a2], None, a, "reword").await.unwrap_err();
        assert!(matches!(err, HistoryError::PublishRace { .. }));
        assert_eq!(refs.get("main"), Some(elsewhere));
    }

    #[tokio::test]
    async fn test_apply_checks_base_parent() {
        let store = MemoryStore::new();
        let refs = MemoryRefStore::new();
        let a = commit(&store, vec![], &[("f", "1")], "a").await;
        let b = commit(&store, vec![a], &[("f", "2")], "b").await;
        refs.set("main", b);

        let ctx = RewriteContext::new(&store, &refs, &PathMerger, &no_edit, RewriteOptions::new("main"));
        let err = apply(&ctx, &[b], None, b, "reword").await.unwrap_err();
        assert!(err.is_internal());
        assert!(apply(&ctx, &[], None, b, "reword").await.unwrap_err().is_internal());
    }
}
