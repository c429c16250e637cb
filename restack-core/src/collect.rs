//! Collecting the linear chain of commits a rewrite has to replay

use std::collections::{HashSet, VecDeque};

use crate::error::{HistoryError, Result};
use crate::object::{Commit, ObjectId};
use crate::refs::RefStore;
use crate::revparse;
use crate::storage::{ObjectStore, ObjectStoreExt};

/// What a rewrite of one commit operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTarget {
    /// Commit being rewritten
    pub original: ObjectId,
    /// Its parent, `None` for a root commit
    pub parent: Option<ObjectId>,
    /// Branch tip when the rewrite started
    pub head: ObjectId,
    /// `parent` (exclusive) to `head` (inclusive), oldest first
    pub chain: Vec<ObjectId>,
}

/// Whether `ancestor` is reachable from `tip` through parent links
/// (a commit counts as its own descendant).
pub async fn is_descendant(store: &dyn ObjectStore, tip: ObjectId, ancestor: ObjectId) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([tip]);
    while let Some(id) = queue.pop_front() {
        if id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id) {
            continue;
        }
        let commit = store.load_commit(id).await?;
        queue.extend(commit.parents);
    }
    Ok(false)
}

/// Commits from `base` (exclusive; `None` means from the root) up to
/// `tip` (inclusive), oldest first.
///
/// Fails with [`HistoryError::Topology`] if any of them is a merge, or if
/// `tip` does not descend from `base`.
pub async fn collect_range(
    store: &dyn ObjectStore,
    base: Option<ObjectId>,
    tip: ObjectId,
) -> Result<Vec<ObjectId>> {
    let mut chain = Vec::new();
    let mut current = tip;

    loop {
        if Some(current) == base {
            break;
        }
        let commit = store.load_commit(current).await?;
        chain.push(current);
        match commit.parents.as_slice() {
            [] => {
                if let Some(base) = base {
                    return Err(HistoryError::Topology(format!(
                        "{} is not an ancestor of {}",
                        base, tip
                    )));
                }
                break;
            }
            [parent] => current = *parent,
            _ => {
                return Err(HistoryError::Topology(format!(
                    "cannot rearrange commit history with merges ({} has {} parents)",
                    current,
                    commit.parents.len()
                )));
            }
        }
    }

    chain.reverse();
    tracing::debug!("collected {} commit(s) up to {}", chain.len(), tip.short());
    Ok(chain)
}

/// Resolve `revision` and collect everything between its parent and the
/// tip of `branch`.
pub async fn gather(
    store: &dyn ObjectStore,
    refs: &dyn RefStore,
    branch: &str,
    revision: &str,
) -> Result<RewriteTarget> {
    let original = revparse::resolve(store, refs, revision, branch).await?;
    let commit = store.load_commit(original).await?;
    let parent = commit.parents.first().copied();

    let head = refs
        .current(branch)
        .await?
        .ok_or_else(|| HistoryError::Lookup(format!("could not resolve branch {} to a commit", branch)))?;

    if !is_descendant(store, head, original).await? {
        return Err(HistoryError::Topology(format!(
            "commit {} must be reachable from current HEAD commit ({})",
            original.short(),
            branch
        )));
    }

    // Collected before anything is written so merges abort the rewrite early.
    let chain = collect_range(store, parent, head).await?;
    Ok(RewriteTarget {
        original,
        parent,
        head,
        chain,
    })
}

/// Follow first parents from `start`, newest first, at most `limit` commits.
pub async fn first_parent_log(
    store: &dyn ObjectStore,
    start: ObjectId,
    limit: usize,
) -> Result<Vec<(ObjectId, Commit)>> {
    let mut out = Vec::new();
    let mut next = Some(start);
    while let Some(id) = next {
        if out.len() >= limit {
            break;
        }
        let commit = store.load_commit(id).await?;
        next = commit.parents.first().copied();
        out.push((id, commit));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Signature, Tree};
    use crate::refs::MemoryRefStore;
    use crate::storage::MemoryStore;

    async fn commit(store: &MemoryStore, parents: Vec<ObjectId>, msg: &str) -> ObjectId {
        let commit = Commit::new(
            Tree::empty_id(),
            parents,
            Signature::new("Ada", "ada@example.com", 0, 0),
            msg.to_string(),
        );
        store.store_commit(commit).await.unwrap()
    }

    #[tokio::test]
    async fn test_collect_linear() {
        let store = MemoryStore::new();
        let a = commit(&store, vec![], "a").await;
        let b = commit(&store, vec![a], "b").await;
        let c = commit(&store, vec![b], "c").await;

        assert_eq!(collect_range(&store, Some(a), c).await.unwrap(), vec![b, c]);
        assert_eq!(collect_range(&store, None, c).await.unwrap(), vec![a, b, c]);
        assert_eq!(collect_range(&store, Some(c), c).await.unwrap(), Vec::<ObjectId>::new());
    }

    #[tokio::test]
    async fn test_collect_rejects_merge() {
        let store = MemoryStore::new();
        let a = commit(&store, vec![], "a").await;
        let b = commit(&store, vec![a], "b").await;
        let side = commit(&store, vec![a], "side").await;
        let m = commit(&store, vec![b, side], "merge").await;
        let tip = commit(&store, vec![m], "tip").await;

        let err = collect_range(&store, Some(a), tip).await.unwrap_err();
        assert!(matches!(err, HistoryError::Topology(_)));
    }

    #[tokio::test]
    async fn test_collect_unrelated_base() {
        let store = MemoryStore::new();
        let a = commit(&store, vec![], "a").await;
        let b = commit(&store, vec![a], "b").await;
        let other = commit(&store, vec![], "other").await;
        let err = collect_range(&store, Some(other), b).await.unwrap_err();
        assert!(matches!(err, HistoryError::Topology(_)));
    }

    #[tokio::test]
    async fn test_gather() {
        let store = MemoryStore::new();
        let refs = MemoryRefStore::new();
        let a = commit(&store, vec![], "a").await;
        let b = commit(&store, vec![a], "b").await;
        let c = commit(&store, vec![b], "c").await;
        refs.set("main", c);

        let target = gather(&store, &refs, "main", &b.to_hex()).await.unwrap();
        assert_eq!(target.original, b);
        assert_eq!(target.parent, Some(a));
        assert_eq!(target.head, c);
        assert_eq!(target.chain, vec![b, c]);

        let root = gather(&store, &refs, "main", "HEAD~2").await.unwrap();
        assert_eq!(root.parent, None);
        assert_eq!(root.chain, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_gather_unreachable_commit() {
        let store = MemoryStore::new();
        let refs = MemoryRefStore::new();
        let a = commit(&store, vec![], "a").await;
        let b = commit(&store, vec![a], "b").await;
        let stray = commit(&store, vec![a], "stray").await;
        refs.set("main", b);

        let err = gather(&store, &refs, "main", &stray.to_hex()).await.unwrap_err();
        assert!(matches!(err, HistoryError::Topology(_)));
    }

    #[tokio::test]
    async fn test_first_parent_log() {
        let store = MemoryStore::new();
        let a = commit(&store, vec![], "a").await;
        let b = commit(&store, vec![a], "b").await;
        let log = first_parent_log(&store, b, 10).await.unwrap();
        assert_eq!(log.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(first_parent_log(&store, b, 1).await.unwrap().len(), 1);
    }
}
