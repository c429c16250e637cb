//! Snapshots as flat path maps, and the staging area used by split
//!
//! Trees are hierarchical in the store; most of the rewrite logic is easier
//! to express over the flat `path -> file` view, so this module converts in
//! both directions.

use std::collections::BTreeMap;

use crate::object::{Object, ObjectId, ObjectKind, Tree, TreeEntry};
use crate::storage::{ObjectStore, ObjectStoreExt, Result, StorageError};

pub const MODE_FILE: u32 = 0o100644;
pub const MODE_EXECUTABLE: u32 = 0o100755;
pub const MODE_DIR: u32 = 0o040000;

/// A file within a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileEntry {
    /// Blob id
    pub id: ObjectId,
    pub mode: u32,
}

impl FileEntry {
    pub fn new(id: ObjectId, mode: u32) -> Self {
        Self { id, mode }
    }
}

/// Flat view of a snapshot: `/`-separated path to file
pub type FlatTree = BTreeMap<String, FileEntry>;

/// Expand the tree `tree_id` into its flat view.
pub async fn flatten<S: ObjectStore + ?Sized>(store: &S, tree_id: ObjectId) -> Result<FlatTree> {
    let mut flat = FlatTree::new();
    // The empty tree is implied and need not be present in the store.
    if tree_id == Tree::empty_id() {
        return Ok(flat);
    }
    let mut pending = vec![(String::new(), tree_id)];

    while let Some((prefix, id)) = pending.pop() {
        let tree = store.load_tree(id).await?;
        for entry in tree.iter() {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };
            match entry.kind {
                ObjectKind::Tree => pending.push((path, entry.id)),
                ObjectKind::Blob => {
                    flat.insert(path, FileEntry::new(entry.id, entry.mode));
                }
                ObjectKind::Commit => {
                    return Err(StorageError::Backend(format!(
                        "tree {} has a commit entry at {}",
                        id, path
                    )));
                }
            }
        }
    }
    Ok(flat)
}

#[derive(Default)]
struct DirNode {
    files: BTreeMap<String, FileEntry>,
    dirs: BTreeMap<String, DirNode>,
}

impl DirNode {
    /// Insert `file` at `rest`, the part of `path` below this directory.
    fn insert(&mut self, path: &str, rest: &str, file: FileEntry) -> Result<()> {
        match rest.split_once('/') {
            Some((dir, tail)) => {
                if self.files.contains_key(dir) {
                    return Err(StorageError::PathClash(clash_prefix(path, tail)));
                }
                self.dirs.entry(dir.to_string()).or_default().insert(path, tail, file)
            }
            None => {
                if self.dirs.contains_key(rest) {
                    return Err(StorageError::PathClash(path.to_string()));
                }
                self.files.insert(rest.to_string(), file);
                Ok(())
            }
        }
    }

    /// Build this directory's tree, pushing it and every subtree onto `out`
    /// children first.
    fn build(&self, out: &mut Vec<Tree>) -> Result<ObjectId> {
        let mut tree = Tree::new();
        for (name, dir) in &self.dirs {
            let id = dir.build(out)?;
            tree.insert(TreeEntry::new(name.clone(), id, ObjectKind::Tree, MODE_DIR));
        }
        for (name, file) in &self.files {
            tree.insert(TreeEntry::new(name.clone(), file.id, ObjectKind::Blob, file.mode));
        }
        let id = Object::Tree(tree.clone()).id()?;
        out.push(tree);
        Ok(id)
    }
}

/// `path` with `tail` and its separator cut off the end
fn clash_prefix(path: &str, tail: &str) -> String {
    path[..path.len() - tail.len() - 1].to_string()
}

/// Paths of `flat` that are files and also have entries below them.
pub fn path_clashes(flat: &FlatTree) -> Vec<String> {
    flat.keys()
        .filter(|path| {
            let dir = format!("{}/", path);
            flat.range(dir.clone()..).next().is_some_and(|(next, _)| next.starts_with(&dir))
        })
        .cloned()
        .collect()
}

/// Store the flat snapshot as nested trees and return the root tree id.
///
/// Fails with [`StorageError::PathClash`] when a path is both a file and a
/// directory.
pub async fn write_tree<S: ObjectStore + ?Sized>(store: &S, flat: &FlatTree) -> Result<ObjectId> {
    let mut root = DirNode::default();
    for (path, file) in flat {
        root.insert(path, path, *file)?;
    }

    let mut trees = Vec::new();
    let root_id = root.build(&mut trees)?;
    for tree in trees {
        store.store_tree(tree).await?;
    }
    Ok(root_id)
}

/// Mutable `path -> file` mapping, seeded from a snapshot
///
/// Only lives for the duration of a split; turning it back into a tree is
/// the only way its contents escape.
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    entries: FlatTree,
}

impl StagingArea {
    /// Seed a staging area from the tree `tree_id`.
    pub async fn from_tree<S: ObjectStore + ?Sized>(store: &S, tree_id: ObjectId) -> Result<Self> {
        Ok(Self {
            entries: flatten(store, tree_id).await?,
        })
    }

    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    /// Record `file` at `path`, replacing whatever was there.
    ///
    /// A file at a leading directory of `path`, or anything below `path`,
    /// gives way to the new entry.
    pub fn stage(&mut self, path: &str, file: FileEntry) {
        for (end, _) in path.match_indices('/') {
            self.entries.remove(&path[..end]);
        }
        let dir = format!("{}/", path);
        let below: Vec<String> = self
            .entries
            .range(dir.clone()..)
            .take_while(|(p, _)| p.starts_with(&dir))
            .map(|(p, _)| p.clone())
            .collect();
        for p in below {
            self.entries.remove(&p);
        }
        self.entries.insert(path.to_string(), file);
    }

    /// Remove `path` from the staging area.
    pub fn unstage(&mut self, path: &str) -> Option<FileEntry> {
        self.entries.remove(path)
    }

    pub fn entries(&self) -> &FlatTree {
        &self.entries
    }

    /// Materialize the staged contents as a tree.
    pub async fn write_tree<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<ObjectId> {
        write_tree(store, &self.entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Blob;
    use crate::storage::MemoryStore;

    async fn blob(store: &MemoryStore, text: &str) -> FileEntry {
        let id = store.store_blob(Blob::from_bytes(text.as_bytes().to_vec())).await.unwrap();
        FileEntry::new(id, MODE_FILE)
    }

    #[tokio::test]
    async fn test_write_then_flatten() {
        let store = MemoryStore::new();
        let mut flat = FlatTree::new();
        flat.insert("README".into(), blob(&store, "hi").await);
        flat.insert("src/lib.rs".into(), blob(&store, "lib").await);
        flat.insert("src/bin/main.rs".into(), blob(&store, "main").await);

        let id = write_tree(&store, &flat).await.unwrap();
        assert_eq!(flatten(&store, id).await.unwrap(), flat);

        let root = store.load_tree(id).await.unwrap();
        assert_eq!(root.get("src").unwrap().kind, ObjectKind::Tree);
        assert_eq!(root.get("README").unwrap().kind, ObjectKind::Blob);
    }

    #[tokio::test]
    async fn test_empty_flat_is_empty_tree() {
        let store = MemoryStore::new();
        let id = write_tree(&store, &FlatTree::new()).await.unwrap();
        assert_eq!(id, Tree::empty_id());
        assert!(flatten(&MemoryStore::new(), id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_content_same_tree() {
        let store = MemoryStore::new();
        let file = blob(&store, "x").await;
        let mut a = FlatTree::new();
        a.insert("d/x".into(), file);
        let mut staging = StagingArea::default();
        staging.stage("d/x", file);
        assert_eq!(
            write_tree(&store, &a).await.unwrap(),
            staging.write_tree(&store).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_write_tree_rejects_file_and_directory() {
        let store = MemoryStore::new();
        let file = blob(&store, "x").await;
        let mut flat = FlatTree::new();
        flat.insert("d".into(), file);
        flat.insert("d.txt".into(), file);
        flat.insert("d/x".into(), file);
        assert_eq!(path_clashes(&flat), vec!["d".to_string()]);

        let err = write_tree(&store, &flat).await.unwrap_err();
        assert!(matches!(err, StorageError::PathClash(ref p) if p == "d"), "{err}");

        let mut deep = FlatTree::new();
        deep.insert("a/b".into(), file);
        deep.insert("a/b/c/d".into(), file);
        assert!(matches!(write_tree(&store, &deep).await, Err(StorageError::PathClash(p)) if p == "a/b"));
    }

    #[tokio::test]
    async fn test_stage_replaces_file_with_directory() {
        let store = MemoryStore::new();
        let file = blob(&store, "x").await;
        let mut staging = StagingArea::default();
        staging.stage("d", file);
        staging.stage("d.txt", file);
        staging.stage("d/x/y", file);
        assert!(staging.get("d").is_none());
        assert!(staging.get("d.txt").is_some());

        staging.stage("d", file);
        assert!(staging.get("d/x/y").is_none());
        assert_eq!(staging.entries().len(), 2);
        staging.write_tree(&store).await.unwrap();
    }

    #[tokio::test]
    async fn test_staging_from_tree() {
        let store = MemoryStore::new();
        let mut flat = FlatTree::new();
        flat.insert("a".into(), blob(&store, "1").await);
        flat.insert("dir/b".into(), blob(&store, "2").await);
        let id = write_tree(&store, &flat).await.unwrap();

        let mut staging = StagingArea::from_tree(&store, id).await.unwrap();
        assert_eq!(staging.entries(), &flat);

        staging.unstage("dir/b");
        let after = staging.write_tree(&store).await.unwrap();
        let root = store.load_tree(after).await.unwrap();
        assert!(root.get("dir").is_none());
    }
}
