//! Object storage for restack
//!
//! The store is a black box keyed by content hash: `put` is idempotent and
//! nothing is ever overwritten or deleted by the rewrite engine. Objects a
//! failed rewrite already wrote stay behind as unreferenced, inert data.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::object::{Blob, Commit, Object, ObjectId, ObjectKind, Tree};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(ObjectId),

    #[error("Object {id} is a {actual}, expected a {expected}")]
    KindMismatch {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("path {0} is both a file and a directory")]
    PathClash(String),
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Generic content-addressed object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get encoded object data by ID
    async fn get(&self, id: ObjectId) -> Result<Bytes>;

    /// Check if object exists
    async fn exists(&self, id: ObjectId) -> Result<bool>;

    /// Put encoded object data, returning its ID. Storing the same bytes
    /// twice yields the same ID and leaves the store unchanged.
    async fn put(&self, data: Bytes) -> Result<ObjectId>;

    /// List all object IDs
    async fn list(&self) -> Result<Vec<ObjectId>>;
}

/// Typed accessors on top of any [`ObjectStore`]
#[async_trait]
pub trait ObjectStoreExt: ObjectStore {
    async fn load(&self, id: ObjectId) -> Result<Object> {
        let data = self.get(id).await?;
        Ok(Object::decode(&data)?)
    }

    async fn store(&self, object: &Object) -> Result<ObjectId> {
        let data = object.encode()?;
        self.put(Bytes::from(data)).await
    }

    async fn load_commit(&self, id: ObjectId) -> Result<Commit> {
        match self.load(id).await? {
            Object::Commit(commit) => Ok(commit),
            other => Err(mismatch(id, ObjectKind::Commit, &other)),
        }
    }

    async fn load_tree(&self, id: ObjectId) -> Result<Tree> {
        match self.load(id).await? {
            Object::Tree(tree) => Ok(tree),
            other => Err(mismatch(id, ObjectKind::Tree, &other)),
        }
    }

    async fn load_blob(&self, id: ObjectId) -> Result<Blob> {
        match self.load(id).await? {
            Object::Blob(blob) => Ok(blob),
            other => Err(mismatch(id, ObjectKind::Blob, &other)),
        }
    }

    async fn store_commit(&self, commit: Commit) -> Result<ObjectId> {
        self.store(&Object::Commit(commit)).await
    }

    async fn store_tree(&self, tree: Tree) -> Result<ObjectId> {
        self.store(&Object::Tree(tree)).await
    }

    async fn store_blob(&self, blob: Blob) -> Result<ObjectId> {
        self.store(&Object::Blob(blob)).await
    }

    /// Tree id of a commit, or the empty tree when there is no commit
    async fn commit_tree_id(&self, id: Option<ObjectId>) -> Result<ObjectId> {
        match id {
            Some(id) => Ok(self.load_commit(id).await?.tree_id),
            None => Ok(Tree::empty_id()),
        }
    }
}

impl<T: ObjectStore + ?Sized> ObjectStoreExt for T {}

fn mismatch(id: ObjectId, expected: ObjectKind, actual: &Object) -> StorageError {
    StorageError::KindMismatch {
        id,
        expected,
        actual: actual.kind(),
    }
}

/// In-memory object store
#[derive(Default, Clone)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<ObjectId, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, id: ObjectId) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound(id))
    }

    async fn exists(&self, id: ObjectId) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(&id))
    }

    async fn put(&self, data: Bytes) -> Result<ObjectId> {
        let id = ObjectId::from_data(&data);
        self.objects.write().await.entry(id).or_insert(data);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids: Vec<ObjectId> = self.objects.read().await.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Loose-object store on disk
///
/// Layout:
/// ```text
/// {root}/{hash[0..2]}/{hash[2..]}   # zstd-compressed tagged object
/// ```
pub struct LooseObjectStore {
    root: PathBuf,
}

impl LooseObjectStore {
    /// Open or create a loose-object store rooted at `root`
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }
}

#[async_trait]
impl ObjectStore for LooseObjectStore {
    async fn get(&self, id: ObjectId) -> Result<Bytes> {
        let path = self.object_path(&id);
        let compressed = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        let data = zstd::decode_all(&compressed[..])
            .map_err(|e| StorageError::Backend(format!("Decompression failed for {}: {}", id, e)))?;
        Ok(Bytes::from(data))
    }

    async fn exists(&self, id: ObjectId) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(&id)).await?)
    }

    async fn put(&self, data: Bytes) -> Result<ObjectId> {
        let id = ObjectId::from_data(&data);
        let path = self.object_path(&id);
        if tokio::fs::try_exists(&path).await? {
            return Ok(id);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let compressed = zstd::encode_all(data.as_ref(), 3)
            .map_err(|e| StorageError::Backend(format!("Compression failed: {}", e)))?;

        // Write atomically via temp file
        let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
        tokio::fs::write(&tmp_path, compressed).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for prefix in fs::read_dir(&self.root)? {
            let prefix = prefix?;
            if !prefix.file_type()?.is_dir() {
                continue;
            }
            let head = prefix.file_name().to_string_lossy().into_owned();
            for entry in fs::read_dir(prefix.path())? {
                let entry = entry?;
                let tail = entry.file_name().to_string_lossy().into_owned();
                if let Ok(id) = ObjectId::from_hex(&format!("{}{}", head, tail)) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Signature;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.store_blob(Blob::from_bytes(b"same".to_vec())).await.unwrap();
        let b = store.store_blob(Blob::from_bytes(b"same".to_vec())).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_kind_mismatch() {
        let store = MemoryStore::new();
        let id = store.store_blob(Blob::from_bytes(b"x".to_vec())).await.unwrap();
        let err = store.load_commit(id).await.unwrap_err();
        assert!(matches!(err, StorageError::KindMismatch { .. }));
    }

    #[tokio::test]
    async fn test_commit_tree_id_of_root_parent() {
        let store = MemoryStore::new();
        assert_eq!(store.commit_tree_id(None).await.unwrap(), Tree::empty_id());
    }

    #[tokio::test]
    async fn test_loose_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = LooseObjectStore::open(&tmp.path().join("objects")).unwrap();

        let tree_id = store.store_tree(Tree::new()).await.unwrap();
        let commit = Commit::new(
            tree_id,
            vec![],
            Signature::new("Ada", "ada@example.com", 1, 0),
            "Initial".into(),
        );
        let id = store.store_commit(commit.clone()).await.unwrap();

        assert!(store.exists(id).await.unwrap());
        assert_eq!(store.load_commit(id).await.unwrap(), commit);
        assert_eq!(store.list().await.unwrap().len(), 2);

        let again = store.store_commit(commit).await.unwrap();
        assert_eq!(again, id);
    }

    #[tokio::test]
    async fn test_loose_store_missing_object() {
        let tmp = TempDir::new().unwrap();
        let store = LooseObjectStore::open(tmp.path()).unwrap();
        let missing = ObjectId::new([7u8; 32]);
        assert!(matches!(store.get(missing).await, Err(StorageError::NotFound(_))));
        assert!(!store.exists(missing).await.unwrap());
    }
}
