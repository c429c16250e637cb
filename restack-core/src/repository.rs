//! On-disk repository
//!
//! Layout:
//! ```text
//! {worktree}/.restack/
//!   HEAD                           # `ref: refs/heads/<branch>`
//!   config.json                    # repository configuration
//!   objects/{hash[0..2]}/{hash[2..]}
//!   refs/heads/<branch>
//!   logs/refs/heads/<branch>       # reflog
//!   ORIG_HEAD
//!   EDIT_MSG                       # scratch file for the message editor
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RestackConfig;
use crate::error::{HistoryError, Result};
use crate::object::{Blob, Commit, ObjectId, Signature};
use crate::refs::{FileRefStore, RefStore};
use crate::snapshot::{self, FileEntry, FlatTree, MODE_EXECUTABLE, MODE_FILE};
use crate::storage::{LooseObjectStore, ObjectStoreExt};

/// Name of the metadata directory inside a worktree
pub const REPO_DIR: &str = ".restack";

pub struct Repository {
    worktree: PathBuf,
    root: PathBuf,
    store: LooseObjectStore,
    refs: FileRefStore,
    config: RestackConfig,
}

impl Repository {
    /// Create a repository in `worktree` whose `HEAD` names `branch`.
    pub fn init(worktree: &Path, branch: &str) -> Result<Self> {
        let root = worktree.join(REPO_DIR);
        if root.join("HEAD").exists() {
            return Err(HistoryError::Config(format!(
                "repository already exists at {:?}",
                root
            )));
        }
        fs::create_dir_all(&root)?;

        let refs = FileRefStore::open(&root)?;
        refs.set_head_branch(branch)?;
        let config = RestackConfig {
            branch: branch.to_string(),
            ..RestackConfig::default()
        };
        config.save(&root)?;
        tracing::info!("initialized empty repository in {:?}", root);

        Self::open(worktree)
    }

    /// Open the repository in `worktree`.
    pub fn open(worktree: &Path) -> Result<Self> {
        let root = worktree.join(REPO_DIR);
        if !root.join("HEAD").exists() {
            return Err(HistoryError::Lookup(format!(
                "not a restack repository: {:?}",
                worktree
            )));
        }
        let store = LooseObjectStore::open(&root.join("objects"))?;
        let refs = FileRefStore::open(&root)?;
        let mut config = RestackConfig::load(&root)?;
        // An explicit branch setting wins; otherwise follow HEAD.
        if std::env::var("RESTACK_BRANCH").is_err() {
            if let Some(branch) = refs.head_branch()? {
                config.branch = branch;
            }
        }

        Ok(Self {
            worktree: worktree.to_path_buf(),
            root,
            store,
            refs,
            config,
        })
    }

    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    /// The metadata directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &LooseObjectStore {
        &self.store
    }

    pub fn refs(&self) -> &FileRefStore {
        &self.refs
    }

    pub fn config(&self) -> &RestackConfig {
        &self.config
    }

    /// Branch rewrites operate on
    pub fn branch(&self) -> &str {
        &self.config.branch
    }

    /// Store every file under the worktree and return the root tree id.
    pub async fn snapshot_worktree(&self) -> Result<ObjectId> {
        let mut flat = FlatTree::new();
        let mut pending = vec![self.worktree.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    if dir == self.worktree && entry.file_name() == REPO_DIR {
                        continue;
                    }
                    pending.push(path);
                } else if file_type.is_file() {
                    let rel = path
                        .strip_prefix(&self.worktree)
                        .map_err(|e| HistoryError::Consistency(format!("{:?} outside worktree: {}", path, e)))?
                        .to_str()
                        .ok_or_else(|| HistoryError::Config(format!("file name {:?} is not valid UTF-8", path)))?
                        .replace('\\', "/");
                    let executable = is_executable(&entry.metadata()?);
                    let data = fs::read(&path)?;
                    let id = self.store.store_blob(Blob::new(data, executable)).await?;
                    let mode = if executable { MODE_EXECUTABLE } else { MODE_FILE };
                    flat.insert(rel, FileEntry::new(id, mode));
                }
            }
        }
        Ok(snapshot::write_tree(&self.store, &flat).await?)
    }

    /// Record the worktree as a new commit on the current branch.
    pub async fn commit(&self, message: &str) -> Result<ObjectId> {
        let identity = self.config.identity.as_ref().ok_or_else(|| {
            HistoryError::Config(
                "no identity configured; set RESTACK_AUTHOR_NAME and RESTACK_AUTHOR_EMAIL".into(),
            )
        })?;
        let branch = self.branch();
        let parent = self.refs.current(branch).await?;
        let tree_id = self.snapshot_worktree().await?;

        let author: Signature = identity.signature_now();
        let commit = Commit::new(tree_id, parent.into_iter().collect(), author, message.to_string());
        let subject = commit.subject().to_string();
        let id = self.store.store_commit(commit).await?;

        let label = match parent {
            Some(_) => format!("commit: {}", subject),
            None => format!("commit (initial): {}", subject),
        };
        self.refs.compare_and_swap(branch, parent, id, &label).await?;
        tracing::info!("[{} {}] {}", branch, id.short(), subject);
        Ok(id)
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}
