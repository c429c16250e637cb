//! Branch references
//!
//! A branch is the only mutable, externally visible state a rewrite touches.
//! Updates go through [`RefStore::compare_and_swap`], so a branch that moved
//! underneath a rewrite is reported instead of overwritten. Every successful
//! swap is recorded in the branch's reflog, and the value it replaced is kept
//! in `ORIG_HEAD` so the rewrite can be undone by hand.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{HistoryError, Result};
use crate::object::ObjectId;

/// One recorded reference update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefLogEntry {
    /// Previous value (hex), absent when the branch was created
    pub old: Option<String>,
    /// New value (hex)
    pub new: String,
    /// Why the reference moved, e.g. `reword: switch to rewritten <id>`
    pub label: String,
    /// Unix seconds
    pub timestamp: i64,
}

impl RefLogEntry {
    fn new(old: Option<ObjectId>, new: ObjectId, label: &str) -> Self {
        Self {
            old: old.map(|id| id.to_hex()),
            new: new.to_hex(),
            label: label.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Named pointers to commits
#[async_trait]
pub trait RefStore: Send + Sync {
    /// Current value of branch `name`
    async fn current(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Point `name` at `new` if it still points at `expected`; otherwise
    /// fail with [`HistoryError::PublishRace`] and leave it alone.
    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
        label: &str,
    ) -> Result<()>;

    /// Recorded updates of `name`, oldest first
    async fn reflog(&self, name: &str) -> Result<Vec<RefLogEntry>>;

    /// Value a rewrite replaced most recently
    async fn orig_head(&self) -> Result<Option<ObjectId>>;
}

/// Reject names that would escape the refs directory or are unusable.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.ends_with('/')
        || name.ends_with(".lock")
        || name.split('/').any(|c| c.is_empty() || c == "." || c == "..")
        || name.chars().any(|c| c.is_control() || c.is_whitespace() || "~^:?*[\\".contains(c));
    if bad {
        return Err(HistoryError::Lookup(format!("invalid branch name: {}", name)));
    }
    Ok(())
}

fn race(name: &str, expected: Option<ObjectId>, found: Option<ObjectId>) -> HistoryError {
    let show = |id: Option<ObjectId>| id.map(|i| i.to_hex()).unwrap_or_else(|| "(none)".to_string());
    HistoryError::PublishRace {
        name: name.to_string(),
        expected: show(expected),
        found: show(found),
    }
}

#[derive(Default)]
struct MemoryRefs {
    refs: HashMap<String, ObjectId>,
    logs: HashMap<String, Vec<RefLogEntry>>,
    orig_head: Option<ObjectId>,
}

/// In-memory reference store
#[derive(Default, Clone)]
pub struct MemoryRefStore {
    inner: Arc<Mutex<MemoryRefs>>,
}

impl MemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally point `name` at `id` without logging
    pub fn set(&self, name: &str, id: ObjectId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.refs.insert(name.to_string(), id);
    }

    pub fn get(&self, name: &str) -> Option<ObjectId> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.refs.get(name).copied()
    }
}

#[async_trait]
impl RefStore for MemoryRefStore {
    async fn current(&self, name: &str) -> Result<Option<ObjectId>> {
        Ok(self.get(name))
    }

    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
        label: &str,
    ) -> Result<()> {
        validate_ref_name(name)?;
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let found = inner.refs.get(name).copied();
        if found != expected {
            return Err(race(name, expected, found));
        }
        inner.refs.insert(name.to_string(), new);
        inner
            .logs
            .entry(name.to_string())
            .or_default()
            .push(RefLogEntry::new(expected, new, label));
        if expected.is_some() {
            inner.orig_head = expected;
        }
        Ok(())
    }

    async fn reflog(&self, name: &str) -> Result<Vec<RefLogEntry>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.logs.get(name).cloned().unwrap_or_default())
    }

    async fn orig_head(&self) -> Result<Option<ObjectId>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.orig_head)
    }
}

/// Reference store on disk
///
/// Layout:
/// ```text
/// {root}/HEAD                     # `ref: refs/heads/<branch>`
/// {root}/refs/heads/<name>        # hex commit id
/// {root}/refs/heads/<name>.lock   # held while a swap is in flight
/// {root}/logs/refs/heads/<name>   # reflog, one JSON entry per line
/// {root}/ORIG_HEAD                # value replaced by the latest swap
/// ```
pub struct FileRefStore {
    root: PathBuf,
}

impl FileRefStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join("refs").join("heads"))?;
        fs::create_dir_all(root.join("logs").join("refs").join("heads"))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join("refs").join("heads").join(name)
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.root.join("refs").join("heads").join(format!("{}.lock", name))
    }

    fn log_path(&self, name: &str) -> PathBuf {
        self.root.join("logs").join("refs").join("heads").join(name)
    }

    fn orig_head_path(&self) -> PathBuf {
        self.root.join("ORIG_HEAD")
    }

    /// Branch `HEAD` points at
    pub fn head_branch(&self) -> Result<Option<String>> {
        let path = self.root.join("HEAD");
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let branch = data
            .trim()
            .strip_prefix("ref: refs/heads/")
            .ok_or_else(|| HistoryError::Lookup(format!("malformed HEAD: {}", data.trim())))?;
        Ok(Some(branch.to_string()))
    }

    /// Point `HEAD` at branch `name`
    pub fn set_head_branch(&self, name: &str) -> Result<()> {
        validate_ref_name(name)?;
        let path = self.root.join("HEAD");
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, format!("ref: refs/heads/{}\n", name))?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Names of all branches
    pub fn branches(&self) -> Result<Vec<String>> {
        let heads = self.root.join("refs").join("heads");
        let mut names = Vec::new();
        collect_names(&heads, &heads, &mut names)?;
        names.sort();
        Ok(names)
    }

    fn read_ref(path: &Path) -> Result<Option<ObjectId>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        let id = ObjectId::from_hex(data.trim())
            .map_err(|e| HistoryError::Lookup(format!("corrupt reference {:?}: {}", path, e)))?;
        Ok(Some(id))
    }

    fn append_log(&self, name: &str, entry: &RefLogEntry) -> Result<()> {
        let path = self.log_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Runs with the lock held. The audit trail is written before the rename,
    /// so a failure there leaves the ref where it was.
    fn swap_locked(
        &self,
        name: &str,
        lock_path: &Path,
        expected: Option<ObjectId>,
        new: ObjectId,
        label: &str,
    ) -> Result<()> {
        let found = Self::read_ref(&self.ref_path(name))?;
        if found != expected {
            return Err(race(name, expected, found));
        }
        if let Some(old) = expected {
            fs::write(self.orig_head_path(), format!("{}\n", old.to_hex()))?;
        }
        self.append_log(name, &RefLogEntry::new(expected, new, label))?;

        let mut lock = OpenOptions::new().write(true).truncate(true).open(lock_path)?;
        writeln!(lock, "{}", new.to_hex())?;
        lock.sync_all()?;
        drop(lock);
        fs::rename(lock_path, self.ref_path(name))?;
        Ok(())
    }
}

fn collect_names(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_names(base, &path, out)?;
        } else if path.extension().map(|e| e != "lock").unwrap_or(true) {
            if let Ok(rel) = path.strip_prefix(base) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RefStore for FileRefStore {
    async fn current(&self, name: &str) -> Result<Option<ObjectId>> {
        validate_ref_name(name)?;
        Self::read_ref(&self.ref_path(name))
    }

    async fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
        label: &str,
    ) -> Result<()> {
        validate_ref_name(name)?;
        let ref_path = self.ref_path(name);
        if let Some(parent) = ref_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = self.lock_path(name);
        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(HistoryError::PublishRace {
                    name: name.to_string(),
                    expected: expected.map(|i| i.to_hex()).unwrap_or_else(|| "(none)".into()),
                    found: format!("locked by {:?}", lock_path),
                });
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.swap_locked(name, &lock_path, expected, new, label) {
            let _ = fs::remove_file(&lock_path);
            return Err(e);
        }
        Ok(())
    }

    async fn reflog(&self, name: &str) -> Result<Vec<RefLogEntry>> {
        validate_ref_name(name)?;
        let path = self.log_path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&path)?;
        let mut entries = Vec::new();
        for line in data.lines().filter(|l| !l.trim().is_empty()) {
            entries.push(serde_json::from_str::<RefLogEntry>(line)?);
        }
        Ok(entries)
    }

    async fn orig_head(&self) -> Result<Option<ObjectId>> {
        Self::read_ref(&self.orig_head_path())
    }
}
