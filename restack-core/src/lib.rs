//! Restack Core Library
//!
//! History rewriting for linear branches:
//! - Object model (Blob, Tree, Commit) and content-addressed storage
//! - Branch references with compare-and-swap updates and a reflog
//! - Flat snapshots, tree diffs and a path-level three-way merge
//! - Message editing and change selection collaborators
//! - Collecting, reconstructing, replaying and splicing commit chains
//! - The `reword` and `split` rewrites
//! - Configuration and bounded value parsing

pub mod object;
pub mod storage;
pub mod refs;
pub mod snapshot;
pub mod diff;
pub mod merge;
pub mod editor;
pub mod select;
pub mod config;
pub mod parse;
pub mod error;
pub mod context;
pub mod revparse;
pub mod collect;
pub mod reconstruct;
pub mod replay;
pub mod split;
pub mod splice;
pub mod history;
pub mod repository;

pub use object::{Blob, Commit, ExtraHeader, Object, ObjectId, ObjectKind, Signature, Tree, TreeEntry};
pub use storage::{LooseObjectStore, MemoryStore, ObjectStore, ObjectStoreExt, StorageError};
pub use refs::{FileRefStore, MemoryRefStore, RefLogEntry, RefStore};
pub use snapshot::{FileEntry, FlatTree, StagingArea};
pub use diff::{ChangeKind, FileChange};
pub use merge::{MergeResult, PathMerger, TreeMerger};
pub use editor::{CommandEditor, MessageEditor};
pub use select::{FilterSelector, HunkSelector, PathFilter, SelectOptions};
pub use config::{Identity, RestackConfig};
pub use parse::ParseError;
pub use error::{HistoryError, Result};
pub use context::{RewriteContext, RewriteOptions};
pub use collect::RewriteTarget;
pub use replay::{ReplayMap, Replayed};
pub use splice::RewriteOutcome;
pub use history::Rewriter;
pub use repository::Repository;
