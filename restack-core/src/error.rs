//! Error types for history rewriting
//!
//! Every variant aborts the whole rewrite before the branch reference moves.

use crate::object::ObjectId;
use crate::parse::ParseError;
use crate::storage::StorageError;

/// Result type for rewrite operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// All the ways a rewrite can fail
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Revision or reference not found, or an unparsable identifier
    #[error("{0}")]
    Lookup(String),

    /// Non-linear history or a revision unreachable from the tip
    #[error("{0}")]
    Topology(String),

    /// Three-way merge produced conflicts while replaying a commit
    #[error("could not replay {commit}: conflicts in {}", .paths.join(", "))]
    Conflict { commit: ObjectId, paths: Vec<String> },

    /// The edited or split commit would be empty or trivial
    #[error("{0}")]
    EmptyResult(String),

    /// The user aborted editing or produced an empty message
    #[error("aborting commit: {0}")]
    EditAborted(String),

    /// An internal invariant was violated
    #[error("BUG: {0}")]
    Consistency(String),

    /// The branch moved while the rewrite was in progress
    #[error("reference {name} moved concurrently: expected {expected}, found {found}")]
    PublishRace {
        name: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HistoryError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            HistoryError::Lookup(_)
            | HistoryError::Topology(_)
            | HistoryError::EmptyResult(_)
            | HistoryError::Config(_) => 1,
            HistoryError::Conflict { .. } => 2,
            HistoryError::EditAborted(_) => 3,
            HistoryError::PublishRace { .. } => 4,
            HistoryError::Consistency(_) => 70,
            HistoryError::Storage(_) | HistoryError::Io(_) => 74,
        }
    }

    /// Whether this error signals a bug rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(self, HistoryError::Consistency(_))
    }
}

impl From<ParseError> for HistoryError {
    fn from(e: ParseError) -> Self {
        HistoryError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        HistoryError::Config(e.to_string())
    }
}
