//! Collaborators shared by every step of one rewrite

use crate::config::{Identity, RestackConfig};
use crate::editor::MessageEditor;
use crate::merge::TreeMerger;
use crate::object::{Commit, Signature};
use crate::refs::RefStore;
use crate::storage::ObjectStore;

/// Settings of a single rewrite
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Branch whose tip is rewritten and then moved
    pub branch: String,
    /// Leading character of ignored lines in message templates
    pub comment_char: char,
    /// Committer of new commits; `None` keeps each source commit's committer
    pub committer: Option<Identity>,
}

impl RewriteOptions {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            comment_char: '#',
            committer: None,
        }
    }
}

impl From<&RestackConfig> for RewriteOptions {
    fn from(config: &RestackConfig) -> Self {
        Self {
            branch: config.branch.clone(),
            comment_char: config.comment_char,
            committer: config.identity.clone(),
        }
    }
}

/// Everything a rewrite reads from or writes to
///
/// All fields are borrowed: the context lives for exactly one operation.
pub struct RewriteContext<'a> {
    pub store: &'a dyn ObjectStore,
    pub refs: &'a dyn RefStore,
    pub merger: &'a dyn TreeMerger,
    pub editor: &'a dyn MessageEditor,
    pub options: RewriteOptions,
}

impl<'a> RewriteContext<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        refs: &'a dyn RefStore,
        merger: &'a dyn TreeMerger,
        editor: &'a dyn MessageEditor,
        options: RewriteOptions,
    ) -> Self {
        Self {
            store,
            refs,
            merger,
            editor,
            options,
        }
    }

    /// Committer for a commit rebuilt from `source`
    pub fn committer_for(&self, source: &Commit) -> Signature {
        match &self.options.committer {
            Some(identity) => identity.signature_now(),
            None => source.committer.clone(),
        }
    }
}
