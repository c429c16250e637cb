//! Repository configuration
//!
//! Stored at `{repo}/config.json`; a missing file means defaults. Selected
//! values can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{HistoryError, Result};
use crate::object::Signature;
use crate::parse;

pub const CONFIG_FILE: &str = "config.json";

/// Name and email used for the committer of rewritten commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn signature_now(&self) -> Signature {
        Signature::now(&self.name, &self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestackConfig {
    /// Branch rewritten when none is named explicitly
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Editor command used for commit messages
    #[serde(default)]
    pub editor: Option<String>,
    /// Leading character of ignored lines in the message template
    #[serde(default = "default_comment_char")]
    pub comment_char: char,
    /// Committer identity; when absent the original committer is reused
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub verbose: bool,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_comment_char() -> char {
    '#'
}

impl Default for RestackConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            editor: None,
            comment_char: default_comment_char(),
            identity: None,
            verbose: false,
        }
    }
}

impl RestackConfig {
    /// Load the config of the repository at `repo_path`, then apply
    /// environment overrides.
    pub fn load(repo_path: &Path) -> Result<Self> {
        let mut config = Self::load_file(repo_path)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load only the on-disk config.
    pub fn load_file(repo_path: &Path) -> Result<Self> {
        let config_path = repo_path.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&config_path)?;
        let config: RestackConfig = serde_json::from_str(&data)
            .map_err(|e| HistoryError::Config(format!("{:?}: {}", config_path, e)))?;
        Ok(config)
    }

    /// Save config to a repository path.
    pub fn save(&self, repo_path: &Path) -> Result<()> {
        let config_path = repo_path.join(CONFIG_FILE);
        let tmp_path = config_path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(branch) = std::env::var("RESTACK_BRANCH") {
            self.branch = branch;
        }
        if let Ok(editor) = std::env::var("RESTACK_EDITOR") {
            self.editor = Some(editor);
        }
        match (
            std::env::var("RESTACK_AUTHOR_NAME"),
            std::env::var("RESTACK_AUTHOR_EMAIL"),
        ) {
            (Ok(name), Ok(email)) => self.identity = Some(Identity { name, email }),
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                return Err(HistoryError::Config(
                    "RESTACK_AUTHOR_NAME and RESTACK_AUTHOR_EMAIL must be set together".into(),
                ));
            }
            _ => {}
        }
        self.verbose = parse::env_bool("RESTACK_VERBOSE", self.verbose)?;
        Ok(())
    }
}
