//! Commit message editing
//!
//! The editor is launched like a hook script: synchronously, through the
//! shell, with a non-zero exit treated as an abort. Tests substitute a
//! closure for [`MessageEditor`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::RestackConfig;
use crate::diff::{self, FileChange};
use crate::error::{HistoryError, Result};

/// File the message template is written to
pub const EDIT_MSG_FILE: &str = "EDIT_MSG";

/// Turns a seeded template into the final message
pub trait MessageEditor: Send + Sync {
    /// Return the edited text, or fail with [`HistoryError::EditAborted`].
    fn edit(&self, seed: &str) -> Result<String>;
}

impl<F> MessageEditor for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn edit(&self, seed: &str) -> Result<String> {
        self(seed)
    }
}

/// Runs an external editor command on `{repo}/EDIT_MSG`
pub struct CommandEditor {
    command: String,
    path: PathBuf,
}

impl CommandEditor {
    pub fn new(command: impl Into<String>, repo_path: &Path) -> Self {
        Self {
            command: command.into(),
            path: repo_path.join(EDIT_MSG_FILE),
        }
    }

    /// Editor from config, then `VISUAL`, then `EDITOR`, then `vi`.
    pub fn from_config(config: &RestackConfig, repo_path: &Path) -> Self {
        let command = config
            .editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .unwrap_or_else(|| "vi".to_string());
        Self::new(command, repo_path)
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl MessageEditor for CommandEditor {
    fn edit(&self, seed: &str) -> Result<String> {
        fs::write(&self.path, seed)?;

        tracing::debug!("launching editor '{}' on {:?}", self.command, self.path);
        let status = Command::new("sh")
            .arg("-c")
            .arg(format!("{} \"$@\"", self.command))
            .arg(&self.command)
            .arg(&self.path)
            .status()
            .map_err(|e| {
                HistoryError::EditAborted(format!("failed to launch editor '{}': {}", self.command, e))
            })?;

        if !status.success() {
            return Err(HistoryError::EditAborted(format!(
                "editor '{}' exited with code {}",
                self.command,
                status.code().unwrap_or(-1)
            )));
        }
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Build the template for an edited commit message.
pub fn message_template(body: &str, action: &str, changes: &[FileChange], comment_char: char) -> String {
    let mut seed = String::new();
    seed.push_str(body);
    seed.push_str("\n\n");
    seed.push_str(&format!(
        "{c} Please enter the commit message for the {action} changes. Lines starting\n\
         {c} with '{c}' will be ignored, and an empty message aborts the commit.\n\
         {c}\n",
        c = comment_char,
        action = action
    ));
    seed.push_str(&diff::status_summary(changes, comment_char));
    seed
}

/// Drop comment lines and trailing whitespace, squeeze runs of blank lines
/// and trim blank lines at both ends.
pub fn cleanup_message(text: &str, comment_char: char) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.starts_with(comment_char) {
            continue;
        }
        let line = line.trim_end();
        if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Present `body` to the editor and return the cleaned-up result.
pub fn compose_message(
    editor: &dyn MessageEditor,
    body: &str,
    action: &str,
    changes: &[FileChange],
    comment_char: char,
) -> Result<String> {
    let seed = message_template(body, action, changes, comment_char);
    let edited = editor.edit(&seed)?;
    let message = cleanup_message(&edited, comment_char);
    if message.is_empty() {
        return Err(HistoryError::EditAborted("empty commit message".into()));
    }
    Ok(message)
}
