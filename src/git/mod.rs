//! Git CLI wrapper for staging, committing, pushing, and diffs.
//!
//! Shells out to `git` via `tokio::process::Command`. All paths are
//! relative to the repo root handed in at construction.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::FileGroup;
use crate::ui::Logger;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(String),

    #[error("git {command} failed (exit {status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("git output is not valid UTF-8: {0}")]
    Encoding(String),
}

/// Handles all git operations for one repository.
#[derive(Debug, Clone)]
pub struct GitManager {
    repo_root: PathBuf,
    remote: String,
    branch: String,
}

impl GitManager {
    pub fn new(repo_root: PathBuf, remote: String, branch: String) -> Self {
        Self {
            repo_root,
            remote,
            branch,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Run a git command in the repo root, enforcing a zero exit status.
    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = tokio::process::Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(GitError::Command {
                command: args.first().unwrap_or(&"").to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| GitError::Encoding(e.to_string()))
    }

    /// Unified diff for a single file against HEAD.
    ///
    /// Untracked files produce no output from `git diff HEAD`, so those
    /// fall back to a no-index diff against `/dev/null` (which exits 1
    /// when the file has content).
    pub async fn file_diff(&self, path: &str) -> Result<String, GitError> {
        let diff = self
            .run(&[
                "diff",
                "--src-prefix=a/",
                "--dst-prefix=b/",
                "HEAD",
                "--",
                path,
            ])
            .await?;
        if !diff.trim().is_empty() {
            return Ok(diff);
        }

        // Untracked file: diff against /dev/null. Exit code 1 means
        // "differences found" here, not failure.
        let output = tokio::process::Command::new("git")
            .args([
                "diff",
                "--no-index",
                "--src-prefix=a/",
                "--dst-prefix=b/",
                "--",
                "/dev/null",
                path,
            ])
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| GitError::Spawn(e.to_string()))?;

        match output.status.code() {
            Some(0) | Some(1) => String::from_utf8(output.stdout)
                .map_err(|e| GitError::Encoding(e.to_string())),
            _ => Err(GitError::Command {
                command: "diff --no-index".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    /// Unstage everything currently in the index.
    pub async fn reset_index(&self) -> Result<(), GitError> {
        self.run(&["reset"]).await.map(|_| ())
    }

    /// Stage the given files.
    pub async fn stage_files(&self, files: &[String]) -> Result<(), GitError> {
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        self.run(&args).await.map(|_| ())
    }

    /// Commit the staged files and return the resulting hash.
    pub async fn commit(&self, message: &str) -> Result<String, GitError> {
        self.run(&["commit", "-m", message]).await?;
        let hash = self.run(&["rev-parse", "HEAD"]).await?;
        Ok(hash.trim().to_string())
    }

    /// Push to the configured remote and branch.
    pub async fn push(&self) -> Result<(), GitError> {
        self.run(&["push", &self.remote, &self.branch]).await.map(|_| ())
    }
}

/// Rebuild each group's combined diff from the current on-disk state.
///
/// Used both for the initial diff fetch and after fixes, so the next
/// review iteration sees current reality. Files whose diff cannot be
/// produced get a placeholder section.
pub async fn refresh_group_diffs(git: &GitManager, groups: &mut [FileGroup], logger: &Logger) {
    for group in groups.iter_mut() {
        group.diffs.clear();
        for file in &group.files {
            match git.file_diff(file).await {
                Ok(diff) if !diff.trim().is_empty() => {
                    group.diffs.push_str(&diff);
                    if !diff.ends_with('\n') {
                        group.diffs.push('\n');
                    }
                }
                Ok(_) => {
                    group
                        .diffs
                        .push_str(&format!("--- /dev/null\n+++ b/{file}\n(new or deleted file)\n"));
                }
                Err(e) => {
                    logger.warn(format!("could not diff {file}: {e}"));
                    group
                        .diffs
                        .push_str(&format!("--- /dev/null\n+++ b/{file}\n(new or deleted file)\n"));
                }
            }
        }
    }
}
