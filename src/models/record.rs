//! Durable commit records persisted in the history file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::finding::Finding;

/// Git status of one file inside a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
}

/// Per-file detail embedded in a [`CommitRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub diff: String,
    pub lines_added: u32,
    pub lines_removed: u32,
    pub status: FileStatus,
}

impl FileEntry {
    /// Derive an entry from a file's unified diff section.
    ///
    /// Counts `+`/`-` prefixed lines, skipping the `+++`/`---` headers, and
    /// derives the status from `/dev/null` markers.
    pub fn from_diff(path: impl Into<String>, diff: impl Into<String>) -> Self {
        let diff = diff.into();
        let mut added = 0;
        let mut removed = 0;
        let mut status = FileStatus::Modified;

        for line in diff.lines() {
            if let Some(rest) = line.strip_prefix("---") {
                if rest.trim() == "/dev/null" {
                    status = FileStatus::Added;
                }
            } else if let Some(rest) = line.strip_prefix("+++") {
                if rest.trim() == "/dev/null" {
                    status = FileStatus::Deleted;
                }
            } else if line.starts_with('+') {
                added += 1;
            } else if line.starts_with('-') {
                removed += 1;
            }
        }

        Self {
            path: path.into(),
            diff,
            lines_added: added,
            lines_removed: removed,
            status,
        }
    }
}

/// The operator's choice at the review gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    /// Pause for a hand edit, then re-review.
    Manual,
    /// Apply AI-generated patches, then re-review.
    #[serde(rename = "aifix")]
    AiFix,
    /// Proceed with the current code.
    Continue,
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Manual => write!(f, "manual"),
            ReviewAction::AiFix => write!(f, "aifix"),
            ReviewAction::Continue => write!(f, "continue"),
        }
    }
}

/// Who produced a fix recorded during the gate loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixKind {
    Ai,
    Manual,
}

/// One applied fix, embedded in a [`ReviewRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRecord {
    pub file: String,
    pub description: String,
    pub kind: FixKind,
}

/// Snapshot of the review gate's outcome for a flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub findings: Vec<Finding>,
    pub has_blockers: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ReviewAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixes: Vec<FixRecord>,
}

/// Metadata about a single commit made by the daemon. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
    pub files: Vec<FileEntry>,
    pub group_reason: String,
    pub ai_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewRecord>,
    pub pushed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entry_counts_added_and_removed_lines() {
        let diff = "diff --git a/f.rs b/f.rs\n\
                    --- a/f.rs\n\
                    +++ b/f.rs\n\
                    @@ -1,2 +1,3 @@\n\
                    -old line\n\
                    +new line\n\
                    +another line\n \
                    context\n";
        let entry = FileEntry::from_diff("f.rs", diff);
        assert_eq!(entry.lines_added, 2);
        assert_eq!(entry.lines_removed, 1);
        assert_eq!(entry.status, FileStatus::Modified);
    }

    #[test]
    fn file_entry_headers_do_not_count_as_changes() {
        let diff = "--- a/f.rs\n+++ b/f.rs\n";
        let entry = FileEntry::from_diff("f.rs", diff);
        assert_eq!(entry.lines_added, 0);
        assert_eq!(entry.lines_removed, 0);
    }

    #[test]
    fn file_entry_detects_added_file() {
        let diff = "--- /dev/null\n+++ b/new.rs\n@@ -0,0 +1,1 @@\n+fn main() {}\n";
        let entry = FileEntry::from_diff("new.rs", diff);
        assert_eq!(entry.status, FileStatus::Added);
        assert_eq!(entry.lines_added, 1);
    }

    #[test]
    fn file_entry_detects_deleted_file() {
        let diff = "--- a/old.rs\n+++ /dev/null\n@@ -1,1 +0,0 @@\n-fn main() {}\n";
        let entry = FileEntry::from_diff("old.rs", diff);
        assert_eq!(entry.status, FileStatus::Deleted);
        assert_eq!(entry.lines_removed, 1);
    }

    #[test]
    fn review_action_serde() {
        assert_eq!(
            serde_json::to_string(&ReviewAction::AiFix).unwrap(),
            "\"aifix\""
        );
        assert_eq!(
            serde_json::to_string(&ReviewAction::Manual).unwrap(),
            "\"manual\""
        );
        let back: ReviewAction = serde_json::from_str("\"continue\"").unwrap();
        assert_eq!(back, ReviewAction::Continue);
    }

    #[test]
    fn commit_record_round_trips() {
        let record = CommitRecord {
            hash: "abc123".into(),
            message: "feat: add thing".into(),
            files: vec![FileEntry::from_diff("a.rs", "--- a/a.rs\n+++ b/a.rs\n+x\n")],
            group_reason: "same package: src".into(),
            ai_generated: true,
            review: None,
            pushed: false,
            pushed_at: None,
            remote: None,
            branch: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: CommitRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
