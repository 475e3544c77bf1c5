//! Commit-sized bundles of related file changes.

/// A semantically related set of file changes destined for one commit.
///
/// Born from the heuristic grouper with `reason` and `files` set; the
/// refiner fills `commit_message` and may move files between groups; the
/// combined `diffs` are reassembled from the per-file sections whenever
/// membership changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileGroup {
    /// Paths relative to the repo root.
    pub files: Vec<String>,
    /// Why these files are grouped (e.g. `"same package: internal/auth"`).
    pub reason: String,
    /// Combined unified diff for all files in the group.
    pub diffs: String,
    /// Conventional-commit message, populated by the refiner.
    pub commit_message: String,
}

impl FileGroup {
    /// A group over `files` with the given reason and no diff or message yet.
    pub fn new(files: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            files,
            reason: reason.into(),
            diffs: String::new(),
            commit_message: String::new(),
        }
    }
}
