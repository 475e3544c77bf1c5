//! Durable commit history persisted as pretty-printed JSON.
//!
//! The history is an append-only array of [`CommitRecord`]s addressed by
//! commit hash. Every mutation rewrites the whole file; writes go through
//! a sibling temp file and an atomic rename so a crash mid-write never
//! corrupts existing history.

use chrono::Utc;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::CommitRecord;

/// Errors from history persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read history file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("history file {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write history file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode history: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Aggregate numbers served by the dashboard.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Stats {
    pub total_commits: usize,
    pub pushed_commits: usize,
    pub ai_generated: usize,
    pub files_changed: usize,
    pub lines_added: u64,
    pub lines_removed: u64,
}

/// Persists commit history to a JSON file.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<CommitRecord>,
}

impl HistoryStore {
    /// Open the history at `path`, loading existing records if present.
    /// The parent directory is created when missing.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let records = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::Decode {
                path: path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StoreError::Read {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        Ok(Self { path, records })
    }

    /// Append a record and persist.
    pub fn save(&mut self, record: CommitRecord) -> Result<(), StoreError> {
        self.records.push(record);
        self.flush()
    }

    /// Mark the given hashes as pushed to `remote`/`branch` and persist.
    pub fn mark_pushed(
        &mut self,
        hashes: &[String],
        remote: &str,
        branch: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        for record in &mut self.records {
            if hashes.contains(&record.hash) {
                record.pushed = true;
                record.pushed_at = Some(now);
                record.remote = Some(remote.to_string());
                record.branch = Some(branch.to_string());
            }
        }
        self.flush()
    }

    /// All records in append order.
    pub fn all(&self) -> &[CommitRecord] {
        &self.records
    }

    /// The last `n` records in append order.
    pub fn recent(&self, n: usize) -> &[CommitRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Look up a record by commit hash.
    pub fn get_by_hash(&self, hash: &str) -> Option<&CommitRecord> {
        self.records.iter().find(|r| r.hash == hash)
    }

    /// All records touching the given file path.
    pub fn get_by_file(&self, path: &str) -> Vec<&CommitRecord> {
        self.records
            .iter()
            .filter(|r| r.files.iter().any(|f| f.path == path))
            .collect()
    }

    /// Aggregate statistics over all records.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats {
            total_commits: self.records.len(),
            ..Stats::default()
        };
        for record in &self.records {
            if record.pushed {
                stats.pushed_commits += 1;
            }
            if record.ai_generated {
                stats.ai_generated += 1;
            }
            stats.files_changed += record.files.len();
            for file in &record.files {
                stats.lines_added += u64::from(file.lines_added);
                stats.lines_removed += u64::from(file.lines_removed);
            }
        }
        stats
    }

    /// Rewrite the history file via temp file + rename.
    fn flush(&self) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(&self.records).map_err(StoreError::Encode)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(|e| StoreError::Write {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}
