//! Shared types used across all modules.
//!
//! This module defines the core data structures for file changes, commit
//! groups, review findings, and persisted commit records. Other modules
//! import from here rather than reaching into each other's internals.

pub mod change;
pub mod finding;
pub mod group;
pub mod record;

pub use change::{ChangeKind, ChangeSet, FileChange};
pub use finding::{has_blockers, Finding, Location, ReviewResult, Severity};
pub use group::FileGroup;
pub use record::{
    CommitRecord, FileEntry, FileStatus, FixKind, FixRecord, ReviewAction, ReviewRecord,
};
