//! PID file management for the daemon and its out-of-process companion.
//!
//! The daemon writes its decimal PID to `<root>/.gitpulse.pid` on startup
//! and removes it on clean shutdown; `gitpulse push` reads it to find the
//! process to signal. The file's content is untrusted input.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants;

/// Errors reading or writing the PID file.
#[derive(Error, Debug)]
pub enum PidError {
    #[error("no PID file at {path} — is the daemon running?")]
    Missing { path: PathBuf },

    #[error("PID file {path} does not contain a valid PID")]
    Invalid { path: PathBuf },

    #[error("failed to access PID file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn pid_path(root: &Path) -> PathBuf {
    root.join(constants::PID_FILENAME)
}

/// Write the current process PID into `root`.
pub fn write(root: &Path) -> Result<(), PidError> {
    let path = pid_path(root);
    std::fs::write(&path, std::process::id().to_string())
        .map_err(|e| PidError::Io { path, source: e })
}

/// Read a daemon PID from `root`.
pub fn read(root: &Path) -> Result<i32, PidError> {
    let path = pid_path(root);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(PidError::Missing { path }),
        Err(e) => return Err(PidError::Io { path, source: e }),
    };

    content
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or(PidError::Invalid { path })
}

/// Remove the PID file; missing files are fine on shutdown.
pub fn remove(root: &Path) {
    let _ = std::fs::remove_file(pid_path(root));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path()).unwrap();
        let pid = read(dir.path()).unwrap();
        assert_eq!(pid, std::process::id() as i32);
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read(dir.path()).unwrap_err();
        assert!(matches!(err, PidError::Missing { .. }));
        assert!(err.to_string().contains("daemon running"));
    }

    #[test]
    fn garbage_content_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(constants::PID_FILENAME), "not-a-pid").unwrap();
        let err = read(dir.path()).unwrap_err();
        assert!(matches!(err, PidError::Invalid { .. }));
    }

    #[test]
    fn negative_pid_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(constants::PID_FILENAME), "-5").unwrap();
        assert!(matches!(
            read(dir.path()).unwrap_err(),
            PidError::Invalid { .. }
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path()).unwrap();
        remove(dir.path());
        remove(dir.path());
        assert!(matches!(
            read(dir.path()).unwrap_err(),
            PidError::Missing { .. }
        ));
    }
}
