//! Filesystem watcher emitting debounced [`ChangeSet`]s.
//!
//! Recursively observes the watch root via `notify` and coalesces rapid
//! editor saves into one batch per quiescence window. The window here is
//! short (seconds); the long safety timer lives in the engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::constants;
use crate::models::{ChangeKind, ChangeSet, FileChange};

/// Errors starting the watcher.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to create filesystem watcher: {0}")]
    Create(notify::Error),

    #[error("failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}

/// A running filesystem watcher.
///
/// Dropping it stops the underlying notify watcher, which closes the raw
/// event channel and lets the debounce task drain and exit; downstream
/// consumers observe this as their channel closing.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    ///
    /// Accepted events are coalesced for `debounce` of inactivity, then
    /// emitted as one [`ChangeSet`] on the returned channel.
    pub fn start(
        root: &Path,
        ignore_patterns: Vec<String>,
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<ChangeSet>), WatchError> {
        // notify reports canonical paths; resolve the root the same way so
        // relative paths come out clean.
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
            // The callback runs on notify's own thread; an unbounded send
            // is the only safe handoff into the async side from here.
            let _ = raw_tx.send(result);
        })
        .map_err(WatchError::Create)?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch {
                path: root.clone(),
                source: e,
            })?;

        let (out_tx, out_rx) = mpsc::channel(16);
        let task = tokio::spawn(debounce_loop(
            raw_rx,
            out_tx,
            root,
            ignore_patterns,
            debounce,
        ));

        Ok((
            Self {
                _watcher: watcher,
                task,
            },
            out_rx,
        ))
    }

    /// Stop watching. Equivalent to dropping the watcher.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// Accumulate raw events and emit one `ChangeSet` per quiescence window.
async fn debounce_loop(
    mut raw_rx: mpsc::UnboundedReceiver<Result<Event, notify::Error>>,
    out_tx: mpsc::Sender<ChangeSet>,
    root: PathBuf,
    ignore_patterns: Vec<String>,
    debounce: Duration,
) {
    let mut pending: Vec<FileChange> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            event = raw_rx.recv() => {
                match event {
                    Some(Ok(event)) => {
                        if accept(&mut pending, &event, &root, &ignore_patterns) {
                            deadline = Some(Instant::now() + debounce);
                        }
                    }
                    // Transient watcher errors are swallowed; a fatal error
                    // closes the stream and lands in the None arm.
                    Some(Err(_)) => {}
                    None => return,
                }
            }
            // Snapshot the pending list before handing it across the task
            // boundary; the event loop keeps appending while the receiver
            // runs the pipeline.
            _ = sleep_until(deadline), if deadline.is_some() => {
                deadline = None;
                let snapshot = std::mem::take(&mut pending);
                if !snapshot.is_empty()
                    && out_tx.send(ChangeSet::now(snapshot)).await.is_err()
                {
                    return;
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Fold one raw notify event into the pending list.
///
/// Returns `true` if anything was accepted, i.e. the debounce window
/// should reset.
fn accept(
    pending: &mut Vec<FileChange>,
    event: &Event,
    root: &Path,
    ignore_patterns: &[String],
) -> bool {
    let kind = match map_kind(&event.kind) {
        Some(kind) => kind,
        None => return false,
    };

    let mut accepted = false;
    for path in &event.paths {
        if should_ignore(path, ignore_patterns) {
            continue;
        }
        // New directories are picked up by the recursive watch; the
        // creation event itself is not forwarded.
        if kind == ChangeKind::Created && path.is_dir() {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        // Deduplicate by path, keeping arrival order and the latest kind.
        match pending.iter_mut().find(|c| c.path == rel) {
            Some(existing) => existing.kind = kind,
            None => pending.push(FileChange { path: rel, kind }),
        }
        accepted = true;
    }
    accepted
}

fn map_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

/// Whether a path matches the configured ignore patterns.
///
/// Patterns are shell globs matched against the basename; a trailing `/`
/// marks a directory entry and is stripped before matching. The pipeline's
/// own state directory and PID file are always dropped.
fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    if path
        .components()
        .any(|c| c.as_os_str() == constants::STATE_DIR)
    {
        return true;
    }

    let base = match path.file_name().and_then(|n| n.to_str()) {
        Some(base) => base,
        None => return false,
    };
    if base == constants::PID_FILENAME {
        return true;
    }

    // Ignore patterns also apply to any ancestor directory name, so
    // `node_modules/` drops files inside it, not just the entry itself.
    patterns.iter().any(|raw| {
        let pattern = raw.trim_end_matches('/');
        path.components().any(|c| match c.as_os_str().to_str() {
            Some(name) => {
                name == pattern
                    || glob::Pattern::new(pattern)
                        .map(|p| p.matches(name))
                        .unwrap_or(false)
            }
            None => false,
        })
    })
}
