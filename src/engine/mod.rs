//! The pipeline engine: buffers change events, reacts to triggers, and
//! drives each flush through group → diff → refine → review → gate →
//! stage → commit → push, persisting a history record per commit.
//!
//! The engine is a single value owning all shared state: the pending
//! buffer, the safety timer, and the interactive flag are engine-scoped,
//! not process-scoped. Concurrency is a small fixed set of long-lived
//! tasks over channels; flushes are serialized on the main task.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::ai::AiClient;
use crate::config::Config;
use crate::constants::{self, FALLBACK_COMMIT_MESSAGE, WATCH_DEBOUNCE};
use crate::git::{self, GitManager};
use crate::grouper;
use crate::models::{ChangeSet, CommitRecord, FileChange, FileEntry, FileGroup};
use crate::review;
use crate::store::{HistoryStore, StoreError};
use crate::ui::Logger;
use crate::watcher::{FileWatcher, WatchError};

/// Errors constructing or running the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("failed to install signal handler: {0}")]
    Signal(std::io::Error),
}

/// Mutable accumulator of pending changes, guarded by a mutex.
///
/// Single writer (the event task), many readers. `drain` atomically
/// removes and returns everything buffered.
#[derive(Clone, Debug, Default)]
pub struct ChangeBuffer {
    inner: Arc<Mutex<Vec<FileChange>>>,
}

impl ChangeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a changeset's files, deduplicating by path.
    pub fn append(&self, set: ChangeSet) {
        let mut pending = self.inner.lock().expect("buffer poisoned");
        for change in set.files {
            match pending.iter_mut().find(|c| c.path == change.path) {
                Some(existing) => existing.kind = change.kind,
                None => pending.push(change),
            }
        }
    }

    /// Atomically remove and return all buffered changes.
    pub fn drain(&self) -> Vec<FileChange> {
        std::mem::take(&mut *self.inner.lock().expect("buffer poisoned"))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("buffer poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The long inactivity timer that flushes forgotten changes.
///
/// Re-armed on every buffer append, cancelled on every drain. The handle
/// lives behind its own mutex, separate from the buffer's.
#[derive(Clone, Debug)]
pub struct SafetyTimer {
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    period: Duration,
}

impl SafetyTimer {
    pub fn new(period: Duration) -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
            period,
        }
    }

    /// Restart the countdown. When it fires with a non-empty buffer, one
    /// trigger is sent on `tx`.
    pub fn rearm(&self, buffer: ChangeBuffer, tx: mpsc::Sender<()>) {
        let mut guard = self.handle.lock().expect("timer poisoned");
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        let period = self.period;
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            if !buffer.is_empty() {
                let _ = tx.send(()).await;
            }
        }));
    }

    /// Stop the countdown until the next re-arm.
    pub fn cancel(&self) {
        if let Some(handle) = self.handle.lock().expect("timer poisoned").take() {
            handle.abort();
        }
    }
}

/// Orchestrates the full pipeline for one working directory.
pub struct Engine {
    config: Config,
    logger: Arc<Logger>,
    git: GitManager,
    ai: AiClient,
    store: HistoryStore,
    buffer: ChangeBuffer,
    timer: SafetyTimer,
    /// Whether an operator is at the terminal. Signal- and timer-triggered
    /// flushes always run with interactivity off.
    pub interactive: bool,
}

impl Engine {
    /// Wire up the engine's collaborators from config.
    pub fn new(config: Config, logger: Arc<Logger>, ai: AiClient) -> Result<Self, EngineError> {
        let git = GitManager::new(
            config.watch_path.clone(),
            config.remote.clone(),
            config.branch.clone(),
        );
        let store = HistoryStore::open(
            config
                .watch_path
                .join(constants::STATE_DIR)
                .join(constants::HISTORY_FILENAME),
        )?;
        let timer = SafetyTimer::new(Duration::from_secs(config.debounce_seconds));

        Ok(Self {
            config,
            logger,
            git,
            ai,
            store,
            buffer: ChangeBuffer::new(),
            timer,
            interactive: false,
        })
    }

    /// Number of changes waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.buffer.len()
    }

    /// Append changes directly, as the event task would.
    pub fn append_changes(&self, set: ChangeSet) {
        self.buffer.append(set);
    }

    /// Run the daemon: watch, buffer, and flush on triggers until a
    /// terminating signal arrives or the watcher dies.
    pub async fn run(mut self, mut stdin_rx: mpsc::Receiver<String>) -> Result<(), EngineError> {
        use tokio::signal::unix::{signal, SignalKind};

        let (watcher, mut changes_rx) = FileWatcher::start(
            &self.config.watch_path,
            self.config.ignore_patterns.clone(),
            WATCH_DEBOUNCE,
        )?;

        // Safety-timer expiries and watcher shutdown arrive as messages so
        // the main select below stays the only flush site.
        let (timer_tx, mut timer_rx) = mpsc::channel::<()>(4);
        let (closed_tx, mut closed_rx) = mpsc::channel::<()>(1);

        // Event task: drain the watcher stream into the buffer and keep
        // the safety timer armed.
        let buffer = self.buffer.clone();
        let timer = self.timer.clone();
        let logger = Arc::clone(&self.logger);
        let event_timer_tx = timer_tx.clone();
        let event_task = tokio::spawn(async move {
            while let Some(set) = changes_rx.recv().await {
                logger.info(format!("Changes detected: {} file(s)", set.files.len()));
                for change in &set.files {
                    logger.info(format!("  {} ({})", change.path, change.kind));
                }
                buffer.append(set);
                timer.rearm(buffer.clone(), event_timer_tx.clone());
            }
            let _ = closed_tx.send(()).await;
        });

        let mut usr1 = signal(SignalKind::user_defined1()).map_err(EngineError::Signal)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(EngineError::Signal)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(EngineError::Signal)?;

        self.logger.info("Watching for changes...");
        self.logger
            .info("Press ENTER to commit & push (or Ctrl+C to quit)");

        let mut stdin_open = true;
        loop {
            tokio::select! {
                line = stdin_rx.recv(), if stdin_open => {
                    match line {
                        Some(_) => {
                            let pending = self.pending_count();
                            if pending > 0 {
                                self.logger.info(format!("Flushing {pending} change(s)..."));
                                let interactive = self.interactive;
                                self.flush(interactive, &mut stdin_rx).await;
                                self.logger
                                    .info("Press ENTER to commit & push (or Ctrl+C to quit)");
                            } else {
                                self.logger.info("No pending changes to flush");
                            }
                        }
                        None => stdin_open = false,
                    }
                }
                _ = usr1.recv() => {
                    self.logger.info("Received push signal — flushing changes...");
                    self.flush(false, &mut stdin_rx).await;
                }
                _ = timer_rx.recv() => {
                    if !self.buffer.is_empty() {
                        self.logger.info("Safety timer expired — flushing changes...");
                        self.flush(false, &mut stdin_rx).await;
                    }
                }
                _ = sigint.recv() => break,
                _ = sigterm.recv() => break,
                _ = closed_rx.recv() => {
                    self.logger.warn("Watcher stream closed — shutting down");
                    break;
                }
            }
        }

        self.logger.info("Shutting down GitPulse...");
        self.timer.cancel();
        watcher.stop();
        event_task.abort();
        Ok(())
    }

    /// Drain the buffer and run it through the full pipeline.
    ///
    /// Serialized by construction: only the main task calls this. Every
    /// stage degrades or isolates its own failures; nothing here aborts
    /// the daemon.
    pub async fn flush(&mut self, interactive: bool, stdin: &mut mpsc::Receiver<String>) {
        self.timer.cancel();
        let changes = self.buffer.drain();
        if changes.is_empty() {
            return;
        }

        let changeset = ChangeSet::now(changes);
        let mut groups = grouper::pre_group(&changeset);
        git::refresh_group_diffs(&self.git, &mut groups, &self.logger).await;

        // Refine, falling back to the heuristic groups with sentinel
        // messages when the model is unreachable.
        let mut refined = match self.ai.refine_groups(groups.clone()).await {
            Ok(refined) => refined,
            Err(e) => {
                self.logger.warn(format!(
                    "AI refinement failed, falling back to heuristic groups: {e}"
                ));
                let mut fallback = groups;
                for group in &mut fallback {
                    if group.commit_message.is_empty() {
                        group.commit_message = FALLBACK_COMMIT_MESSAGE.to_string();
                    }
                }
                fallback
            }
        };

        self.logger.groups(&refined);

        let review_record = if self.config.ai.code_review {
            review::run_gate(
                &mut refined,
                &self.ai,
                &self.git,
                &self.logger,
                interactive,
                stdin,
            )
            .await
        } else {
            None
        };

        if let Err(e) = self.git.reset_index().await {
            self.logger.error("Failed to reset staging", &e);
            return;
        }

        // Per-group failures are isolated: a failed stage or commit skips
        // that group and the batch continues.
        let mut committed: Vec<String> = Vec::new();
        for group in &refined {
            if let Err(e) = self.git.stage_files(&group.files).await {
                self.logger.error(
                    format!("Failed to stage {}", group.files.join(", ")),
                    &e,
                );
                continue;
            }

            let hash = match self.git.commit(&group.commit_message).await {
                Ok(hash) => hash,
                Err(e) => {
                    self.logger.error("Failed to commit", &e);
                    continue;
                }
            };

            self.logger.commit_success(&hash, &group.commit_message);

            let record = build_record(group, &hash, review_record.clone());
            if let Err(e) = self.store.save(record) {
                // The commit stands in the VCS even if history is behind.
                self.logger.warn(format!("Failed to save commit record: {e}"));
            }
            committed.push(hash);
        }

        if !committed.is_empty() && self.config.auto_push {
            match self.git.push().await {
                Ok(()) => {
                    self.logger
                        .push_success(committed.len(), self.git.remote());
                    if let Err(e) = self.store.mark_pushed(
                        &committed,
                        self.git.remote(),
                        self.git.branch(),
                    ) {
                        self.logger
                            .warn(format!("Failed to mark records as pushed: {e}"));
                    }
                }
                Err(e) => self.logger.error("Failed to push", &e),
            }
        }
    }

    /// Read-only view of the history, for inspection after flushes.
    pub fn history(&self) -> &HistoryStore {
        &self.store
    }
}

/// Assemble the durable record for one committed group.
fn build_record(
    group: &FileGroup,
    hash: &str,
    review: Option<crate::models::ReviewRecord>,
) -> CommitRecord {
    let file_diffs = per_file_sections(group);
    let files = group
        .files
        .iter()
        .zip(file_diffs)
        .map(|(path, diff)| FileEntry::from_diff(path.clone(), diff))
        .collect();

    CommitRecord {
        hash: hash.to_string(),
        message: group.commit_message.clone(),
        files,
        group_reason: group.reason.clone(),
        ai_generated: true,
        review,
        pushed: false,
        pushed_at: None,
        remote: None,
        branch: None,
        created_at: Utc::now(),
    }
}

/// Slice a group's combined diff into one section per member file, in
/// member order. Files without a recognizable section get an empty diff.
fn per_file_sections(group: &FileGroup) -> Vec<String> {
    if group.files.len() == 1 {
        return vec![group.diffs.clone()];
    }

    group
        .files
        .iter()
        .map(|file| {
            for section in group.diffs.split("diff --git") {
                if section.trim().is_empty() {
                    continue;
                }
                let a = format!(" a/{file} ");
                let b = format!(" b/{file}\n");
                if section.contains(&a) || section.contains(&b) {
                    return format!("diff --git{section}");
                }
            }
            String::new()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeKind;

    fn change(path: &str) -> FileChange {
        FileChange {
            path: path.to_string(),
            kind: ChangeKind::Modified,
        }
    }

    #[test]
    fn buffer_append_and_drain() {
        let buffer = ChangeBuffer::new();
        buffer.append(ChangeSet::now(vec![change("a.rs"), change("b.rs")]));
        assert_eq!(buffer.len(), 2);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].path, "a.rs");
        assert_eq!(buffer.len(), 0, "drain must empty the buffer");
    }

    #[test]
    fn buffer_deduplicates_across_appends() {
        let buffer = ChangeBuffer::new();
        buffer.append(ChangeSet::now(vec![change("a.rs")]));
        buffer.append(ChangeSet::now(vec![
            FileChange {
                path: "a.rs".into(),
                kind: ChangeKind::Deleted,
            },
            change("b.rs"),
        ]));

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, ChangeKind::Deleted);
    }

    #[tokio::test]
    async fn safety_timer_fires_when_buffer_nonempty() {
        let buffer = ChangeBuffer::new();
        buffer.append(ChangeSet::now(vec![change("a.rs")]));

        let timer = SafetyTimer::new(Duration::from_millis(20));
        let (tx, mut rx) = mpsc::channel(1);
        timer.rearm(buffer, tx);

        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timer should fire")
            .expect("trigger should arrive");
    }

    #[tokio::test]
    async fn safety_timer_skips_empty_buffer() {
        let timer = SafetyTimer::new(Duration::from_millis(20));
        let (tx, mut rx) = mpsc::channel(1);
        timer.rearm(ChangeBuffer::new(), tx);

        let fired = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(fired.is_err(), "empty buffer must not trigger a flush");
    }

    #[tokio::test]
    async fn safety_timer_rearm_replaces_previous_countdown() {
        let buffer = ChangeBuffer::new();
        buffer.append(ChangeSet::now(vec![change("a.rs")]));

        let timer = SafetyTimer::new(Duration::from_millis(100));
        let (tx, mut rx) = mpsc::channel(4);
        timer.rearm(buffer.clone(), tx.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.rearm(buffer, tx);

        // The first countdown was aborted, so nothing arrives at t=100ms.
        let early = tokio::time::timeout(Duration::from_millis(70), rx.recv()).await;
        assert!(early.is_err());

        // The second countdown fires.
        tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("rearmed timer should fire")
            .expect("trigger should arrive");
    }

    #[tokio::test]
    async fn safety_timer_cancel_stops_countdown() {
        let buffer = ChangeBuffer::new();
        buffer.append(ChangeSet::now(vec![change("a.rs")]));

        let timer = SafetyTimer::new(Duration::from_millis(20));
        let (tx, mut rx) = mpsc::channel(1);
        timer.rearm(buffer, tx);
        timer.cancel();

        let fired = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
        assert!(fired.is_err(), "cancelled timer must not fire");
    }

    #[test]
    fn per_file_sections_split_by_header() {
        let group = FileGroup {
            files: vec!["a.rs".into(), "b.rs".into()],
            reason: "same package: .".into(),
            diffs: "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n+one\n\
                    diff --git a/b.rs b/b.rs\n--- a/b.rs\n+++ b/b.rs\n+two\n"
                .into(),
            commit_message: "m".into(),
        };
        let sections = per_file_sections(&group);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].contains("+one"));
        assert!(!sections[0].contains("+two"));
        assert!(sections[1].contains("+two"));
    }

    #[test]
    fn build_record_computes_line_counts() {
        let group = FileGroup {
            files: vec!["a.rs".into()],
            reason: "singletons a.rs".into(),
            diffs: "--- a/a.rs\n+++ b/a.rs\n@@ -1 +1,2 @@\n context\n+added\n".into(),
            commit_message: "feat: add".into(),
        };
        let record = build_record(&group, "deadbeef", None);
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.files[0].lines_added, 1);
        assert_eq!(record.files[0].lines_removed, 0);
        assert!(record.ai_generated);
        assert!(!record.pushed);
    }
}
