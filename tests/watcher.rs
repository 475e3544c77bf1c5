//! Coalescing and filtering properties of the filesystem watcher,
//! exercised against a real notify backend on a scratch directory.
//! Timings are generous to stay stable on slow CI machines.

use std::collections::BTreeSet;
use std::time::Duration;

use gitpulse::watcher::FileWatcher;

const DEBOUNCE: Duration = Duration::from_millis(300);
const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn burst_of_events_coalesces_into_one_changeset() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut rx) = FileWatcher::start(dir.path(), vec![], DEBOUNCE).unwrap();

    // Give the recursive watch a moment to attach before writing.
    tokio::time::sleep(Duration::from_millis(200)).await;

    for name in ["a.txt", "b.txt", "c.txt"] {
        tokio::fs::write(dir.path().join(name), "content\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    let set = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("a changeset should arrive")
        .expect("channel open");

    let paths: BTreeSet<String> = set.files.iter().map(|f| f.path.clone()).collect();
    assert_eq!(
        paths,
        BTreeSet::from(["a.txt".to_string(), "b.txt".to_string(), "c.txt".to_string()])
    );

    // The burst produced exactly one changeset; the channel stays quiet.
    let extra = tokio::time::timeout(Duration::from_millis(600), rx.recv()).await;
    assert!(extra.is_err(), "burst must coalesce into a single changeset");

    watcher.stop();
}

#[tokio::test]
async fn separate_bursts_produce_separate_changesets() {
    let dir = tempfile::tempdir().unwrap();
    let (watcher, mut rx) = FileWatcher::start(dir.path(), vec![], DEBOUNCE).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::fs::write(dir.path().join("first.txt"), "1\n")
        .await
        .unwrap();
    let first = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("first changeset")
        .expect("channel open");
    assert!(first.files.iter().any(|f| f.path == "first.txt"));

    tokio::fs::write(dir.path().join("second.txt"), "2\n")
        .await
        .unwrap();
    let second = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("second changeset")
        .expect("channel open");
    assert!(second.files.iter().any(|f| f.path == "second.txt"));
    assert!(
        !second.files.iter().any(|f| f.path == "first.txt"),
        "pending list must be cleared between emissions"
    );

    watcher.stop();
}

#[tokio::test]
async fn ignored_and_state_paths_are_dropped_at_ingress() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::create_dir_all(dir.path().join(".gitpulse"))
        .await
        .unwrap();

    let (watcher, mut rx) =
        FileWatcher::start(dir.path(), vec!["*.log".to_string()], DEBOUNCE).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::fs::write(dir.path().join("trace.log"), "noise\n")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join(".gitpulse/history.json"), "[]\n")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("kept.txt"), "signal\n")
        .await
        .unwrap();

    let set = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("a changeset should arrive")
        .expect("channel open");

    let paths: Vec<&str> = set.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["kept.txt"]);

    watcher.stop();
}
