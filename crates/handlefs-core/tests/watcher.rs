//! Poll-based change notification with a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use handlefs_core::config::{ChangeDetection, SessionConfig};
use handlefs_core::handle::memory::{MemoryDirectory, MemoryHost};
use handlefs_core::handle::{DirectoryHandle, PermissionState};
use handlefs_core::FileSystemSession;

const INTERVAL: Duration = Duration::from_millis(200);

async fn open(config: SessionConfig) -> (Arc<MemoryDirectory>, FileSystemSession) {
    let host = Arc::new(MemoryHost::new());
    let root = host.add_root("proj");
    let session = FileSystemSession::new(host, config);
    session.request_access().await.unwrap();
    (root, session)
}

fn config() -> SessionConfig {
    SessionConfig::builder().poll_interval_ms(INTERVAL.as_millis() as u64).build()
}

/// Sleep `n` intervals, landing halfway between ticks.
async fn wait_ticks(n: u32) {
    tokio::time::sleep(INTERVAL * n + INTERVAL / 2).await;
}

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |root: &str| sink.lock().unwrap().push(root.to_string()))
}

#[tokio::test(start_paused = true)]
async fn silent_while_untouched() {
    let (_root, session) = open(config()).await;
    session.create_file("a.txt", "x").await.unwrap();
    let (seen, cb) = recorder();
    let handle = session.watch_file_changes(cb);

    wait_ticks(5).await;
    assert!(seen.lock().unwrap().is_empty());
    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn fires_within_one_interval_of_external_add() {
    let (root, session) = open(config()).await;
    let (seen, cb) = recorder();
    let handle = session.watch_file_changes(cb);
    wait_ticks(1).await;

    root.get_file("external.txt", true).await.unwrap();
    wait_ticks(1).await;
    assert_eq!(*seen.lock().unwrap(), vec!["proj"]);
    assert!(session.file_tree().await.contains_leaf("external.txt"));
    assert!(session.file_stats().await.contains_key("external.txt"));

    // No second notification for the same state.
    wait_ticks(3).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn own_mutations_do_not_notify() {
    let (_root, session) = open(config()).await;
    let (seen, cb) = recorder();
    let handle = session.watch_file_changes(cb);

    session.create_file("mine.txt", "x").await.unwrap();
    session.move_entry("mine.txt", "moved.txt").await.unwrap();
    wait_ticks(3).await;
    assert!(seen.lock().unwrap().is_empty());
    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn failed_tick_does_not_stop_polling() {
    let (root, session) = open(config()).await;
    let (seen, cb) = recorder();
    let handle = session.watch_file_changes(cb);

    root.set_permission(PermissionState::Denied);
    wait_ticks(2).await;
    assert!(handle.is_active());
    assert!(seen.lock().unwrap().is_empty());

    root.set_permission(PermissionState::Granted);
    root.get_file("after.txt", true).await.unwrap();
    wait_ticks(1).await;
    assert_eq!(seen.lock().unwrap().len(), 1);
    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_notifications_and_is_idempotent() {
    let (root, session) = open(config()).await;
    let (seen, cb) = recorder();
    let handle = session.watch_file_changes(cb);
    handle.cancel();
    handle.cancel();
    assert!(!session.watchers().is_polling());

    root.get_file("late.txt", true).await.unwrap();
    wait_ticks(3).await;
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_watch_replaces_first_by_default() {
    let (root, session) = open(config()).await;
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (f, s) = (first.clone(), second.clone());

    let h1 = session.watch_file_changes(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let h2 = session.watch_file_changes(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });
    assert!(!h1.is_active());
    assert_eq!(session.watchers().len(), 1);

    root.get_file("x.txt", true).await.unwrap();
    wait_ticks(1).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    h2.cancel();
}

#[tokio::test(start_paused = true)]
async fn shared_watchers_when_not_exclusive() {
    let config = SessionConfig::builder()
        .poll_interval_ms(INTERVAL.as_millis() as u64)
        .exclusive_watcher(false)
        .build();
    let (root, session) = open(config).await;
    let (a_seen, a) = recorder();
    let (b_seen, b) = recorder();
    let ha = session.watch_file_changes(a);
    let hb = session.watch_file_changes(b);
    assert_eq!(session.watchers().len(), 2);

    root.get_file("x.txt", true).await.unwrap();
    wait_ticks(1).await;
    assert_eq!(a_seen.lock().unwrap().len(), 1);
    assert_eq!(b_seen.lock().unwrap().len(), 1);
    ha.cancel();
    hb.cancel();
}

#[tokio::test(start_paused = true)]
async fn content_mode_sees_in_place_edits() {
    let structure = open(config()).await;
    let content = open(
        SessionConfig::builder()
            .poll_interval_ms(INTERVAL.as_millis() as u64)
            .change_detection(ChangeDetection::Content)
            .build(),
    )
    .await;

    for (_, session) in [&structure, &content] {
        session.create_file("doc.txt", "v1").await.unwrap();
    }
    let (structure_seen, s_cb) = recorder();
    let (content_seen, c_cb) = recorder();
    let hs = structure.1.watch_file_changes(s_cb);
    let hc = content.1.watch_file_changes(c_cb);

    for (root, _) in [&structure, &content] {
        root.get_file("doc.txt", false)
            .await
            .unwrap()
            .write(b"version two")
            .await
            .unwrap();
    }
    wait_ticks(2).await;
    assert!(structure_seen.lock().unwrap().is_empty());
    assert_eq!(content_seen.lock().unwrap().len(), 1);
    assert_eq!(content.1.file_stats().await["doc.txt"].size, 11);
    hs.cancel();
    hc.cancel();
}
