//! End-to-end behavior of a session over the in-memory host.

use std::sync::Arc;

use handlefs_core::config::{IgnoreMode, SessionConfig};
use handlefs_core::error::HandleFsError;
use handlefs_core::handle::memory::{EnumerationOrder, MemoryDirectory, MemoryHost};
use handlefs_core::handle::DirectoryHandle;
use handlefs_core::FileSystemSession;

async fn open(config: SessionConfig) -> (Arc<MemoryDirectory>, FileSystemSession) {
    let host = Arc::new(MemoryHost::new());
    let root = host.add_root("proj");
    let session = FileSystemSession::new(host, config);
    session.request_access().await.unwrap();
    (root, session)
}

// ── Round trip & mutations ─────────────────────────────────────────

#[tokio::test]
async fn create_then_read_round_trips() {
    let (_root, session) = open(SessionConfig::default()).await;
    let cases = [
        ("top.txt", ""),
        ("a/b/c/deep.md", "# title\n\nbody"),
        ("unicode/ünï.txt", "héllo wörld ✓"),
        ("proj/prefixed.txt", "root name is stripped"),
    ];
    for (path, content) in cases {
        session.create_file(path, content).await.unwrap();
        assert_eq!(session.read_file_content(path).await.unwrap(), content);
    }
    assert!(session.file_tree().await.contains_leaf("prefixed.txt"));
}

#[tokio::test]
async fn write_replaces_whole_content() {
    let (_root, session) = open(SessionConfig::default()).await;
    session.create_file("f.txt", "a much longer original").await.unwrap();
    session.write_file_content("f.txt", "short").await.unwrap();
    assert_eq!(session.read_file_content("f.txt").await.unwrap(), "short");
    assert_eq!(session.get_file_stats("f.txt").await.unwrap().size, 5);
}

#[tokio::test]
async fn delete_removes_from_tree_and_stats() {
    let (_root, session) = open(SessionConfig::default()).await;
    session.create_file("dir/keep.txt", "k").await.unwrap();
    session.create_file("dir/gone.txt", "g").await.unwrap();

    session.delete_entry("dir/gone.txt").await.unwrap();
    session.refresh_file_tree().await.unwrap();

    let tree = session.file_tree().await;
    assert!(!tree.leaf_paths().iter().any(|p| p == "dir/gone.txt"));
    assert!(tree.contains_leaf("dir/keep.txt"));
    assert!(!session.file_stats().await.contains_key("dir/gone.txt"));
    let err = session.get_file_stats("dir/gone.txt").await.unwrap_err();
    assert!(matches!(err, HandleFsError::NotFound { .. }));
}

#[tokio::test]
async fn delete_directory_is_recursive() {
    let (_root, session) = open(SessionConfig::default()).await;
    session.create_file("d/e/f/g.txt", "x").await.unwrap();
    session.delete_entry("d").await.unwrap();
    assert!(session.file_tree().await.is_empty());
    assert!(session.delete_entry("d").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn move_preserves_content_and_removes_source() {
    let (_root, session) = open(SessionConfig::default()).await;
    session.create_file("src/file.txt", "payload").await.unwrap();
    session.create_file("src/sub/inner.txt", "inner").await.unwrap();

    session.move_entry("src/file.txt", "dst/file.txt").await.unwrap();
    assert_eq!(session.read_file_content("dst/file.txt").await.unwrap(), "payload");
    let err = session.read_file_content("src/file.txt").await.unwrap_err();
    assert!(matches!(err, HandleFsError::NotFound { .. }));

    session.move_entry("src", "moved").await.unwrap();
    assert_eq!(session.read_file_content("moved/sub/inner.txt").await.unwrap(), "inner");
    assert!(session.get_all_files_in_directory("src").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn copy_preserves_content_and_keeps_source() {
    let (_root, session) = open(SessionConfig::default()).await;
    session.create_file("a.txt", "same").await.unwrap();
    session.copy_entry("a.txt", "copies/b.txt").await.unwrap();
    assert_eq!(session.read_file_content("a.txt").await.unwrap(), "same");
    assert_eq!(session.read_file_content("copies/b.txt").await.unwrap(), "same");

    session.copy_entry("copies", "copies2").await.unwrap();
    assert_eq!(
        session.get_all_files_in_directory("").await.unwrap(),
        vec!["a.txt", "copies/b.txt", "copies2/b.txt"]
    );
}

#[tokio::test]
async fn resolution_errors_surface_to_caller() {
    let (_root, session) = open(SessionConfig::default()).await;
    session.create_file("file.txt", "x").await.unwrap();
    session.create_directory("dir").await.unwrap();

    let err = session.read_file_content("file.txt/child").await.unwrap_err();
    assert!(matches!(err, HandleFsError::InvalidPath { .. }));
    let err = session.read_file_content("dir").await.unwrap_err();
    assert!(matches!(err, HandleFsError::NotAFile { .. }));
    let err = session.read_file_content("../escape").await.unwrap_err();
    assert!(matches!(err, HandleFsError::InvalidPath { .. }));
}

#[tokio::test]
async fn revoked_permission_fails_at_point_of_use() {
    let (root, session) = open(SessionConfig::default()).await;
    session.create_file("a.txt", "x").await.unwrap();
    root.set_permission(handlefs_core::handle::PermissionState::Prompt);

    let err = session.read_file_content("a.txt").await.unwrap_err();
    assert!(matches!(err, HandleFsError::Permission { .. }));
    // Cached snapshot is untouched by the failure.
    assert!(session.file_tree().await.contains_leaf("a.txt"));
}

// ── Tree ───────────────────────────────────────────────────────────

#[tokio::test]
async fn concrete_scenario() {
    let (root, session) = open(SessionConfig::default()).await;
    root.get_directory("a", true)
        .await
        .unwrap()
        .get_file("b.txt", true)
        .await
        .unwrap()
        .write(b"hi")
        .await
        .unwrap();
    session.refresh_file_tree().await.unwrap();

    let json = serde_json::to_string(&session.file_tree().await).unwrap();
    assert_eq!(json, r#"{"a":{"b.txt":"a/b.txt"}}"#);
    assert_eq!(session.file_stats().await["a/b.txt"].size, 2);

    let stat = session.get_file_stats("a/b.txt").await.unwrap();
    assert_eq!(stat.size, 2);
    assert_eq!(stat.content_type, "text/plain");
    assert!(stat.last_modified > 0);

    session.rename_entry("a/b.txt", "a/c.txt").await.unwrap();
    assert_eq!(session.read_file_content("a/c.txt").await.unwrap(), "hi");
    assert!(session.read_file_content("a/b.txt").await.is_err());
}

#[tokio::test]
async fn refresh_keeps_stats_in_step_with_tree() {
    let (root, session) = open(SessionConfig::default()).await;
    root.get_file("ext.txt", true)
        .await
        .unwrap()
        .write(b"hey")
        .await
        .unwrap();

    session.refresh_file_tree().await.unwrap();
    assert!(session.file_tree().await.contains_leaf("ext.txt"));
    assert_eq!(session.file_stats().await["ext.txt"].size, 3);
    // Already absorbed, so a watcher tick has nothing left to report.
    assert!(!session.poll_now().await.unwrap());

    root.get_file("later.txt", true).await.unwrap();
    session.update_stats().await.unwrap();
    let leaves = session.file_tree().await.leaf_paths();
    let keys: Vec<String> = session.file_stats().await.keys().cloned().collect();
    assert_eq!(leaves, keys);
    assert_eq!(keys, vec!["ext.txt", "later.txt"]);
}

#[tokio::test]
async fn tree_order_is_deterministic() {
    let (root, session) = open(SessionConfig::default()).await;
    for path in ["z/1.txt", "b.txt", "a/2.txt", "A.txt", "m/n/o.txt"] {
        session.create_file(path, "").await.unwrap();
    }
    let first = serde_json::to_string(&session.file_tree().await).unwrap();

    root.set_enumeration_order(EnumerationOrder::Reversed);
    session.refresh_file_tree().await.unwrap();
    let second = serde_json::to_string(&session.file_tree().await).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn stats_cover_every_leaf() {
    let (_root, session) = open(SessionConfig::default()).await;
    for path in ["x.txt", "d/y.json", "d/e/z"] {
        session.create_file(path, "12345").await.unwrap();
    }
    let tree_leaves = session.file_tree().await.leaf_paths();
    let stats = session.file_stats().await;
    let stat_keys: Vec<String> = stats.keys().cloned().collect();
    assert_eq!(tree_leaves, stat_keys);
    assert_eq!(stats["d/y.json"].content_type, "application/json");
    assert_eq!(stats["d/e/z"].content_type, "text/plain");
}

// ── Search & ignore ────────────────────────────────────────────────

#[tokio::test]
async fn search_matches_final_segment_and_honors_ignore() {
    let host = Arc::new(MemoryHost::new());
    let root = host.add_root("proj");
    root.get_file(".gitignore", true)
        .await
        .unwrap()
        .write(b"# build output\ntarget/\n*.tmp\n")
        .await
        .unwrap();
    let session = FileSystemSession::new(host, SessionConfig::default());
    session.request_access().await.unwrap();

    for path in [
        "src/foo.rs",
        "src/FOOBAR.md",
        "foo/readme.txt",
        "target/foo.o",
        "notes.foo.tmp",
        "other.txt",
    ] {
        session.create_file(path, "").await.unwrap();
    }

    let hits = session.search_files("foo").await.unwrap();
    assert_eq!(hits, vec!["foo", "src/FOOBAR.md", "src/foo.rs"]);
    assert_eq!(session.ignore_patterns().await, vec!["target/", "*.tmp"]);
    assert!(session.file_tree().await.get("target").is_none());
    assert!(!session.file_stats().await.contains_key("notes.foo.tmp"));
}

#[tokio::test]
async fn parse_only_mode_excludes_nothing() {
    let host = Arc::new(MemoryHost::new());
    let root = host.add_root("proj");
    root.get_file(".gitignore", true)
        .await
        .unwrap()
        .write(b"*.log\n")
        .await
        .unwrap();
    let config = SessionConfig::builder().ignore_mode(IgnoreMode::ParseOnly).build();
    let session = FileSystemSession::new(host, config);
    session.request_access().await.unwrap();
    session.create_file("app.log", "").await.unwrap();

    assert_eq!(session.ignore_patterns().await, vec!["*.log"]);
    assert_eq!(session.search_files("app").await.unwrap(), vec!["app.log"]);
}
