pub mod config;
pub mod error;
pub mod filesystem;
pub mod handle;
pub mod ignore;
pub mod store;
pub mod watcher;

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use config::{ChangeDetection, SessionConfig};
use error::{HandleFsError, Result};
use filesystem::resolver::{resolve, RelPath};
use filesystem::{mutation, search, stats, tree, FileStat, StatsMap, TreeNode, WalkOptions};
use handle::{AccessMode, DirHandle, Handle, Host, PermissionState};
use ignore::IgnoreFilter;
use store::{MovePhase, MoveRecord, StateStore};
use watcher::{fingerprint, ChangeCallback, ChangeSource, WatchHandle, WatcherRegistry};

pub use config::SessionConfigBuilder;
pub use error::HandleFsError as Error;

/// Everything cached for the current root.
#[derive(Default)]
struct SessionState {
    root: Option<DirHandle>,
    tree: TreeNode,
    stats: StatsMap,
    ignore: IgnoreFilter,
    fingerprint: Option<u64>,
    search_results: Vec<String>,
}

struct SessionInner {
    host: Arc<dyn Host>,
    config: SessionConfig,
    state: RwLock<SessionState>,
    /// Serializes mutations, refreshes and watcher ticks.
    op_lock: Mutex<()>,
    watchers: WatcherRegistry,
    store: OnceLock<StateStore>,
}

/// Outcome of replaying the move journal.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MoveRecoveryReport {
    /// Copy had finished; the leftover source was deleted.
    pub finished: Vec<MoveRecord>,
    /// Copy was interrupted; the partial destination was deleted.
    pub rolled_back: Vec<MoveRecord>,
    /// Could not be resolved this time; left in the journal.
    pub failed: Vec<MoveRecord>,
}

impl MoveRecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.finished.is_empty() && self.rolled_back.is_empty() && self.failed.is_empty()
    }
}

/// A navigable, mutable view of one host-granted root directory.
///
/// Owns the root handle, the cached tree and stat map, the ignore filter
/// and the watchers. Mutations refresh the cached tree and stats before
/// returning; they never fire watcher callbacks.
pub struct FileSystemSession {
    inner: Arc<SessionInner>,
}

impl FileSystemSession {
    pub fn new(host: Arc<dyn Host>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                host,
                config,
                state: RwLock::new(SessionState::default()),
                op_lock: Mutex::new(()),
                watchers: WatcherRegistry::new(),
                store: OnceLock::new(),
            }),
        }
    }

    /// Open the state database named by `config.state_path`. Does nothing
    /// when no path is configured or the store is already open.
    pub fn open_state(&self) -> Result<()> {
        if self.inner.store.get().is_some() {
            return Ok(());
        }
        if let Some(path) = &self.inner.config.state_path {
            let store = StateStore::open(path)?;
            let _ = self.inner.store.set(store);
            debug!(path = %path.display(), "state store opened");
        }
        Ok(())
    }

    /// Use an already-open store instead of `config.state_path`.
    pub fn attach_state(&self, store: StateStore) {
        let _ = self.inner.store.set(store);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> Option<&StateStore> {
        self.inner.store.get()
    }

    // ── access ──────────────────────────────────────────────────────

    /// Ask the host for a root directory (may prompt), then build the
    /// initial tree, stats and ignore set. The grant is saved under
    /// `project_id` when a store is open.
    pub async fn request_access(&self) -> Result<()> {
        let root = self.inner.host.pick_directory(AccessMode::ReadWrite).await?;
        match ensure_permission(&root).await? {
            PermissionState::Granted => {}
            state => {
                return Err(HandleFsError::Permission {
                    mode: AccessMode::ReadWrite,
                    state,
                })
            }
        }
        self.inner.install_root(root.clone()).await?;

        if let (Some(store), Some(project), Some(reference)) = (
            self.inner.store.get(),
            self.inner.config.project_id.as_deref(),
            root.reference(),
        ) {
            store.registry().save(project, &reference, root.name()).await?;
        }
        info!(root = %root.name(), "access granted");
        Ok(())
    }

    /// Restore the root saved for `project_id` without the picker.
    ///
    /// Returns `false` (leaving the session without access) when nothing
    /// was saved, the location is gone, or permission is not granted.
    pub async fn restore_access(&self) -> Result<bool> {
        let (Some(store), Some(project)) = (self.inner.store.get(), self.inner.config.project_id.as_deref())
        else {
            return Ok(false);
        };
        let registry = store.registry();
        let Some(record) = registry.get(project).await? else {
            return Ok(false);
        };
        let Some(root) = self.inner.host.restore_directory(&record.reference).await? else {
            warn!(project, reference = %record.reference, "saved root no longer exists, forgetting it");
            registry.remove(project).await?;
            return Ok(false);
        };
        match ensure_permission(&root).await {
            Ok(PermissionState::Granted) => {}
            Ok(state) => {
                warn!(project, %state, "permission not granted for saved root");
                return Ok(false);
            }
            Err(e) => {
                warn!(project, "permission check failed for saved root: {e}");
                return Ok(false);
            }
        }
        self.inner.install_root(root).await?;
        info!(project, root = %record.root_name, "access restored");
        Ok(true)
    }

    /// Replay unfinished moves left in the journal for the current root.
    pub async fn recover_pending_moves(&self) -> Result<MoveRecoveryReport> {
        let _op = self.inner.op_lock.lock().await;
        let root = self.inner.root().await?;
        let mut report = MoveRecoveryReport::default();
        let (Some(store), Some(reference)) = (self.inner.store.get(), root.reference()) else {
            return Ok(report);
        };
        let journal = store.journal();
        for record in journal.pending(&reference).await? {
            match recover_one(&root, &record).await {
                Ok(true) => {
                    journal.complete(record.id).await?;
                    report.finished.push(record);
                }
                Ok(false) => {
                    journal.complete(record.id).await?;
                    report.rolled_back.push(record);
                }
                Err(e) => {
                    warn!(source = %record.source, dest = %record.dest, "move recovery failed: {e}");
                    report.failed.push(record);
                }
            }
        }
        if !report.is_empty() {
            info!(
                finished = report.finished.len(),
                rolled_back = report.rolled_back.len(),
                failed = report.failed.len(),
                "move journal replayed"
            );
            self.inner.refresh_locked(&root).await?;
        }
        Ok(report)
    }

    // ── reads ───────────────────────────────────────────────────────

    pub async fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let root = self.inner.root().await?;
        let rel = RelPath::parse(root.name(), path)?;
        mutation::read_file(&root, &rel).await
    }

    /// File content as text; invalid UTF-8 is replaced, not rejected.
    pub async fn read_file_content(&self, path: &str) -> Result<String> {
        let bytes = self.read_file_bytes(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn get_file_stats(&self, path: &str) -> Result<FileStat> {
        let root = self.inner.root().await?;
        let rel = RelPath::parse(root.name(), path)?;
        match resolve(&root, &rel).await? {
            Handle::File(file) => stats::file_stat(file.as_ref(), &self.inner.config.default_content_type).await,
            Handle::Directory(_) => Err(HandleFsError::NotAFile { path: rel.joined() }),
        }
    }

    pub async fn get_all_files_in_directory(&self, path: &str) -> Result<Vec<String>> {
        let root = self.inner.root().await?;
        let rel = RelPath::parse(root.name(), path)?;
        mutation::collect_files(&root, &rel, self.inner.config.max_depth).await
    }

    /// Case-insensitive substring match on entry names, ignore-filtered.
    /// The result is also kept as [`search_results`](Self::search_results).
    pub async fn search_files(&self, query: &str) -> Result<Vec<String>> {
        let root = self.inner.root().await?;
        let ignore = self.inner.state.read().await.ignore.clone();
        let hits = search::search(&root, query, self.inner.walk_options(&ignore)).await?;
        self.inner.state.write().await.search_results = hits.clone();
        Ok(hits)
    }

    // ── mutations ───────────────────────────────────────────────────

    pub async fn write_file_content(&self, path: &str, content: &str) -> Result<()> {
        self.mutate(path, |root, rel| async move {
            mutation::write_file(&root, &rel, content.as_bytes()).await
        })
        .await
    }

    pub async fn create_file(&self, path: &str, content: &str) -> Result<()> {
        self.create_file_bytes(path, content.as_bytes()).await
    }

    pub async fn create_file_bytes(&self, path: &str, content: &[u8]) -> Result<()> {
        self.mutate(path, |root, rel| async move { mutation::create_file(&root, &rel, content).await })
            .await
    }

    pub async fn create_directory(&self, path: &str) -> Result<()> {
        self.mutate(path, |root, rel| async move { mutation::create_directory(&root, &rel).await })
            .await
    }

    /// Remove a file or a directory with everything under it.
    pub async fn delete_entry(&self, path: &str) -> Result<()> {
        self.mutate(path, |root, rel| async move {
            if rel.is_root() {
                return Err(HandleFsError::InvalidPath { path: String::new() });
            }
            mutation::delete_entry(&root, &rel).await
        })
        .await
    }

    pub async fn copy_entry(&self, source: &str, dest: &str) -> Result<()> {
        let _op = self.inner.op_lock.lock().await;
        let root = self.inner.root().await?;
        let from = RelPath::parse(root.name(), source)?;
        let to = RelPath::parse(root.name(), dest)?;
        mutation::copy_entry(&root, &from, &to, self.inner.config.max_depth).await?;
        self.inner.refresh_locked(&root).await
    }

    /// Copy then delete. With a state store open, both halves are logged
    /// so [`recover_pending_moves`](Self::recover_pending_moves) can finish
    /// or undo a move interrupted by a crash.
    pub async fn move_entry(&self, old_path: &str, new_path: &str) -> Result<()> {
        let _op = self.inner.op_lock.lock().await;
        let root = self.inner.root().await?;
        let from = RelPath::parse(root.name(), old_path)?;
        let to = RelPath::parse(root.name(), new_path)?;
        if to.starts_with(&from) {
            return Err(HandleFsError::InvalidPath { path: to.joined() });
        }

        let journal = match (self.inner.store.get(), root.reference()) {
            (Some(store), Some(reference)) => {
                let journal = store.journal();
                let id = journal.begin(&reference, &from.joined(), &to.joined()).await?;
                Some((journal, id))
            }
            _ => None,
        };

        if let Err(e) = mutation::copy_entry(&root, &from, &to, self.inner.config.max_depth).await {
            // Not a crash: the caller sees the error and the partial copy stays.
            if let Some((journal, id)) = &journal {
                journal.complete(*id).await?;
            }
            return Err(e);
        }
        if let Some((journal, id)) = &journal {
            journal.mark_copied(*id).await?;
        }
        // A failed delete keeps the `copied` row so recovery can finish it.
        mutation::delete_entry(&root, &from).await?;
        if let Some((journal, id)) = &journal {
            journal.complete(*id).await?;
        }
        debug!(from = %from.joined(), to = %to.joined(), "entry moved");
        self.inner.refresh_locked(&root).await
    }

    pub async fn rename_entry(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.move_entry(old_path, new_path).await
    }

    async fn mutate<'p, F, Fut>(&self, path: &'p str, op: F) -> Result<()>
    where
        F: FnOnce(DirHandle, RelPath<'p>) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let _op = self.inner.op_lock.lock().await;
        let root = self.inner.root().await?;
        let rel = RelPath::parse(root.name(), path)?;
        op(root.clone(), rel).await?;
        self.inner.refresh_locked(&root).await
    }

    // ── refresh & watch ─────────────────────────────────────────────

    /// Rebuild the cached tree from the host, together with the stat map
    /// so every leaf keeps its stat.
    pub async fn refresh_file_tree(&self) -> Result<()> {
        let _op = self.inner.op_lock.lock().await;
        let root = self.inner.root().await?;
        self.inner.refresh_locked(&root).await
    }

    /// Rebuild the cached stat map from the host. Stale paths are dropped.
    /// The tree is rebuilt in the same pass, so both stay in step.
    pub async fn update_stats(&self) -> Result<()> {
        let _op = self.inner.op_lock.lock().await;
        let root = self.inner.root().await?;
        self.inner.refresh_locked(&root).await
    }

    /// Start polling for out-of-band changes. `on_change` receives the
    /// root's name. Must be called from within a tokio runtime.
    pub fn watch_file_changes<F>(&self, on_change: F) -> WatchHandle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let callback: ChangeCallback = Arc::new(on_change);
        let source: Arc<dyn ChangeSource> = self.inner.clone();
        let weak: Weak<dyn ChangeSource> = Arc::downgrade(&source);
        self.inner.watchers.subscribe(
            callback,
            self.inner.config.exclusive_watcher,
            weak,
            self.inner.config.poll_interval(),
        )
    }

    /// Run one watcher tick now. Subscribers are notified on change.
    pub async fn poll_now(&self) -> Result<bool> {
        match self.inner.poll_changed().await? {
            Some(root) => {
                self.inner.watchers.notify(&root);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.inner.watchers
    }

    /// Stop all watchers and drop the root and cached state.
    pub async fn close(&self) {
        self.inner.watchers.cancel_all();
        let _op = self.inner.op_lock.lock().await;
        *self.inner.state.write().await = SessionState::default();
        info!("session closed");
    }

    // ── snapshots ───────────────────────────────────────────────────

    pub async fn has_access(&self) -> bool {
        self.inner.state.read().await.root.is_some()
    }

    pub async fn root_name(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .root
            .as_ref()
            .map(|r| r.name().to_string())
    }

    pub async fn file_tree(&self) -> TreeNode {
        self.inner.state.read().await.tree.clone()
    }

    pub async fn file_stats(&self) -> StatsMap {
        self.inner.state.read().await.stats.clone()
    }

    pub async fn ignore_patterns(&self) -> Vec<String> {
        self.inner.state.read().await.ignore.patterns().to_vec()
    }

    pub async fn search_results(&self) -> Vec<String> {
        self.inner.state.read().await.search_results.clone()
    }
}

impl Drop for FileSystemSession {
    fn drop(&mut self) {
        self.inner.watchers.cancel_all();
    }
}

impl SessionInner {
    async fn root(&self) -> Result<DirHandle> {
        self.state.read().await.root.clone().ok_or(HandleFsError::NoAccess)
    }

    fn walk_options<'a>(&'a self, ignore: &'a IgnoreFilter) -> WalkOptions<'a> {
        WalkOptions {
            ignore,
            max_depth: self.config.max_depth,
            default_content_type: &self.config.default_content_type,
        }
    }

    fn fingerprint_of(&self, state: &SessionState) -> Result<u64> {
        match self.config.change_detection {
            ChangeDetection::Structure => fingerprint(&state.tree, None),
            ChangeDetection::Content => fingerprint(&state.tree, Some(&state.stats)),
        }
    }

    /// Make `root` current: load its ignore file, build tree and stats.
    async fn install_root(&self, root: DirHandle) -> Result<()> {
        let _op = self.op_lock.lock().await;
        let ignore = IgnoreFilter::load(&root, &self.config.ignore_file, self.config.ignore_mode).await?;
        let opts = self.walk_options(&ignore);
        let tree = tree::build_tree(&root, "", opts, 0).await?;
        let stats = stats::collect_stats(&root, "", opts).await?;

        let mut state = self.state.write().await;
        *state = SessionState {
            root: Some(root),
            tree,
            stats,
            ignore,
            fingerprint: None,
            search_results: Vec::new(),
        };
        state.fingerprint = Some(self.fingerprint_of(&state)?);
        Ok(())
    }

    /// Rebuild tree and stats. Caller holds `op_lock`.
    async fn refresh_locked(&self, root: &DirHandle) -> Result<()> {
        let ignore = self.state.read().await.ignore.clone();
        let opts = self.walk_options(&ignore);
        let tree = tree::build_tree(root, "", opts, 0).await?;
        let stats = stats::collect_stats(root, "", opts).await?;

        let mut state = self.state.write().await;
        state.tree = tree;
        state.stats = stats;
        state.fingerprint = Some(self.fingerprint_of(&state)?);
        debug!(files = state.stats.len(), "tree and stats refreshed");
        Ok(())
    }
}

#[async_trait]
impl ChangeSource for SessionInner {
    async fn poll_changed(&self) -> Result<Option<String>> {
        let _op = self.op_lock.lock().await;
        let (root, ignore, previous) = {
            let state = self.state.read().await;
            match &state.root {
                Some(root) => (root.clone(), state.ignore.clone(), state.fingerprint),
                None => return Ok(None),
            }
        };
        let opts = self.walk_options(&ignore);
        let tree = tree::build_tree(&root, "", opts, 0).await?;
        let stats = match self.config.change_detection {
            ChangeDetection::Content => Some(stats::collect_stats(&root, "", opts).await?),
            ChangeDetection::Structure => None,
        };
        let current = fingerprint(&tree, stats.as_ref())?;
        if previous == Some(current) {
            return Ok(None);
        }

        let stats = match stats {
            Some(stats) => stats,
            None => stats::collect_stats(&root, "", opts).await?,
        };
        let mut state = self.state.write().await;
        state.tree = tree;
        state.stats = stats;
        state.fingerprint = Some(current);
        Ok(Some(root.name().to_string()))
    }
}

/// Query, then request if needed. Returns the final state.
async fn ensure_permission(root: &DirHandle) -> Result<PermissionState> {
    match root.query_permission(AccessMode::ReadWrite).await? {
        PermissionState::Granted => Ok(PermissionState::Granted),
        _ => root.request_permission(AccessMode::ReadWrite).await,
    }
}

/// Resolve one journal entry. `Ok(true)` means the move was completed,
/// `Ok(false)` that it was undone.
async fn recover_one(root: &DirHandle, record: &MoveRecord) -> Result<bool> {
    let source = RelPath::parse(root.name(), &record.source)?;
    let dest = RelPath::parse(root.name(), &record.dest)?;
    let source_exists = match resolve(root, &source).await {
        Ok(_) => true,
        Err(e) if e.is_not_found() => false,
        Err(e) => return Err(e),
    };
    match record.phase {
        MovePhase::Copied => {
            if source_exists {
                mutation::delete_entry(root, &source).await?;
            }
            Ok(true)
        }
        // Without the source the destination is the only copy; keep it.
        MovePhase::Copying if !source_exists => Ok(true),
        MovePhase::Copying => {
            match mutation::delete_entry(root, &dest).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            Ok(false)
        }
    }
}
