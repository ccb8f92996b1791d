//! ChangeWatcher: poll-based change detection with an explicit subscriber
//! registry.
//!
//! A session owns one [`WatcherRegistry`]. The first subscriber spawns a
//! single polling task; every subscriber is notified from that task, so
//! there is only ever one comparison state per session. The task stops
//! when the last subscriber cancels or the registry is shut down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::Result;
use crate::filesystem::{StatsMap, TreeNode};

/// Called with the root's name whenever something under it changed.
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Something that can be asked, once per tick, whether it changed.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Rescan and return the root name if the snapshot differs from the
    /// previous one. The new snapshot becomes the comparison baseline.
    async fn poll_changed(&self) -> Result<Option<String>>;
}

/// Fingerprint of a snapshot: the canonical tree, plus every leaf's size
/// and modification time when `stats` is given.
pub fn fingerprint(tree: &TreeNode, stats: Option<&StatsMap>) -> Result<u64> {
    let mut buf = tree.canonical()?;
    if let Some(stats) = stats {
        for (path, stat) in stats {
            buf.push('\n');
            buf.push_str(path);
            buf.push('\t');
            buf.push_str(&stat.size.to_string());
            buf.push('\t');
            buf.push_str(&stat.last_modified.to_string());
        }
    }
    Ok(xxh3_64(buf.as_bytes()))
}

/// Identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(Uuid);

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
struct RegistryInner {
    subscribers: HashMap<WatchId, ChangeCallback>,
    poller: Option<CancellationToken>,
}

/// Subscribers of one session, plus the polling task serving them.
#[derive(Clone, Default)]
pub struct WatcherRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

fn lock(inner: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    inner.lock().unwrap_or_else(|p| p.into_inner())
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`, starting the polling task if it is not running.
    ///
    /// With `exclusive`, every existing subscriber is dropped first. Must be
    /// called from within a tokio runtime.
    pub fn subscribe(
        &self,
        callback: ChangeCallback,
        exclusive: bool,
        source: Weak<dyn ChangeSource>,
        interval: Duration,
    ) -> WatchHandle {
        let id = WatchId(Uuid::new_v4());
        let mut inner = lock(&self.inner);
        if exclusive && !inner.subscribers.is_empty() {
            debug!(replaced = inner.subscribers.len(), "replacing existing watchers");
            inner.subscribers.clear();
        }
        inner.subscribers.insert(id, callback);
        if inner.poller.is_none() {
            let token = CancellationToken::new();
            spawn_poll_task(self.clone(), source, interval, token.clone());
            inner.poller = Some(token);
            info!(interval_ms = interval.as_millis() as u64, "watcher started");
        }
        WatchHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Call every current subscriber with `root`.
    pub fn notify(&self, root: &str) {
        // Snapshot first so a callback may cancel or subscribe.
        let callbacks: Vec<ChangeCallback> = lock(&self.inner).subscribers.values().cloned().collect();
        for cb in callbacks {
            cb(root);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.inner).poller.is_some()
    }

    /// Drop all subscribers and stop the polling task.
    pub fn cancel_all(&self) {
        cancel_all(&self.inner);
    }
}

fn cancel_all(inner: &Mutex<RegistryInner>) {
    let mut inner = lock(inner);
    inner.subscribers.clear();
    if let Some(token) = inner.poller.take() {
        token.cancel();
    }
}

fn remove(inner: &Mutex<RegistryInner>, id: WatchId) {
    let mut inner = lock(inner);
    if inner.subscribers.remove(&id).is_none() {
        return;
    }
    if inner.subscribers.is_empty() {
        if let Some(token) = inner.poller.take() {
            token.cancel();
        }
    }
}

/// Cancels one subscription. Dropping the handle does not cancel it.
#[derive(Debug, Clone)]
pub struct WatchHandle {
    id: WatchId,
    registry: Weak<Mutex<RegistryInner>>,
}

impl WatchHandle {
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Stop receiving notifications. Calling it again does nothing.
    pub fn cancel(&self) {
        if let Some(inner) = self.registry.upgrade() {
            remove(&inner, self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|inner| lock(&inner).subscribers.contains_key(&self.id))
            .unwrap_or(false)
    }
}

fn spawn_poll_task(
    registry: WatcherRegistry,
    source: Weak<dyn ChangeSource>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = shutdown.cancelled() => {
                    info!("watcher stopped");
                    return;
                }
            }

            let Some(source) = source.upgrade() else {
                debug!("session gone, watcher exiting");
                return;
            };
            match source.poll_changed().await {
                Ok(Some(root)) => {
                    if shutdown.is_cancelled() {
                        return;
                    }
                    debug!(root = %root, "change detected");
                    registry.notify(&root);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("watcher tick failed: {e}");
                }
            }
        }
    })
}
