//! The sync engine: full refresh plus live incremental updates.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::classify::Classifier;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::{EventBus, SyncEvent};
use crate::reconciler;
use crate::status::StatusTracker;
use crate::store::TrackStore;
use crate::watcher::DirWatcher;

/// Keeps one SQLite table consistent with one directory tree.
///
/// Lifecycle: construct, [`subscribe`](Self::subscribe) for notifications,
/// [`refresh`](Self::refresh) to bulk-reconcile and attach the watcher, then
/// incremental updates flow until [`close`](Self::close). `refresh` can be
/// called again at any time; it tears down the previous watcher first, so at
/// most one reconciliation pass is ever in flight per instance.
pub struct TrackSync {
    root: PathBuf,
    config: SyncConfig,
    store: TrackStore,
    bus: Arc<EventBus>,
    status: Arc<StatusTracker>,
    watcher: Option<DirWatcher>,
    live_task: Option<JoinHandle<()>>,
}

impl TrackSync {
    /// Open (or create) the database file at `db_path` and build an engine
    /// for `root`.
    pub fn open(
        db_path: impl AsRef<Path>,
        root: impl Into<PathBuf>,
        config: SyncConfig,
    ) -> Result<Self> {
        let store = TrackStore::open(db_path.as_ref(), &config.table_name)?;
        Ok(Self::with_store(store, root.into(), config))
    }

    /// Build an engine over an existing connection. The connection becomes
    /// exclusively owned by this instance.
    pub fn new(
        conn: rusqlite::Connection,
        root: impl Into<PathBuf>,
        config: SyncConfig,
    ) -> Result<Self> {
        let store = TrackStore::from_connection(conn, &config.table_name)?;
        Ok(Self::with_store(store, root.into(), config))
    }

    fn with_store(store: TrackStore, root: PathBuf, config: SyncConfig) -> Self {
        let bus = Arc::new(EventBus::default());
        let status = Arc::new(StatusTracker::new(Arc::clone(&bus)));
        Self {
            root,
            config,
            store,
            bus,
            status,
            watcher: None,
            live_task: None,
        }
    }

    pub fn subscribe(&self) -> UnboundedReceiver<SyncEvent> {
        self.bus.subscribe()
    }

    /// True once the first successful refresh completed and the watcher is
    /// attached; false again after `close`.
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    /// True when no reconciliation work is in flight.
    pub fn is_synced(&self) -> bool {
        self.status.is_synced()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Read access to the underlying table.
    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    /// Run a full reconciliation pass, then attach the live watcher.
    ///
    /// On success the engine is watching: `is_ready` is set and a
    /// `Synced(true)` then `Ready` notification fire. On failure an `Error`
    /// notification fires, no watcher is attached, and `refresh` may simply
    /// be called again.
    pub async fn refresh(&mut self) -> Result<()> {
        self.drain_live().await;
        self.status.set_synced(false);

        let store = self.store.clone();
        let root = self.root.clone();
        let classifier = Classifier::from_config(&self.config);
        let bus = Arc::clone(&self.bus);
        let pass = match tokio::task::spawn_blocking(move || {
            reconciler::full_pass(&store, &root, &classifier, &bus)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = SyncError::State(format!("Reconciliation task failed: {e}"));
                tracing::error!("[Sync] {}", err);
                self.bus.emit(SyncEvent::Error(err.to_string()));
                return Err(err);
            }
        };

        if let Err(e) = pass {
            tracing::error!("[Sync] Refresh failed: {}", e);
            self.bus.emit(SyncEvent::Error(e.to_string()));
            return Err(e);
        }

        if let Err(e) = self.attach_watcher() {
            tracing::error!("[Sync] Could not attach watcher: {}", e);
            self.bus.emit(SyncEvent::Error(e.to_string()));
            return Err(e);
        }

        self.status.set_ready(true);
        self.status.set_synced(true);
        self.bus.emit(SyncEvent::Ready);
        tracing::info!("[Sync] Watching {}", self.root.display());
        Ok(())
    }

    fn attach_watcher(&mut self) -> Result<()> {
        let (tx, rx) = unbounded_channel();
        let watcher = DirWatcher::spawn(
            &self.root,
            Duration::from_millis(self.config.delay_ms),
            tx,
        )?;
        self.watcher = Some(watcher);

        let store = self.store.clone();
        let classifier = Classifier::from_config(&self.config);
        let bus = Arc::clone(&self.bus);
        let status = Arc::clone(&self.status);
        self.live_task = Some(tokio::spawn(live_loop(rx, store, classifier, bus, status)));
        Ok(())
    }

    /// Detach the watcher and wait for the live loop to finish whatever
    /// change it is currently applying.
    ///
    /// Dropping the watcher closes the loop's channel, so the loop exits on
    /// its own once the in-flight change (including its blocking section) is
    /// done. Waiting here keeps reconciliation passes strictly sequential: a
    /// full pass never reads the table while an older incremental write is
    /// still on its way to a commit.
    async fn drain_live(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(task) = self.live_task.take() {
            let _ = task.await;
        }
    }

    /// Detach the watcher and discard in-flight work. Safe to call from any
    /// state, repeatedly. Both status flags drop back to false.
    pub fn close(&mut self) {
        self.teardown();
        self.status.reset();
        tracing::info!("[Sync] Closed");
    }

    fn teardown(&mut self) {
        if let Some(task) = self.live_task.take() {
            // A blocking section already running finishes on its own thread,
            // committing or rolling back its transaction either way.
            task.abort();
        }
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
    }
}

impl Drop for TrackSync {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Consume coalesced change notifications until the watcher goes away.
///
/// Each event toggles the synced flag off for the duration of its handling.
/// "Path no longer exists" failures are the benign notification/deletion race
/// and are swallowed; anything else is surfaced as an `Error` notification
/// while the loop keeps watching.
async fn live_loop(
    mut rx: UnboundedReceiver<crate::watcher::FsChange>,
    store: TrackStore,
    classifier: Classifier,
    bus: Arc<EventBus>,
    status: Arc<StatusTracker>,
) {
    while let Some(change) = rx.recv().await {
        status.set_synced(false);

        let store = store.clone();
        let classifier = classifier.clone();
        let bus_task = Arc::clone(&bus);
        let change_task = change.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            reconciler::apply_change(&store, &classifier, &bus_task, &change_task)
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_not_found() => {
                tracing::debug!(
                    "[Sync] {} vanished during processing, ignoring",
                    change.path.display()
                );
            }
            Ok(Err(e)) => {
                tracing::warn!("[Sync] Change handling failed: {}", e);
                bus.emit(SyncEvent::Error(e.to_string()));
            }
            Err(e) => {
                tracing::warn!("[Sync] Change task failed: {}", e);
                bus.emit(SyncEvent::Error(e.to_string()));
            }
        }

        status.set_synced(true);
    }
}
