//! The reconciliation passes: making the table equal to the tree.

use std::path::Path;

use crate::classify::Classifier;
use crate::error::Result;
use crate::events::{EventBus, SyncEvent};
use crate::metadata;
use crate::snapshot;
use crate::store::{TrackStore, MAX_BATCH};
use crate::track::Track;
use crate::watcher::{FsChange, FsChangeKind};

/// Outcome of a full pass, for logging and assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub added: usize,
    pub removed: usize,
}

/// Run one full reconciliation pass of `root` against the store.
///
/// Stored rows absent from the snapshot are deleted; snapshot entries whose
/// mtime matches the stored row are skipped; everything else is re-extracted
/// and upserted. Deletes run first, then upserts, each batched at
/// [`MAX_BATCH`] rows per transaction, with one `Removed` per deleted path
/// and one `Added` per written row in operation order.
///
/// Equality of mtime is the sole "unchanged" criterion. Content changes that
/// leave mtime alone are not detected, and an mtime bump with identical bytes
/// still re-extracts.
pub fn full_pass(
    store: &TrackStore,
    root: &Path,
    classifier: &Classifier,
    bus: &EventBus,
) -> Result<PassStats> {
    let mut snapshot = snapshot::build(root, classifier)?;

    let mut stale = Vec::new();
    for (path, mtime) in store.all_mtimes()? {
        match snapshot.get(&path) {
            None => stale.push(path),
            Some(&fs_mtime) if fs_mtime == mtime => {
                // Up to date; no write needed.
                snapshot.remove(&path);
            }
            Some(_) => {}
        }
    }

    let mut stats = PassStats {
        removed: stale.len(),
        ..PassStats::default()
    };

    for batch in stale.chunks(MAX_BATCH) {
        store.delete_paths(batch)?;
        for path in batch {
            bus.emit(SyncEvent::Removed(path.clone()));
        }
    }

    // BTreeMap iteration keeps writes in path order.
    let pending: Vec<(String, i64)> = snapshot.into_iter().collect();
    stats.added = pending.len();
    for batch in pending.chunks(MAX_BATCH) {
        let tracks: Vec<Track> = batch
            .iter()
            .map(|(path, mtime)| Track {
                path: path.clone(),
                mtime: *mtime,
                meta: metadata::extract(Path::new(path)),
            })
            .collect();
        store.upsert_batch(&tracks)?;
        for track in tracks {
            bus.emit(SyncEvent::Added(track));
        }
    }

    tracing::info!(
        "[Reconciler] Full pass of {}: {} added, {} removed",
        root.display(),
        stats.added,
        stats.removed
    );
    Ok(stats)
}

/// Apply one coalesced change notification.
///
/// Updates for a directory re-walk the subtree (one coalesced event can stand
/// for many file changes); updates for a file upsert a single row. Removals
/// attempt both the single-row delete and the directory-prefix delete, since
/// the vanished entity's type can no longer be determined; at most one of
/// them deletes anything, and one `Removed` fires when either did.
pub fn apply_change(
    store: &TrackStore,
    classifier: &Classifier,
    bus: &EventBus,
    change: &FsChange,
) -> Result<()> {
    match change.kind {
        FsChangeKind::Update => {
            if change.path.is_dir() {
                upsert_subtree(store, &change.path, classifier, bus)
            } else if change.path.is_file() {
                upsert_file(store, &change.path, classifier, bus)
            } else {
                // Gone between notification and processing; the remove
                // notification is on its way or was folded into a parent's.
                tracing::debug!(
                    "[Reconciler] Update for vanished path {}",
                    change.path.display()
                );
                Ok(())
            }
        }
        FsChangeKind::Remove => {
            let path = change.path.to_string_lossy().into_owned();
            let removed_row = store.delete_path(&path)?;
            let removed_subtree = store.delete_prefix(&path)?;
            if removed_row || removed_subtree > 0 {
                bus.emit(SyncEvent::Removed(path));
            }
            Ok(())
        }
    }
}

fn upsert_file(
    store: &TrackStore,
    path: &Path,
    classifier: &Classifier,
    bus: &EventBus,
) -> Result<()> {
    if !classifier.is_relevant(path) {
        return Ok(());
    }
    let mtime = snapshot::file_mtime_millis(path)?;
    let track = Track {
        path: path.to_string_lossy().into_owned(),
        mtime,
        meta: metadata::extract(path),
    };
    store.upsert_batch(std::slice::from_ref(&track))?;
    bus.emit(SyncEvent::Added(track));
    Ok(())
}

fn upsert_subtree(
    store: &TrackStore,
    dir: &Path,
    classifier: &Classifier,
    bus: &EventBus,
) -> Result<()> {
    let snapshot = snapshot::build(dir, classifier)?;
    let entries: Vec<(String, i64)> = snapshot.into_iter().collect();
    for batch in entries.chunks(MAX_BATCH) {
        let tracks: Vec<Track> = batch
            .iter()
            .map(|(path, mtime)| Track {
                path: path.clone(),
                mtime: *mtime,
                meta: metadata::extract(Path::new(path)),
            })
            .collect();
        store.upsert_batch(&tracks)?;
        for track in tracks {
            bus.emit(SyncEvent::Added(track));
        }
    }
    Ok(())
}
