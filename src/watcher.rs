//! Debounced filesystem watcher.
//!
//! Wraps a `notify` recursive watch with the coalescing loop: raw events are
//! collected per path, and once the tree has been quiet for the debounce
//! window each settled path is delivered exactly once. Paths covered by a
//! pending directory removal are folded into that removal, so a deleted
//! subtree arrives as a single event for the directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One coalesced change, delivered after the quiet period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsChange {
    pub kind: FsChangeKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsChangeKind {
    /// The path exists and was created or modified. For a directory this can
    /// stand for many underlying file changes.
    Update,
    /// The path no longer exists. Whether it was a file or a directory cannot
    /// be determined anymore.
    Remove,
}

pub struct DirWatcher {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DirWatcher {
    /// Attach a recursive watch on `root` and start the coalescing loop.
    ///
    /// Returns once the watch is actively monitoring; an unreachable root
    /// fails here rather than in the background.
    pub fn spawn(
        root: &Path,
        debounce: Duration,
        tx: UnboundedSender<FsChange>,
    ) -> Result<Self> {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel();
        let mut watcher = RecommendedWatcher::new(raw_tx, notify::Config::default())?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::info!("[Watcher] Watching {} recursively", root.display());

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = thread::spawn(move || {
            // The watcher handle moves in here so the watch lives exactly as
            // long as the loop.
            Self::coalesce_loop(watcher, raw_rx, tx, debounce, flag);
        });

        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    fn coalesce_loop(
        _watcher: RecommendedWatcher,
        raw_rx: std::sync::mpsc::Receiver<notify::Result<Event>>,
        tx: UnboundedSender<FsChange>,
        debounce: Duration,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut pending: HashMap<PathBuf, FsChangeKind> = HashMap::new();
        let mut last_activity = Instant::now();

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            match raw_rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(event)) => {
                    let kind = match event.kind {
                        EventKind::Create(_) | EventKind::Modify(_) => Some(FsChangeKind::Update),
                        EventKind::Remove(_) => Some(FsChangeKind::Remove),
                        _ => None,
                    };
                    if let Some(kind) = kind {
                        for path in event.paths {
                            // Last event per path wins within the window.
                            pending.insert(path, kind);
                        }
                        last_activity = Instant::now();
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!("[Watcher] Backend error: {}", e);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !pending.is_empty() && last_activity.elapsed() >= debounce {
                        if Self::flush(&mut pending, &tx).is_err() {
                            // Receiver gone, nothing left to deliver to.
                            return;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = Self::flush(&mut pending, &tx);
                    return;
                }
            }
        }
    }

    /// Deliver the settled window, folding children of removed directories
    /// into the ancestor's single Remove.
    fn flush(
        pending: &mut HashMap<PathBuf, FsChangeKind>,
        tx: &UnboundedSender<FsChange>,
    ) -> std::result::Result<(), ()> {
        let mut entries: Vec<(PathBuf, FsChangeKind)> = pending.drain().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let removed: Vec<PathBuf> = entries
            .iter()
            .filter(|(_, kind)| *kind == FsChangeKind::Remove)
            .map(|(path, _)| path.clone())
            .collect();

        for (path, kind) in entries {
            if removed
                .iter()
                .any(|dir| path != *dir && path.starts_with(dir))
            {
                continue;
            }
            // A path reported as updated can be gone again by flush time;
            // reclassify so downstream never stats a ghost.
            let kind = match kind {
                FsChangeKind::Remove => FsChangeKind::Remove,
                FsChangeKind::Update if path.exists() => FsChangeKind::Update,
                FsChangeKind::Update => FsChangeKind::Remove,
            };
            tracing::debug!("[Watcher] {:?} {}", kind, path.display());
            tx.send(FsChange { kind, path }).map_err(|_| ())?;
        }
        Ok(())
    }

    /// Stop the watch and join the loop. Idempotent.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flush_of(entries: Vec<(&str, FsChangeKind)>) -> Vec<FsChange> {
        let mut pending: HashMap<PathBuf, FsChangeKind> = entries
            .into_iter()
            .map(|(p, k)| (PathBuf::from(p), k))
            .collect();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        DirWatcher::flush(&mut pending, &tx).unwrap();
        drop(tx);
        let mut out = Vec::new();
        while let Ok(change) = rx.try_recv() {
            out.push(change);
        }
        out
    }

    #[test]
    fn children_fold_into_ancestor_removal() {
        let out = flush_of(vec![
            ("/music/sub", FsChangeKind::Remove),
            ("/music/sub/a.mp3", FsChangeKind::Remove),
            ("/music/sub/deep/b.mp3", FsChangeKind::Remove),
        ]);
        assert_eq!(
            out,
            vec![FsChange {
                kind: FsChangeKind::Remove,
                path: PathBuf::from("/music/sub"),
            }]
        );
    }

    #[test]
    fn updates_for_vanished_paths_become_removes() {
        let out = flush_of(vec![("/definitely/not/here.mp3", FsChangeKind::Update)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, FsChangeKind::Remove);
    }

    #[test]
    fn unrelated_paths_flush_independently() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.mp3");
        std::fs::write(&kept, b"x").unwrap();

        let out = flush_of(vec![
            (kept.to_str().unwrap(), FsChangeKind::Update),
            ("/music/gone", FsChangeKind::Remove),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .any(|c| c.kind == FsChangeKind::Update && c.path == kept));
    }
}
