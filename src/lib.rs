//! tracksync: keep a SQLite table of audio-file metadata consistent with a
//! watched directory tree.
//!
//! One [`TrackSync`] instance owns one database connection and one root
//! directory. [`TrackSync::refresh`] bulk-reconciles the table against the
//! tree (stale rows deleted, changed and new files re-extracted and
//! upserted), then a debounced recursive watch keeps applying the same
//! primitives per coalesced filesystem change until
//! [`TrackSync::close`]. Observers follow along through
//! [`TrackSync::subscribe`].

pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod metadata;
pub mod reconciler;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod sync;
pub mod track;
pub mod watcher;

pub use classify::Classifier;
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use events::{EventBus, SyncEvent};
pub use reconciler::PassStats;
pub use store::TrackStore;
pub use sync::TrackSync;
pub use track::{Track, TrackMeta};
pub use watcher::{DirWatcher, FsChange, FsChangeKind};
