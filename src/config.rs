//! Sync engine configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::classify::default_extensions;

/// Options recognized by [`TrackSync`](crate::TrackSync).
///
/// All fields have conservative defaults; `SyncConfig::default()` is suitable
/// for a typical music library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Name of the table rows are read from and written to.
    pub table_name: String,

    /// Debounce window applied by the filesystem watcher, in milliseconds.
    ///
    /// Bursts of events within this window (a multi-file copy, an unpacking
    /// archive) collapse into one notification per settled path or subtree.
    pub delay_ms: u64,

    /// When true, only files whose extension is in `extensions` are indexed.
    /// When false, every file under the root is considered relevant.
    pub ignore_ext: bool,

    /// Extension allow-list consulted when `ignore_ext` is true.
    /// Compared case-insensitively, without the leading dot.
    pub extensions: HashSet<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            table_name: "tracks".to_string(),
            delay_ms: 1000,
            ignore_ext: true,
            extensions: default_extensions(),
        }
    }
}
