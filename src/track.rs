//! Row types for the tracks table.

use serde::{Deserialize, Serialize};

/// Descriptive fields pulled out of an audio container's tags.
///
/// Every field is optional: extraction is all-or-nothing per file and a
/// malformed file simply yields `TrackMeta::default()`. Rows written for such
/// files carry only `path` and `mtime`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    /// Whole seconds, floored.
    pub duration: Option<i64>,
    pub track_no: Option<u32>,
    pub disk: Option<u32>,
    /// Genre labels; persisted as a JSON-encoded list, NULL when empty.
    pub tags: Vec<String>,
    pub is_vbr: Option<bool>,
    /// Kilobits per second, floored.
    pub bitrate: Option<u32>,
    pub codec: Option<String>,
    pub container: Option<String>,
}

/// One row of the tracks table: the durable projection of a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Absolute filesystem path; the unique key of the row.
    pub path: String,
    /// Last-modified timestamp observed when the row was written, in
    /// milliseconds since the epoch, floored.
    pub mtime: i64,
    #[serde(flatten)]
    pub meta: TrackMeta,
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.meta.artist, &self.meta.title) {
            (Some(artist), Some(title)) => write!(f, "{} - {} ({})", artist, title, self.path),
            (None, Some(title)) => write!(f, "{} ({})", title, self.path),
            _ => write!(f, "{}", self.path),
        }
    }
}
