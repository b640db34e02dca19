//! Relevance classifier: is this path worth indexing?

use std::collections::HashSet;
use std::path::Path;

use crate::config::SyncConfig;

/// Extensions accepted by default. Matches the container formats the tag
/// extractor understands.
pub fn default_extensions() -> HashSet<String> {
    [
        "aac", "aiff", "ape", "flac", "m4a", "mp3", "mp4", "ogg", "opus", "wav", "wma", "wv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Pure predicate deciding whether a file participates in reconciliation.
///
/// Directories never reach the classifier; the snapshot builder and the live
/// controller only hand it plain files.
#[derive(Debug, Clone)]
pub struct Classifier {
    filter_by_extension: bool,
    extensions: HashSet<String>,
}

impl Classifier {
    pub fn new(extensions: HashSet<String>, filter_by_extension: bool) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            filter_by_extension,
            extensions,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.extensions.clone(), config.ignore_ext)
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if !self.filter_by_extension {
            return true;
        }
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(default_extensions(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_extensions_case_insensitive() {
        let c = Classifier::default();
        assert!(c.is_relevant(Path::new("/tmp/a.mp3")));
        assert!(c.is_relevant(Path::new("/tmp/a.MP3")));
        assert!(c.is_relevant(Path::new("/tmp/a.flac")));
        assert!(c.is_relevant(Path::new("/tmp/a.ogg")));
        assert!(!c.is_relevant(Path::new("/tmp/a.txt")));
        assert!(!c.is_relevant(Path::new("/tmp/a")));
    }

    #[test]
    fn disabled_filter_accepts_everything() {
        let c = Classifier::new(default_extensions(), false);
        assert!(c.is_relevant(Path::new("/tmp/a.txt")));
        assert!(c.is_relevant(Path::new("/tmp/no_extension")));
    }

    #[test]
    fn custom_set_normalizes_dots_and_case() {
        let exts: HashSet<String> = [".OGG".to_string(), " mp3 ".to_string()].into();
        let c = Classifier::new(exts, true);
        assert!(c.is_relevant(Path::new("/tmp/a.ogg")));
        assert!(c.is_relevant(Path::new("/tmp/a.mp3")));
        assert!(!c.is_relevant(Path::new("/tmp/a.flac")));
    }
}
