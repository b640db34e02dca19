//! Snapshot builder: one recursive walk, one path -> mtime mapping.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::classify::Classifier;
use crate::error::{Result, SyncError};

/// Walk `root` and record every relevant file's mtime in milliseconds.
///
/// The map is keyed by absolute path and sorted, so downstream writes happen
/// in path order. Directories and symlinks are never included. A root that
/// cannot be opened aborts the build; a single unreadable entry mid-walk is
/// skipped.
pub fn build(root: &Path, classifier: &Classifier) -> Result<BTreeMap<String, i64>> {
    let root_meta = std::fs::metadata(root)?;
    if !root_meta.is_dir() {
        return Err(SyncError::InvalidPath(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut snapshot = BTreeMap::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("[Snapshot] Skipping unreadable entry: {}", e);
                skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !classifier.is_relevant(entry.path()) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            skipped += 1;
            continue;
        };
        let path = entry.path().to_string_lossy().into_owned();
        snapshot.insert(path, mtime_millis(&meta));
    }

    tracing::debug!(
        "[Snapshot] {} relevant files under {} ({} entries skipped)",
        snapshot.len(),
        root.display(),
        skipped
    );
    Ok(snapshot)
}

/// Floor-truncated milliseconds since the epoch, 0 for unrepresentable times.
pub fn mtime_millis(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Stat a single path and return its mtime in milliseconds.
///
/// Unlike [`build`], the NotFound case here is left for the caller: the live
/// controller treats it as the benign notification/deletion race.
pub fn file_mtime_millis(path: &Path) -> Result<i64> {
    Ok(mtime_millis(&std::fs::metadata(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn collects_relevant_files_recursively() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("b.flac"), b"x").unwrap();

        let snapshot = build(dir.path(), &Classifier::default()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key(&dir.path().join("a.mp3").to_string_lossy().into_owned()));
        assert!(snapshot.contains_key(&sub.join("b.flac").to_string_lossy().into_owned()));
    }

    #[test]
    fn mtimes_match_filesystem() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        fs::write(&path, b"x").unwrap();

        let snapshot = build(dir.path(), &Classifier::default()).unwrap();
        let expected = mtime_millis(&fs::metadata(&path).unwrap());
        assert_eq!(
            snapshot[&path.to_string_lossy().into_owned()],
            expected
        );
        assert!(expected > 0);
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = build(Path::new("/no/such/root"), &Classifier::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn file_root_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        fs::write(&path, b"x").unwrap();
        assert!(build(&path, &Classifier::default()).is_err());
    }
}
