//! Tag extraction adapter around lofty.
//!
//! The rest of the crate treats extraction as a pure, infallible function:
//! any parse failure collapses to an empty [`TrackMeta`] so that a corrupt or
//! unsupported file still gets a row with `path` and `mtime` populated.

use std::path::Path;

use lofty::file::FileType;
use lofty::prelude::*;
use lofty::read_from_path;

use crate::track::TrackMeta;

/// Read descriptive fields from an audio file.
///
/// Never fails: unreadable, unsupported, or tag-less files yield an empty
/// record. The failure is logged at debug level and otherwise invisible.
pub fn extract(path: &Path) -> TrackMeta {
    match read_from_path(path) {
        Ok(tagged) => from_tagged(&tagged, path),
        Err(e) => {
            tracing::debug!("[Metadata] Extraction failed for {}: {}", path.display(), e);
            TrackMeta::default()
        }
    }
}

fn from_tagged(tagged: &lofty::file::TaggedFile, path: &Path) -> TrackMeta {
    let mut meta = TrackMeta::default();

    let props = tagged.properties();
    meta.duration = Some(props.duration().as_secs() as i64);
    meta.bitrate = props.audio_bitrate().or_else(|| props.overall_bitrate());
    // lofty's generic properties do not expose the bitrate mode, so VBR
    // detection stays unset here.
    meta.is_vbr = None;

    let (codec, container) = format_names(tagged.file_type(), path);
    meta.codec = Some(codec.to_string());
    meta.container = container;

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        meta.title = non_empty(tag.title());
        meta.artist = non_empty(tag.artist());
        meta.album = non_empty(tag.album());
        meta.year = tag.year().map(|y| y as i32);
        meta.track_no = tag.track();
        meta.disk = tag.disk();
        if let Some(genre) = non_empty(tag.genre()) {
            meta.tags.push(genre);
        }
    }

    meta
}

fn non_empty(value: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map lofty's detected file type to (codec, container) labels.
///
/// The container falls back to the lowercased extension when the format does
/// not pin it down.
fn format_names(file_type: FileType, path: &Path) -> (&'static str, Option<String>) {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    match file_type {
        FileType::Mpeg => ("mpeg", Some("mp3".to_string())),
        FileType::Flac => ("flac", Some("flac".to_string())),
        FileType::Vorbis => ("vorbis", Some("ogg".to_string())),
        FileType::Opus => ("opus", Some("ogg".to_string())),
        FileType::Speex => ("speex", Some("ogg".to_string())),
        FileType::Mp4 => ("aac", Some("mp4".to_string())),
        FileType::Wav => ("pcm", Some("wav".to_string())),
        FileType::Aiff => ("pcm", Some("aiff".to_string())),
        FileType::Ape => ("ape", Some("ape".to_string())),
        FileType::WavPack => ("wavpack", Some("wv".to_string())),
        FileType::Aac => ("aac", Some("aac".to_string())),
        _ => ("unknown", ext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn garbage_file_yields_empty_meta() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        fs::write(&path, b"definitely not an mpeg stream").unwrap();

        let meta = extract(&path);
        assert_eq!(meta, TrackMeta::default());
    }

    #[test]
    fn missing_file_yields_empty_meta() {
        let meta = extract(Path::new("/no/such/file.mp3"));
        assert_eq!(meta, TrackMeta::default());
    }

    #[test]
    fn format_names_fall_back_to_extension() {
        let (codec, container) = format_names(FileType::Custom("x"), Path::new("/tmp/a.xyz"));
        assert_eq!(codec, "unknown");
        assert_eq!(container.as_deref(), Some("xyz"));
    }
}
