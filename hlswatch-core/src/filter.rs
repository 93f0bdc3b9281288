//! Extension gate applied to every path entering the pipeline.

use std::path::Path;

/// Source containers whose audio/video streams copy directly into fMP4 HLS
/// segments without re-encoding.
pub const MEDIA_SOURCE_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov"];

/// Returns true when `path` names a file the pipeline should convert.
///
/// A pure function of the path's extension, case-insensitive. The same
/// predicate gates the startup scan, live watch events, and the sweep
/// handoff into the job queue, so a path's eligibility cannot drift between
/// those stages.
pub fn is_media_source(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => MEDIA_SOURCE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        None => false,
    }
}
