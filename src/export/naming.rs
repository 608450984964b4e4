//! Output path conventions shared by all export modes.
//!
//! Everything lands in `<base>_frames/` next to the input, where `<base>` is
//! the input path without its extension.

use std::path::{Path, PathBuf};

/// `<dir>/<stem>_frames` for an input at `<dir>/<stem>.<ext>`
pub fn frames_dir(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{}_frames", stem))
}

/// `<index:06>.<ext>`, used for snapshots and sequence frames
pub fn frame_file_name(index: usize, extension: &str) -> String {
    format!("{:06}.{}", index, extension)
}

/// `<begin:06>-<end:06>.<ext>`, used for segment videos
pub fn segment_file_name(begin: usize, end: usize, extension: &str) -> String {
    format!("{:06}-{:06}.{}", begin, end, extension)
}
