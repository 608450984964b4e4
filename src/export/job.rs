use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::edit::state::EditState;
use crate::export::naming;
use crate::export::planner::ExportMode;

/// Immutable snapshot of everything one export run needs
///
/// Created when an export starts and dropped when it ends; later edits to the
/// session never reach a job that is already running.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    state: EditState,
    mode: ExportMode,
    output_dir: PathBuf,
    current_frame: usize,
    fps: f64,
    jpeg_quality: u8,
}

impl ExportJob {
    /// `source_fps` is the source's native rate; the declared output rate is
    /// derived from it through the configured speed policy
    pub fn new(
        state: EditState,
        mode: ExportMode,
        source_path: &Path,
        source_fps: f64,
        current_frame: usize,
        config: &ExportConfig,
    ) -> Self {
        let fps = config
            .speed_policy
            .export_fps(source_fps, state.playback_speed());
        Self {
            output_dir: naming::frames_dir(source_path),
            state,
            mode,
            current_frame,
            fps,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn mode(&self) -> &ExportMode {
        &self.mode
    }

    /// The `<base>_frames` directory all outputs go to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Frame rate declared for encoded video
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Source frame indices the job reads
    pub fn frame_range(&self) -> Range<usize> {
        match self.mode {
            ExportMode::SingleImage { .. } => self.current_frame..self.current_frame + 1,
            _ => self.state.segment_begin()..self.state.segment_end(),
        }
    }

    pub fn total_frames(&self) -> usize {
        self.frame_range().len()
    }

    /// Path of the encoded segment video, if this is a video job
    pub fn video_path(&self) -> Option<PathBuf> {
        match &self.mode {
            ExportMode::EncodedVideo { extension, .. } => Some(self.output_dir.join(
                naming::segment_file_name(
                    self.state.segment_begin(),
                    self.state.segment_end(),
                    extension,
                ),
            )),
            _ => None,
        }
    }
}
