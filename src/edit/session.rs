use std::path::Path;

use tracing::{debug, info};

use crate::config::{Config, ExportConfig, PreviewConfig};
use crate::edit::crop::CropEditor;
use crate::edit::playback::{PlaybackClock, Tick};
use crate::edit::segment::SegmentSelector;
use crate::edit::state::{CropRect, EditState, ResizeTarget};
use crate::edit::transform::FrameTransformer;
use crate::error::{ExportError, FrameError, Result, SourceError};
use crate::export::{
    ExportExecutor, ExportJob, ExportPlanner, ExportProgress, ExportSummary, OutputFormat,
};
use crate::video::encoder::EncoderBackend;
use crate::video::source::{SourceHandle, SourceOpener};
use crate::video::types::{Frame, VideoMetadata};

/// One editing session over at most one open video
///
/// Owns the source handle and the edit state. Every edit goes through a
/// confirm or clear call here; exports take a snapshot of the state at the
/// moment they start.
pub struct EditingSession {
    export_config: ExportConfig,
    preview_config: PreviewConfig,
    planner: ExportPlanner,
    executor: ExportExecutor,
    transformer: FrameTransformer,
    source: Option<SourceHandle>,
    state: EditState,
    selector: SegmentSelector,
    clock: PlaybackClock,
    current_frame: Option<usize>,
    last_resize: Option<ResizeTarget>,
}

impl EditingSession {
    pub fn new(config: &Config) -> Self {
        Self {
            export_config: config.export.clone(),
            preview_config: config.preview.clone(),
            planner: ExportPlanner::with_codec(config.export.codec),
            executor: ExportExecutor::new(),
            transformer: FrameTransformer::new(),
            source: None,
            state: EditState::new(0),
            selector: SegmentSelector::new(0),
            clock: PlaybackClock::new(0.0, 0),
            current_frame: None,
            last_resize: None,
        }
    }

    /// Open `path`, replacing any video already loaded
    ///
    /// The previous source is released first. Segment, crop, resize and speed
    /// all reset; the remembered resize dimensions do not.
    pub fn load_video(&mut self, path: &Path, opener: &dyn SourceOpener) -> Result<&VideoMetadata> {
        if self.executor.is_running() {
            return Err(ExportError::Busy.into());
        }
        if !self.preview_config.accepts(path) {
            let format = path
                .extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(SourceError::UnsupportedFormat { format }.into());
        }

        self.source = None;
        self.current_frame = None;

        let source = opener.open(path)?;
        let handle = SourceHandle::new(source, path);
        let metadata = handle.metadata().clone();
        info!(
            "Loaded {}: {} frames, {:.3} fps, {}x{}",
            path.display(),
            metadata.frame_count,
            metadata.fps,
            metadata.width,
            metadata.height
        );

        self.selector.set_range(metadata.frame_count);
        self.state = EditState::new(metadata.frame_count);
        self.clock = PlaybackClock::new(metadata.fps, metadata.frame_count);
        self.source = Some(handle);

        Ok(self.source()?.metadata())
    }

    /// Release the current video, if any
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!("Video source released");
        }
        self.current_frame = None;
    }

    pub fn source(&self) -> Result<&SourceHandle> {
        self.source.as_ref().ok_or_else(|| SourceError::NotLoaded.into())
    }

    pub fn metadata(&self) -> Result<&VideoMetadata> {
        Ok(self.source()?.metadata())
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn executor(&self) -> &ExportExecutor {
        &self.executor
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    /// Index of the most recently displayed frame
    pub fn current_frame(&self) -> Option<usize> {
        self.current_frame
    }

    pub fn selector(&self) -> &SegmentSelector {
        &self.selector
    }

    pub fn confirm_segment(&mut self, begin: usize, end: usize) -> Result<&EditState> {
        self.source()?;
        self.state = self.selector.confirm(&self.state, begin, end)?;
        self.clock.set_segment(begin, end);
        Ok(&self.state)
    }

    pub fn cancel_segment(&mut self) -> &EditState {
        self.state = self.selector.cancel(&self.state);
        let (begin, end) = self.selector.range();
        self.clock.set_segment(begin, end);
        &self.state
    }

    /// Crop editor over the full frame of the loaded video
    pub fn crop_editor(&self) -> Result<CropEditor> {
        let metadata = self.metadata()?;
        Ok(CropEditor::new(metadata.width, metadata.height))
    }

    /// Store `rect` as the crop; it must lie inside the source frame
    pub fn confirm_crop(&mut self, rect: CropRect) -> Result<&EditState> {
        let metadata = self.metadata()?;
        if !rect.fits_within(metadata.width, metadata.height) {
            return Err(FrameError::InvalidRegion {
                x1: rect.x1(),
                y1: rect.y1(),
                x2: rect.x2(),
                y2: rect.y2(),
                width: metadata.width,
                height: metadata.height,
            }
            .into());
        }
        debug!("Crop confirmed: {:?}", rect);
        self.state = self.state.clone().with_crop(Some(rect));
        Ok(&self.state)
    }

    pub fn clear_crop(&mut self) -> &EditState {
        self.state = self.state.clone().with_crop(None);
        &self.state
    }

    /// Initial values for a resize prompt: the last confirmed resize, else the
    /// source frame size
    pub fn resize_defaults(&self) -> Result<(u32, u32)> {
        if let Some(last) = self.last_resize {
            return Ok((last.width(), last.height()));
        }
        let metadata = self.metadata()?;
        Ok((metadata.width, metadata.height))
    }

    pub fn confirm_resize(&mut self, width: u32, height: u32) -> Result<&EditState> {
        self.source()?;
        let target = ResizeTarget::new(width, height)?;
        debug!("Resize confirmed: {}x{}", width, height);
        self.last_resize = Some(target);
        self.state = self.state.clone().with_resize(Some(target));
        Ok(&self.state)
    }

    pub fn clear_resize(&mut self) -> &EditState {
        self.state = self.state.clone().with_resize(None);
        &self.state
    }

    /// Set playback speed, clamped into the configured range
    pub fn confirm_speed(&mut self, speed: f64) -> &EditState {
        if speed.is_finite() {
            let speed = self.preview_config.clamp_speed(speed);
            self.state = self.state.clone().with_speed(speed);
            self.clock.set_speed(speed);
        }
        &self.state
    }

    /// Decode frame `index` and apply the current crop and resize
    ///
    /// Fails with `Busy` instead of waiting while an export holds the source.
    pub fn preview_frame(&mut self, index: usize) -> Result<Frame> {
        let handle = self.source()?;
        let frame = {
            let mut source = handle.try_lock()?.ok_or(ExportError::Busy)?;
            source.seek(index)?;
            source.read_next()?.ok_or_else(|| SourceError::Decode {
                index,
                reason: "end of stream".to_string(),
            })?
        };
        let frame = self.transformer.apply(frame, &self.state)?;
        self.current_frame = Some(index);
        Ok(frame)
    }

    /// Advance preview playback by one timer tick
    pub fn tick(&mut self) -> Result<Option<Frame>> {
        match self.clock.tick() {
            Tick::Idle => Ok(None),
            Tick::Show { index, .. } => self.preview_frame(index).map(Some),
        }
    }

    /// Snapshot the current state into an export job for `format`
    pub fn export_job(&self, format: &OutputFormat) -> Result<ExportJob> {
        let handle = self.source()?;
        let mode = self.planner.plan(format, &self.state)?;
        let current = match format {
            OutputFormat::Image(_) => self.current_frame.ok_or(ExportError::NoCurrentFrame)?,
            _ => self.state.segment_begin(),
        };

        Ok(ExportJob::new(
            self.state.clone(),
            mode,
            handle.path(),
            handle.metadata().fps,
            current,
            &self.export_config,
        ))
    }

    /// Export on the calling thread
    pub fn export(
        &self,
        format: &OutputFormat,
        backend: &dyn EncoderBackend,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<ExportSummary> {
        if self.executor.is_running() {
            return Err(ExportError::Busy.into());
        }
        let job = self.export_job(format)?;
        self.executor.run(&job, self.source()?, backend, progress)
    }
}

impl std::fmt::Debug for EditingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditingSession")
            .field("source", &self.source)
            .field("state", &self.state)
            .field("current_frame", &self.current_frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SegmentError, VideoEditError};
    use crate::video::encoder::{DryRunEncoder, VideoCodec};
    use crate::video::source::VideoSource;
    use crate::video::synthetic::SyntheticSource;
    use tempfile::TempDir;

    fn synthetic_opener(path: &Path) -> Result<Box<dyn VideoSource>> {
        let _ = path;
        Ok(Box::new(SyntheticSource::new(100, 30.0, 64, 48)))
    }

    fn loaded(dir: &TempDir) -> EditingSession {
        let mut config = Config::default();
        config.export.codec = Some(VideoCodec::Mp4v);
        let mut session = EditingSession::new(&config);
        session
            .load_video(&dir.path().join("input.mp4"), &synthetic_opener)
            .unwrap();
        session
    }

    #[test]
    fn test_operations_need_a_loaded_video() {
        let mut session = EditingSession::new(&Config::default());
        assert!(matches!(
            session.preview_frame(0),
            Err(VideoEditError::Source(SourceError::NotLoaded))
        ));
        assert!(session.confirm_segment(0, 1).is_err());
        assert!(session.export_job(&".mp4".parse().unwrap()).is_err());
        assert_eq!(session.clock_mut().seek(5), 0);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let mut session = EditingSession::new(&Config::default());
        let err = session
            .load_video(Path::new("clip.mkv"), &synthetic_opener)
            .unwrap_err();
        assert!(matches!(
            err,
            VideoEditError::Source(SourceError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_load_resets_edits() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);
        session.confirm_segment(20, 50).unwrap();
        session.confirm_resize(32, 24).unwrap();
        session.confirm_speed(2.0);

        session
            .load_video(&dir.path().join("other.MOV"), &synthetic_opener)
            .unwrap();
        assert_eq!(session.state(), &EditState::new(100));
        assert_eq!(session.clock().speed(), 1.0);
        assert_eq!(session.resize_defaults().unwrap(), (32, 24));
    }

    #[test]
    fn test_segment_confirm_and_cancel() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);

        let state = session.confirm_segment(20, 50).unwrap();
        assert_eq!((state.segment_begin(), state.segment_end()), (20, 50));
        assert_eq!(session.clock().segment(), (20, 50));

        let err = session.confirm_segment(50, 20).unwrap_err();
        assert!(matches!(err, VideoEditError::Segment(SegmentError::InvalidRange { .. })));
        assert_eq!(session.state().segment_begin(), 20);

        let state = session.cancel_segment();
        assert_eq!((state.segment_begin(), state.segment_end()), (0, 100));
    }

    #[test]
    fn test_crop_must_fit_source() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);
        assert!(session.confirm_crop(CropRect::new(0, 0, 65, 48).unwrap()).is_err());
        assert!(session.state().crop_rect().is_none());

        let mut editor = session.crop_editor().unwrap();
        editor.press(64, 48);
        editor.drag_to(32, 24);
        session.confirm_crop(editor.confirm().unwrap()).unwrap();
        assert_eq!(session.preview_frame(0).unwrap().dimensions(), (32, 24));

        session.clear_crop();
        assert_eq!(session.preview_frame(0).unwrap().dimensions(), (64, 48));
    }

    #[test]
    fn test_resize_defaults_follow_last_confirmed() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);
        assert_eq!(session.resize_defaults().unwrap(), (64, 48));
        assert!(session.confirm_resize(0, 10).is_err());
        session.confirm_resize(16, 12).unwrap();
        assert_eq!(session.resize_defaults().unwrap(), (16, 12));
        assert_eq!(session.preview_frame(3).unwrap().dimensions(), (16, 12));
    }

    #[test]
    fn test_speed_is_clamped_to_configured_range() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);
        assert_eq!(session.confirm_speed(50.0).playback_speed(), 10.0);
        assert_eq!(session.confirm_speed(0.0).playback_speed(), 0.1);
        assert_eq!(session.confirm_speed(f64::NAN).playback_speed(), 0.1);
    }

    #[test]
    fn test_playback_ticks_through_segment() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);
        session.confirm_segment(10, 12).unwrap();
        assert!(session.tick().unwrap().is_none());

        session.clock_mut().play();
        assert_eq!(
            session.tick().unwrap(),
            Some(SyntheticSource::frame_at(10, 64, 48))
        );
        assert!(session.tick().unwrap().is_some());
        assert_eq!(session.current_frame(), Some(11));
        assert!(!session.clock().is_playing());
    }

    #[test]
    fn test_snapshot_needs_a_displayed_frame() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);
        let png: OutputFormat = ".png".parse().unwrap();
        assert!(matches!(
            session.export_job(&png),
            Err(VideoEditError::Export(ExportError::NoCurrentFrame))
        ));

        session.preview_frame(42).unwrap();
        assert_eq!(session.export_job(&png).unwrap().frame_range(), 42..43);
    }

    #[test]
    fn test_export_uses_confirmed_segment() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded(&dir);
        session.confirm_segment(20, 50).unwrap();
        let encoder = DryRunEncoder::new();

        let summary = session
            .export(&".mp4".parse().unwrap(), &encoder, &mut |_: ExportProgress| {})
            .unwrap();
        assert_eq!(
            summary.outputs,
            vec![dir.path().join("input_frames").join("000020-000050.mp4")]
        );
        assert_eq!(encoder.records()[0].frame_dims.len(), 30);
    }
}
