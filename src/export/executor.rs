use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::edit::transform::FrameTransformer;
use crate::error::{ExportError, FrameError, Result, SegmentError, SourceError, VideoEditError};
use crate::export::job::ExportJob;
use crate::export::planner::ExportMode;
use crate::export::sink::{FrameSink, ImageFileSink, VideoSink};
use crate::video::encoder::{EncoderBackend, WriterSpec};
use crate::video::source::{SourceHandle, VideoSource};

/// Progress of a running export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportProgress {
    pub frames_written: usize,
    pub total_frames: usize,
}

impl ExportProgress {
    /// Completion in percent, 0.0 to 100.0
    pub fn percent(&self) -> f64 {
        if self.total_frames == 0 {
            return 100.0;
        }
        self.frames_written as f64 * 100.0 / self.total_frames as f64
    }
}

/// Result of a successful export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub outputs: Vec<PathBuf>,
    pub frames_written: usize,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

/// Lifecycle of the executor: `Idle -> Running -> Completed | Failed`
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExportState {
    #[default]
    Idle,
    Running {
        frames_written: usize,
        total_frames: usize,
    },
    Completed(ExportSummary),
    /// Files written before the failure are left in place and listed here
    Failed {
        message: String,
        partial_outputs: Vec<PathBuf>,
        frames_written: usize,
    },
}

impl ExportState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Handle for cancelling an in-progress export
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running export to stop before its next frame
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// An export that did not complete, with whatever it left behind
struct Failure {
    error: VideoEditError,
    partial_outputs: Vec<PathBuf>,
    frames_written: usize,
}

impl From<VideoEditError> for Failure {
    fn from(error: VideoEditError) -> Self {
        Self {
            error,
            partial_outputs: Vec::new(),
            frames_written: 0,
        }
    }
}

/// Runs export jobs, at most one at a time
///
/// Clones share the same state, so a clone handed to a worker thread and the
/// one the session keeps both see `Running` and both refuse a second job.
#[derive(Debug, Clone, Default)]
pub struct ExportExecutor {
    state: Arc<Mutex<ExportState>>,
    cancel: CancelFlag,
    transformer: FrameTransformer,
}

impl ExportExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current lifecycle state
    pub fn state(&self) -> ExportState {
        self.lock_state().clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().is_running()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run `job` to completion on the calling thread
    ///
    /// Returns `Busy` without touching the source or the filesystem when
    /// another job is running. `progress` is called once per written frame.
    pub fn run(
        &self,
        job: &ExportJob,
        source: &SourceHandle,
        backend: &dyn EncoderBackend,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<ExportSummary> {
        self.begin(job.total_frames())?;
        self.run_started(job, source, backend, progress)
    }

    /// Body of [`run`](Self::run) for a job already admitted by `begin`
    pub(crate) fn run_started(
        &self,
        job: &ExportJob,
        source: &SourceHandle,
        backend: &dyn EncoderBackend,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> Result<ExportSummary> {
        info!(
            "Exporting {} frames [{}, {}) of {} as {}",
            job.total_frames(),
            job.frame_range().start,
            job.frame_range().end,
            source.path().display(),
            job.mode().label()
        );
        let started = Instant::now();

        match self.execute(job, source, backend, progress) {
            Ok(summary) => {
                info!(
                    "Export finished: {} frames in {:.2}s -> {}",
                    summary.frames_written,
                    started.elapsed().as_secs_f64(),
                    job.output_dir().display()
                );
                self.set_state(ExportState::Completed(summary.clone()));
                Ok(summary)
            }
            Err(failure) => {
                warn!(
                    "Export failed after {} frames: {}",
                    failure.frames_written, failure.error
                );
                for path in &failure.partial_outputs {
                    warn!("Partial output left on disk: {}", path.display());
                }
                self.set_state(ExportState::Failed {
                    message: failure.error.to_string(),
                    partial_outputs: failure.partial_outputs,
                    frames_written: failure.frames_written,
                });
                Err(failure.error)
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ExportState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: ExportState) {
        *self.lock_state() = state;
    }

    /// Claim the executor for a job of `total_frames` and clear any earlier
    /// cancel request
    pub(crate) fn begin(&self, total_frames: usize) -> Result<()> {
        let mut state = self.lock_state();
        if state.is_running() {
            return Err(ExportError::Busy.into());
        }
        *state = ExportState::Running {
            frames_written: 0,
            total_frames,
        };
        self.cancel.reset();
        Ok(())
    }

    fn execute(
        &self,
        job: &ExportJob,
        source: &SourceHandle,
        backend: &dyn EncoderBackend,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> std::result::Result<ExportSummary, Failure> {
        let metadata = source.metadata();
        let range = job.frame_range();
        if range.is_empty() || range.end > metadata.frame_count {
            return Err(VideoEditError::from(SegmentError::InvalidRange {
                begin: range.start,
                end: range.end,
                total: metadata.frame_count,
            })
            .into());
        }

        if let Some(crop) = job.state().crop_rect() {
            if !crop.fits_within(metadata.width, metadata.height) {
                return Err(VideoEditError::from(FrameError::InvalidRegion {
                    x1: crop.x1(),
                    y1: crop.y1(),
                    x2: crop.x2(),
                    y2: crop.y2(),
                    width: metadata.width,
                    height: metadata.height,
                })
                .into());
            }
        }

        if let ExportMode::EncodedVideo { codec, .. } = job.mode() {
            if !backend.is_available(*codec) {
                return Err(VideoEditError::from(ExportError::EncoderUnavailable {
                    codec: codec.to_string(),
                })
                .into());
            }
        }

        let (width, height) = job.state().output_dimensions(metadata.width, metadata.height);

        fs::create_dir_all(job.output_dir()).map_err(|e| {
            VideoEditError::from(ExportError::Io {
                path: job.output_dir().to_path_buf(),
                reason: e.to_string(),
            })
        })?;

        let mut sink = self.open_sink(job, backend, width, height)?;

        match self.pump(job, source, sink.as_mut(), progress) {
            Ok(frames_written) => match sink.finish() {
                Ok(outputs) => Ok(ExportSummary {
                    outputs,
                    frames_written,
                    width,
                    height,
                    fps: job.fps(),
                }),
                Err(error) => Err(Failure {
                    error,
                    partial_outputs: job.video_path().into_iter().filter(|p| p.exists()).collect(),
                    frames_written,
                }),
            },
            Err((error, frames_written)) => Err(Failure {
                error,
                partial_outputs: sink.abort(),
                frames_written,
            }),
        }
    }

    fn open_sink(
        &self,
        job: &ExportJob,
        backend: &dyn EncoderBackend,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameSink>> {
        match job.mode() {
            ExportMode::SingleImage { format } | ExportMode::ImageSequence { format } => Ok(
                Box::new(ImageFileSink::new(job.output_dir(), *format, job.jpeg_quality())),
            ),
            ExportMode::EncodedVideo { codec, .. } => {
                let path = job
                    .video_path()
                    .ok_or_else(|| VideoEditError::generic("video job without output path"))?;
                let spec = WriterSpec {
                    path,
                    codec: *codec,
                    fps: job.fps(),
                    width,
                    height,
                };
                Ok(Box::new(VideoSink::open(backend, &spec)?))
            }
        }
    }

    /// Read, transform and hand off every frame of the job's range while
    /// holding the source lock
    fn pump(
        &self,
        job: &ExportJob,
        source: &SourceHandle,
        sink: &mut dyn FrameSink,
        progress: &mut dyn FnMut(ExportProgress),
    ) -> std::result::Result<usize, (VideoEditError, usize)> {
        let range = job.frame_range();
        let total_frames = range.len();
        let mut frames_written = 0;

        let mut guard = source.lock().map_err(|e| (e, 0))?;
        guard.seek(range.start).map_err(|e| (e, 0))?;

        for index in range {
            if self.cancel.is_cancelled() {
                return Err((
                    ExportError::Cancelled { frames_written }.into(),
                    frames_written,
                ));
            }

            self.process_frame(&mut **guard, job, sink, index)
                .map_err(|e| (e, frames_written))?;
            frames_written += 1;

            let update = ExportProgress {
                frames_written,
                total_frames,
            };
            self.set_state(ExportState::Running {
                frames_written,
                total_frames,
            });
            progress(update);
            debug!("Exported frame {} ({}/{})", index, frames_written, total_frames);
        }

        Ok(frames_written)
    }

    fn process_frame(
        &self,
        source: &mut dyn VideoSource,
        job: &ExportJob,
        sink: &mut dyn FrameSink,
        index: usize,
    ) -> Result<()> {
        let frame = source.read_next()?.ok_or_else(|| SourceError::Decode {
            index,
            reason: "source ended before the segment did".to_string(),
        })?;
        let frame = self.transformer.apply(frame, job.state())?;
        sink.accept(index, frame)
    }
}
