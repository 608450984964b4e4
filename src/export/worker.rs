use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Result, VideoEditError};
use crate::export::executor::{CancelFlag, ExportExecutor, ExportProgress, ExportState, ExportSummary};
use crate::export::job::ExportJob;
use crate::video::encoder::EncoderBackend;
use crate::video::source::SourceHandle;

/// Runs exports on tokio's blocking pool so the caller's event loop stays
/// responsive
#[derive(Debug, Clone, Default)]
pub struct ExportWorker {
    executor: ExportExecutor,
}

/// A running background export
pub struct ExportTask {
    handle: JoinHandle<Result<ExportSummary>>,
    progress: watch::Receiver<ExportProgress>,
    cancel: CancelFlag,
}

impl ExportWorker {
    pub fn new(executor: ExportExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &ExportExecutor {
        &self.executor
    }

    pub fn state(&self) -> ExportState {
        self.executor.state()
    }

    /// Start `job` in the background
    ///
    /// Must be called from within a tokio runtime. Fails with `Busy` right
    /// away if an export is already running.
    pub fn spawn(
        &self,
        job: ExportJob,
        source: SourceHandle,
        backend: Arc<dyn EncoderBackend>,
    ) -> Result<ExportTask> {
        // Admit the job before handing out the task so an early cancel sticks
        self.executor.begin(job.total_frames())?;

        let (tx, rx) = watch::channel(ExportProgress {
            frames_written: 0,
            total_frames: job.total_frames(),
        });
        let executor = self.executor.clone();
        let cancel = executor.cancel_flag();

        debug!("Spawning export of {} frames", job.total_frames());
        let handle = tokio::task::spawn_blocking(move || {
            executor.run_started(&job, &source, backend.as_ref(), &mut |progress: ExportProgress| {
                let _ = tx.send(progress);
            })
        });

        Ok(ExportTask {
            handle,
            progress: rx,
            cancel,
        })
    }
}

impl ExportTask {
    /// Receiver that always holds the latest progress
    pub fn progress(&self) -> watch::Receiver<ExportProgress> {
        self.progress.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the export to end
    pub async fn wait(self) -> Result<ExportSummary> {
        self.handle
            .await
            .map_err(|e| VideoEditError::generic(format!("export task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::error::ExportError;
    use crate::edit::state::EditState;
    use crate::export::planner::ExportPlanner;
    use crate::video::encoder::{DryRunEncoder, VideoCodec};
    use crate::video::synthetic::SyntheticSource;
    use tempfile::TempDir;

    fn video_job(handle: &SourceHandle) -> ExportJob {
        let state = EditState::new(handle.metadata().frame_count);
        let mode = ExportPlanner::with_codec(Some(VideoCodec::H264))
            .plan(&".mp4".parse().unwrap(), &state)
            .unwrap();
        ExportJob::new(
            state,
            mode,
            handle.path(),
            handle.metadata().fps,
            0,
            &ExportConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_background_export_reports_progress() {
        let dir = TempDir::new().unwrap();
        let handle = SourceHandle::new(
            Box::new(SyntheticSource::new(12, 24.0, 16, 16)),
            dir.path().join("clip.mov"),
        );
        let encoder = DryRunEncoder::new();
        let worker = ExportWorker::default();

        let task = worker
            .spawn(video_job(&handle), handle.clone(), Arc::new(encoder.clone()))
            .unwrap();
        let progress = task.progress();
        let summary = task.wait().await.unwrap();

        assert_eq!(summary.frames_written, 12);
        assert_eq!(*progress.borrow(), ExportProgress { frames_written: 12, total_frames: 12 });
        assert_eq!(encoder.records()[0].frame_dims.len(), 12);
        assert!(matches!(worker.state(), ExportState::Completed(_)));
    }

    #[tokio::test]
    async fn test_background_failure_surfaces_error() {
        let dir = TempDir::new().unwrap();
        let handle = SourceHandle::new(
            Box::new(SyntheticSource::new(12, 24.0, 16, 16)),
            dir.path().join("clip.mov"),
        );
        let worker = ExportWorker::default();

        let task = worker
            .spawn(
                video_job(&handle),
                handle,
                Arc::new(DryRunEncoder::new().without(VideoCodec::H264)),
            )
            .unwrap();
        let err = task.wait().await.unwrap_err();

        assert!(matches!(
            err,
            VideoEditError::Export(ExportError::EncoderUnavailable { .. })
        ));
        assert!(matches!(worker.state(), ExportState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_cancel_right_after_spawn_stops_export() {
        let dir = TempDir::new().unwrap();
        let handle = SourceHandle::new(
            Box::new(SyntheticSource::new(200, 24.0, 16, 16)),
            dir.path().join("clip.mov"),
        );
        let encoder = DryRunEncoder::new();
        let worker = ExportWorker::default();

        let task = worker
            .spawn(video_job(&handle), handle.clone(), Arc::new(encoder.clone()))
            .unwrap();
        task.cancel();
        let err = task.wait().await.unwrap_err();

        assert!(matches!(
            err,
            VideoEditError::Export(ExportError::Cancelled { frames_written: 0 })
        ));
        assert!(matches!(
            worker.state(),
            ExportState::Failed { frames_written: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_spawn_refused_while_job_admitted() {
        let dir = TempDir::new().unwrap();
        let handle = SourceHandle::new(
            Box::new(SyntheticSource::new(12, 24.0, 16, 16)),
            dir.path().join("clip.mov"),
        );
        let worker = ExportWorker::default();
        worker.executor().begin(12).unwrap();

        let err = worker
            .spawn(video_job(&handle), handle, Arc::new(DryRunEncoder::new()))
            .err()
            .unwrap();

        assert!(matches!(err, VideoEditError::Export(ExportError::Busy)));
        assert!(!dir.path().join("clip_frames").exists());
    }
}
