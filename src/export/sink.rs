use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ExportError, Result};
use crate::export::naming;
use crate::video::encoder::{encode_image, EncoderBackend, ImageFormat, VideoWriter, WriterSpec};
use crate::video::types::Frame;

/// Destination for transformed frames during an export
pub trait FrameSink: Send {
    /// Consume the frame that came from source index `index`
    fn accept(&mut self, index: usize, frame: Frame) -> Result<()>;

    /// Flush and release everything; returns the finished output paths
    fn finish(self: Box<Self>) -> Result<Vec<PathBuf>>;

    /// Release after a failure, returning whatever already exists on disk
    fn abort(self: Box<Self>) -> Vec<PathBuf>;
}

/// Writes each frame to `<dir>/<index:06>.<ext>`
pub struct ImageFileSink {
    dir: PathBuf,
    format: ImageFormat,
    jpeg_quality: u8,
    written: Vec<PathBuf>,
}

impl ImageFileSink {
    pub fn new<P: Into<PathBuf>>(dir: P, format: ImageFormat, jpeg_quality: u8) -> Self {
        Self {
            dir: dir.into(),
            format,
            jpeg_quality,
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl FrameSink for ImageFileSink {
    fn accept(&mut self, index: usize, frame: Frame) -> Result<()> {
        let path = self
            .dir
            .join(naming::frame_file_name(index, self.format.extension()));
        let bytes = encode_image(&frame, self.format, self.jpeg_quality)?;
        fs::write(&path, bytes).map_err(|e| ExportError::Io {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Vec<PathBuf>> {
        Ok(self.written)
    }

    fn abort(self: Box<Self>) -> Vec<PathBuf> {
        self.written
    }
}

/// Feeds frames into one open encoded-video stream
pub struct VideoSink {
    writer: Box<dyn VideoWriter>,
    path: PathBuf,
}

impl VideoSink {
    /// Open the stream described by `spec` through `backend`
    pub fn open(backend: &dyn EncoderBackend, spec: &WriterSpec) -> Result<Self> {
        let writer = backend.open(spec)?;
        debug!(
            "Opened {} stream {} at {}x{} @ {:.3} fps via {}",
            spec.codec,
            spec.path.display(),
            spec.width,
            spec.height,
            spec.fps,
            backend.name()
        );
        Ok(Self {
            writer,
            path: spec.path.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for VideoSink {
    fn accept(&mut self, _index: usize, frame: Frame) -> Result<()> {
        self.writer.write(&frame)
    }

    fn finish(self: Box<Self>) -> Result<Vec<PathBuf>> {
        let frames = self.writer.frames_written();
        self.writer.close()?;
        debug!("Closed {} after {} frames", self.path.display(), frames);
        Ok(vec![self.path])
    }

    fn abort(self: Box<Self>) -> Vec<PathBuf> {
        if let Err(e) = self.writer.close() {
            warn!("Closing partial output {} failed: {}", self.path.display(), e);
        }
        if self.path.exists() {
            vec![self.path]
        } else {
            Vec::new()
        }
    }
}
