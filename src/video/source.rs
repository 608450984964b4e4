use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::error::{Result, VideoEditError};
use crate::video::types::{Frame, VideoMetadata};

/// A decodable video stream
///
/// Decode position is mutable state: `seek` moves it, `read_next` advances it
/// by one frame. Implementations are driven by one caller at a time through
/// [`SourceHandle`].
pub trait VideoSource: Send {
    /// Stream metadata captured when the source was opened
    fn metadata(&self) -> &VideoMetadata;

    /// Position the stream so that the next `read_next` returns frame `index`
    fn seek(&mut self, index: usize) -> Result<()>;

    /// Decode the next frame, or `None` at end of stream
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Index of the frame the next `read_next` will return
    fn position(&self) -> usize;

    fn frame_count(&self) -> usize {
        self.metadata().frame_count
    }

    fn fps(&self) -> f64 {
        self.metadata().fps
    }

    fn width(&self) -> u32 {
        self.metadata().width
    }

    fn height(&self) -> u32 {
        self.metadata().height
    }
}

/// Opens a path into a [`VideoSource`]
pub trait SourceOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>>;
}

impl<F> SourceOpener for F
where
    F: Fn(&Path) -> Result<Box<dyn VideoSource>>,
{
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>> {
        self(path)
    }
}

/// Shared, mutex-guarded reference to the single open video source
///
/// Preview reads and exports both go through the lock, so a seek from one can
/// never interleave with a read from the other.
#[derive(Clone)]
pub struct SourceHandle {
    inner: Arc<Mutex<Box<dyn VideoSource>>>,
    metadata: VideoMetadata,
    path: PathBuf,
}

impl SourceHandle {
    pub fn new<P: Into<PathBuf>>(source: Box<dyn VideoSource>, path: P) -> Self {
        let metadata = source.metadata().clone();
        Self {
            inner: Arc::new(Mutex::new(source)),
            metadata,
            path: path.into(),
        }
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the source was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the source is free and take exclusive access
    pub fn lock(&self) -> Result<MutexGuard<'_, Box<dyn VideoSource>>> {
        self.inner
            .lock()
            .map_err(|_| VideoEditError::generic("video source lock poisoned"))
    }

    /// Take exclusive access only if nobody else holds it
    pub fn try_lock(&self) -> Result<Option<MutexGuard<'_, Box<dyn VideoSource>>>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(Some(guard)),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Poisoned(_)) => {
                Err(VideoEditError::generic("video source lock poisoned"))
            }
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish()
    }
}
