use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::ImageOutputFormat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExportError, Result, VideoEditError};
use crate::video::types::Frame;

/// Video codecs the export pipeline can ask an encoder for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 (`avc1`)
    H264,
    /// Xvid MPEG-4 Part 2 (`XVID`)
    Xvid,
    /// Generic MPEG-4 Part 2 (`mp4v`)
    Mp4v,
}

impl VideoCodec {
    /// Four-character code written into the container
    pub fn fourcc(self) -> &'static str {
        match self {
            Self::H264 => "avc1",
            Self::Xvid => "XVID",
            Self::Mp4v => "mp4v",
        }
    }

    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::Xvid => "libxvid",
            Self::Mp4v => "mpeg4",
        }
    }

    /// The codec each platform is expected to ship an encoder for
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::H264
        } else if cfg!(target_os = "linux") {
            Self::Xvid
        } else {
            Self::Mp4v
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.fourcc())
    }
}

/// Still image formats for snapshots and frame sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

/// Encode a frame into an in-memory image file
pub fn encode_image(frame: &Frame, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let output_format = match format {
        ImageFormat::Jpeg => ImageOutputFormat::Jpeg(jpeg_quality.clamp(1, 100)),
        ImageFormat::Png => ImageOutputFormat::Png,
    };

    let mut buffer = Cursor::new(Vec::new());
    frame
        .as_image()
        .write_to(&mut buffer, output_format)
        .map_err(|e| ExportError::Encode {
            reason: format!("{} encoding failed: {}", format.extension(), e),
        })?;
    Ok(buffer.into_inner())
}

/// Parameters an encoded video stream is opened with
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSpec {
    pub path: PathBuf,
    pub codec: VideoCodec,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// An open encoded-video output stream
pub trait VideoWriter: Send {
    /// Append a frame; frames must match the dimensions the stream was opened with
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and release the output
    fn close(self: Box<Self>) -> Result<()>;

    fn frames_written(&self) -> usize;
}

/// Factory for encoded-video output streams
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether an encoder for `codec` can be opened on this system
    fn is_available(&self, codec: VideoCodec) -> bool;

    fn open(&self, spec: &WriterSpec) -> Result<Box<dyn VideoWriter>>;
}

/// What a [`DryRunEncoder`] saw for one opened stream
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunRecord {
    pub spec: WriterSpec,
    pub frame_dims: Vec<(u32, u32)>,
    pub closed: bool,
}

/// Encoder backend that records what would have been encoded and writes nothing
///
/// Backs `vidcut export --dry-run`.
#[derive(Clone, Default)]
pub struct DryRunEncoder {
    records: Arc<Mutex<Vec<DryRunRecord>>>,
    unavailable: Vec<VideoCodec>,
    fail_after: Option<usize>,
}

impl DryRunEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `codec` as missing
    pub fn without(mut self, codec: VideoCodec) -> Self {
        self.unavailable.push(codec);
        self
    }

    /// Fail every stream once it has accepted `frames` frames
    pub fn fail_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Snapshot of every stream opened so far
    pub fn records(&self) -> Vec<DryRunRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl EncoderBackend for DryRunEncoder {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn is_available(&self, codec: VideoCodec) -> bool {
        !self.unavailable.contains(&codec)
    }

    fn open(&self, spec: &WriterSpec) -> Result<Box<dyn VideoWriter>> {
        if !self.is_available(spec.codec) {
            return Err(ExportError::EncoderUnavailable {
                codec: spec.codec.to_string(),
            }
            .into());
        }

        let mut records = self
            .records
            .lock()
            .map_err(|_| VideoEditError::generic("dry-run record lock poisoned"))?;
        records.push(DryRunRecord {
            spec: spec.clone(),
            frame_dims: Vec::new(),
            closed: false,
        });
        debug!("Dry-run stream opened: {:?}", spec);

        Ok(Box::new(DryRunWriter {
            records: Arc::clone(&self.records),
            slot: records.len() - 1,
            width: spec.width,
            height: spec.height,
            written: 0,
            fail_after: self.fail_after,
        }))
    }
}

struct DryRunWriter {
    records: Arc<Mutex<Vec<DryRunRecord>>>,
    slot: usize,
    width: u32,
    height: u32,
    written: usize,
    fail_after: Option<usize>,
}

impl DryRunWriter {
    fn update<F: FnOnce(&mut DryRunRecord)>(&self, f: F) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| VideoEditError::generic("dry-run record lock poisoned"))?;
        if let Some(record) = records.get_mut(self.slot) {
            f(record);
        }
        Ok(())
    }
}

impl VideoWriter for DryRunWriter {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.fail_after == Some(self.written) {
            return Err(ExportError::Encode {
                reason: format!("injected failure after {} frames", self.written),
            }
            .into());
        }
        if frame.dimensions() != (self.width, self.height) {
            return Err(ExportError::Encode {
                reason: format!(
                    "frame is {}x{}, stream expects {}x{}",
                    frame.width(),
                    frame.height(),
                    self.width,
                    self.height
                ),
            }
            .into());
        }

        let dims = frame.dimensions();
        self.update(|record| record.frame_dims.push(dims))?;
        self.written += 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.update(|record| record.closed = true)
    }

    fn frames_written(&self) -> usize {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_encoding_decodes_back() {
        let frame = Frame::new_filled(5, 3, [10, 20, 30]);
        let bytes = encode_image(&frame, ImageFormat::Png, 90).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (5, 3));
        assert_eq!(decoded.get_pixel(4, 2).0, [10, 20, 30]);
    }

    #[test]
    fn test_jpeg_encoding_produces_jfif() {
        let frame = Frame::new_filled(8, 8, [200, 100, 50]);
        let bytes = encode_image(&frame, ImageFormat::Jpeg, 95).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_dry_run_rejects_unavailable_codec() {
        let backend = DryRunEncoder::new().without(VideoCodec::Xvid);
        let spec = WriterSpec {
            path: PathBuf::from("out.avi"),
            codec: VideoCodec::Xvid,
            fps: 30.0,
            width: 4,
            height: 4,
        };
        assert!(!backend.is_available(VideoCodec::Xvid));
        assert!(backend.open(&spec).is_err());
        assert!(backend.records().is_empty());
    }

    #[test]
    fn test_dry_run_checks_frame_dimensions() {
        let backend = DryRunEncoder::new();
        let spec = WriterSpec {
            path: PathBuf::from("out.mp4"),
            codec: VideoCodec::H264,
            fps: 30.0,
            width: 4,
            height: 4,
        };
        let mut writer = backend.open(&spec).unwrap();
        writer.write(&Frame::new_black(4, 4)).unwrap();
        assert!(writer.write(&Frame::new_black(2, 2)).is_err());
        writer.close().unwrap();

        let records = backend.records();
        assert_eq!(records[0].frame_dims, vec![(4, 4)]);
        assert!(records[0].closed);
    }

    #[test]
    fn test_platform_default_has_encoder_name() {
        assert!(!VideoCodec::platform_default().ffmpeg_encoder().is_empty());
        assert_eq!(ImageFormat::from_extension("JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("mp4"), None);
    }
}
