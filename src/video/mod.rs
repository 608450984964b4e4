//! # Video I/O
//!
//! Frame buffers plus the decoder and encoder collaborators the editing
//! pipeline talks to: the [`VideoSource`] / [`EncoderBackend`] traits, the
//! ffmpeg-process implementations, and a synthetic source for tests and demos.

pub mod encoder;
pub mod ffmpeg;
pub mod source;
pub mod synthetic;
pub mod types;

pub use encoder::{
    encode_image, DryRunEncoder, DryRunRecord, EncoderBackend, ImageFormat, VideoCodec,
    VideoWriter, WriterSpec,
};
pub use ffmpeg::{FfmpegEncoder, FfmpegOpener, FfmpegSource};
pub use source::{SourceHandle, SourceOpener, VideoSource};
pub use synthetic::SyntheticSource;
pub use types::{Frame, VideoMetadata};
