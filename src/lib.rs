//! # vidcut
//!
//! Cut, crop, resize and re-time video files, then export the result as an
//! encoded video, a single snapshot, or a numbered image sequence.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use vidcut::{
//!     config::Config,
//!     edit::EditingSession,
//!     export::ExportProgress,
//!     video::{FfmpegEncoder, FfmpegOpener},
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let opener = FfmpegOpener::new(&config.export.ffmpeg_path, &config.export.ffprobe_path);
//! let encoder = FfmpegEncoder::new(&config.export.ffmpeg_path);
//!
//! let mut session = EditingSession::new(&config);
//! session.load_video(Path::new("holiday.mp4"), &opener)?;
//! session.confirm_segment(120, 480)?;
//! session.confirm_resize(640, 360)?;
//!
//! let summary = session.export(&".mp4".parse()?, &encoder, &mut |p: ExportProgress| {
//!     println!("{:.0}%", p.percent());
//! })?;
//! println!("wrote {:?}", summary.outputs);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frames, the decoder/encoder traits and their ffmpeg backends
//! - [`edit`] - Edit state, segment selection, crop/resize, playback
//! - [`export`] - Export planning, execution and background workers
//! - [`config`] - Configuration management

pub mod config;
pub mod edit;
pub mod error;
pub mod export;
pub mod logging;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    edit::{EditState, EditingSession},
    error::{Result, VideoEditError},
    export::{ExportExecutor, ExportWorker, OutputFormat},
};
