//! # Export
//!
//! Turns the current edit state into files: a single snapshot image, a
//! numbered image sequence, or one encoded video per segment. All outputs go
//! to a `<input>_frames/` directory next to the source.

pub mod executor;
pub mod job;
pub mod naming;
pub mod planner;
pub mod sink;
pub mod worker;

pub use executor::{CancelFlag, ExportExecutor, ExportProgress, ExportState, ExportSummary};
pub use job::ExportJob;
pub use planner::{ExportMode, ExportPlanner, OutputFormat};
pub use sink::{FrameSink, ImageFileSink, VideoSink};
pub use worker::{ExportTask, ExportWorker};
