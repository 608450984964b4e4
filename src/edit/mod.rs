//! # Editing
//!
//! The edit state (segment, crop, resize, speed), the components that
//! validate changes to it, the per-frame transformer, and the
//! [`EditingSession`] that ties them to an open video.

pub mod crop;
pub mod playback;
pub mod segment;
pub mod session;
pub mod state;
pub mod transform;

pub use crop::{CropEditor, Corner};
pub use playback::{speed_from_slider, slider_from_speed, PlaybackClock, SpeedPolicy, Tick};
pub use segment::SegmentSelector;
pub use session::EditingSession;
pub use state::{CropRect, EditState, ResizeTarget};
pub use transform::FrameTransformer;
