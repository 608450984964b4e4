use serde::{Deserialize, Serialize};

use crate::error::{FrameError, Result, VideoEditError};

/// Crop rectangle in source-pixel coordinates, `(x1, y1)` inclusive and
/// `(x2, y2)` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCropRect")]
pub struct CropRect {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl CropRect {
    /// Requires `x1 < x2` and `y1 < y2`
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(FrameError::InvalidRegion {
                x1,
                y1,
                x2,
                y2,
                width: x2.saturating_sub(x1),
                height: y2.saturating_sub(y1),
            }
            .into());
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// The whole of a `width x height` frame
    pub fn full(width: u32, height: u32) -> Result<Self> {
        Self::new(0, 0, width, height)
    }

    pub fn x1(&self) -> u32 {
        self.x1
    }

    pub fn y1(&self) -> u32 {
        self.y1
    }

    pub fn x2(&self) -> u32 {
        self.x2
    }

    pub fn y2(&self) -> u32 {
        self.y2
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Whether the rectangle lies inside a `width x height` frame
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x2 <= width && self.y2 <= height
    }

    /// Clamp the rectangle into a `width x height` frame
    ///
    /// Returns `None` when nothing of the rectangle is left inside the frame.
    pub fn clamped_to(&self, width: u32, height: u32) -> Option<Self> {
        let x2 = self.x2.min(width);
        let y2 = self.y2.min(height);
        Self::new(self.x1.min(x2), self.y1.min(y2), x2, y2).ok()
    }
}

impl std::str::FromStr for CropRect {
    type Err = String;

    /// Parses `x1,y1,x2,y2`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values: Vec<u32> = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| format!("invalid crop '{}': {}", s, e))?;

        match values.as_slice() {
            [x1, y1, x2, y2] => Self::new(*x1, *y1, *x2, *y2).map_err(|e| e.to_string()),
            _ => Err(format!("crop needs 4 values x1,y1,x2,y2, got '{}'", s)),
        }
    }
}

/// Output dimensions for resizing, both non-zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawResizeTarget")]
pub struct ResizeTarget {
    width: u32,
    height: u32,
}

impl ResizeTarget {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions { width, height }.into());
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl std::str::FromStr for ResizeTarget {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(|c| c == 'x' || c == 'X')
            .ok_or_else(|| format!("resize must look like 1280x720, got '{}'", s))?;
        let width = w.trim().parse().map_err(|e| format!("invalid width '{}': {}", w, e))?;
        let height = h.trim().parse().map_err(|e| format!("invalid height '{}': {}", h, e))?;
        Self::new(width, height).map_err(|e| e.to_string())
    }
}

// Unchecked wire forms; deserialization goes through `new`

#[derive(Deserialize)]
struct RawCropRect {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl TryFrom<RawCropRect> for CropRect {
    type Error = VideoEditError;

    fn try_from(raw: RawCropRect) -> Result<Self> {
        Self::new(raw.x1, raw.y1, raw.x2, raw.y2)
    }
}

#[derive(Deserialize)]
struct RawResizeTarget {
    width: u32,
    height: u32,
}

impl TryFrom<RawResizeTarget> for ResizeTarget {
    type Error = VideoEditError;

    fn try_from(raw: RawResizeTarget) -> Result<Self> {
        Self::new(raw.width, raw.height)
    }
}

/// Editing parameters applied on export
///
/// Owned by the editing session and replaced wholesale by confirm/cancel
/// operations; see [`SegmentSelector`](crate::edit::SegmentSelector).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditState {
    pub(crate) segment_begin: usize,
    pub(crate) segment_end: usize,
    pub(crate) crop_rect: Option<CropRect>,
    pub(crate) resize_target: Option<ResizeTarget>,
    pub(crate) playback_speed: f64,
}

impl EditState {
    /// Whole-video segment, no crop, no resize, normal speed
    pub fn new(total_frames: usize) -> Self {
        Self {
            segment_begin: 0,
            segment_end: total_frames,
            crop_rect: None,
            resize_target: None,
            playback_speed: 1.0,
        }
    }

    pub fn segment_begin(&self) -> usize {
        self.segment_begin
    }

    pub fn segment_end(&self) -> usize {
        self.segment_end
    }

    /// Number of frames in `[segment_begin, segment_end)`
    pub fn segment_len(&self) -> usize {
        self.segment_end.saturating_sub(self.segment_begin)
    }

    pub fn crop_rect(&self) -> Option<CropRect> {
        self.crop_rect
    }

    pub fn resize_target(&self) -> Option<ResizeTarget> {
        self.resize_target
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    pub fn with_crop(mut self, crop: Option<CropRect>) -> Self {
        self.crop_rect = crop;
        self
    }

    pub fn with_resize(mut self, resize: Option<ResizeTarget>) -> Self {
        self.resize_target = resize;
        self
    }

    /// Non-positive or non-finite speeds are ignored
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            self.playback_speed = speed;
        }
        self
    }

    /// Output dimensions for a source of `width x height` after crop and resize
    pub fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match (self.resize_target, self.crop_rect) {
            (Some(resize), _) => (resize.width(), resize.height()),
            (None, Some(crop)) => (crop.width(), crop.height()),
            (None, None) => (width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_rect_requires_positive_area() {
        assert!(CropRect::new(0, 0, 10, 10).is_ok());
        assert!(CropRect::new(10, 0, 10, 10).is_err());
        assert!(CropRect::new(0, 5, 10, 4).is_err());
    }

    #[test]
    fn test_crop_rect_clamping() {
        let rect = CropRect::new(10, 10, 200, 150).unwrap();
        let clamped = rect.clamped_to(100, 100).unwrap();
        assert_eq!(clamped, CropRect::new(10, 10, 100, 100).unwrap());

        let outside = CropRect::new(120, 120, 200, 200).unwrap();
        assert!(outside.clamped_to(100, 100).is_none());
    }

    #[test]
    fn test_parse_crop_and_resize() {
        let crop: CropRect = "1, 2, 30,40".parse().unwrap();
        assert_eq!((crop.width(), crop.height()), (29, 38));
        assert!("1,2,3".parse::<CropRect>().is_err());

        let resize: ResizeTarget = "1280x720".parse().unwrap();
        assert_eq!((resize.width(), resize.height()), (1280, 720));
        assert!("0x720".parse::<ResizeTarget>().is_err());
        assert!("1280".parse::<ResizeTarget>().is_err());
    }

    #[test]
    fn test_output_dimensions() {
        let state = EditState::new(10);
        assert_eq!(state.output_dimensions(640, 480), (640, 480));

        let state = state.with_crop(Some(CropRect::new(0, 0, 100, 50).unwrap()));
        assert_eq!(state.output_dimensions(640, 480), (100, 50));

        let state = state.with_resize(Some(ResizeTarget::new(32, 16).unwrap()));
        assert_eq!(state.output_dimensions(640, 480), (32, 16));
    }

    #[test]
    fn test_speed_must_be_positive() {
        let state = EditState::new(10).with_speed(0.0).with_speed(f64::NAN);
        assert_eq!(state.playback_speed(), 1.0);
        assert_eq!(state.with_speed(2.5).playback_speed(), 2.5);
    }

    #[test]
    fn test_deserialize_validates_geometry() {
        let crop: CropRect = toml::from_str("x1 = 2\ny1 = 0\nx2 = 8\ny2 = 4").unwrap();
        assert_eq!(crop.width(), 6);
        assert!(toml::from_str::<CropRect>("x1 = 8\ny1 = 0\nx2 = 2\ny2 = 4").is_err());
        assert!(toml::from_str::<ResizeTarget>("width = 0\nheight = 10").is_err());

        let text = "segment_begin = 10\nsegment_end = 50\nplayback_speed = 2.0\n\n\
                    [crop_rect]\nx1 = 2\ny1 = 0\nx2 = 8\ny2 = 4\n";
        let state: EditState = toml::from_str(text).unwrap();
        assert_eq!(state.segment_len(), 40);
        assert_eq!(state.crop_rect(), Some(crop));
        assert_eq!(state.resize_target(), None);

        let bad = text.replace("x1 = 2", "x1 = 9");
        assert!(toml::from_str::<EditState>(&bad).is_err());
    }
}
