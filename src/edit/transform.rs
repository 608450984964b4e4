use image::imageops::{self, FilterType};

use crate::edit::state::{CropRect, EditState, ResizeTarget};
use crate::error::{FrameError, Result};
use crate::video::types::Frame;

/// Applies crop then resize to a single frame
///
/// Out-of-bounds crop rectangles are rejected with `InvalidRegion`, never
/// clamped here. Clamping belongs to the editing side
/// ([`CropEditor`](crate::edit::CropEditor), [`CropRect::clamped_to`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTransformer;

impl FrameTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Crop to `crop` (if any), then scale to `resize` (if any) with linear
    /// interpolation
    pub fn transform(
        &self,
        frame: Frame,
        crop: Option<CropRect>,
        resize: Option<ResizeTarget>,
    ) -> Result<Frame> {
        let frame = match crop {
            Some(rect) => self.crop(frame, rect)?,
            None => frame,
        };

        match resize {
            Some(target) => Ok(self.resize(frame, target)),
            None => Ok(frame),
        }
    }

    /// Transform with the crop and resize of an edit state
    pub fn apply(&self, frame: Frame, state: &EditState) -> Result<Frame> {
        self.transform(frame, state.crop_rect(), state.resize_target())
    }

    fn crop(&self, frame: Frame, rect: CropRect) -> Result<Frame> {
        let (width, height) = frame.dimensions();
        if !rect.fits_within(width, height) {
            return Err(FrameError::InvalidRegion {
                x1: rect.x1(),
                y1: rect.y1(),
                x2: rect.x2(),
                y2: rect.y2(),
                width,
                height,
            }
            .into());
        }

        if (rect.x1(), rect.y1(), rect.x2(), rect.y2()) == (0, 0, width, height) {
            return Ok(frame);
        }

        let cropped = imageops::crop_imm(
            frame.as_image(),
            rect.x1(),
            rect.y1(),
            rect.width(),
            rect.height(),
        )
        .to_image();
        Ok(Frame::new(cropped))
    }

    fn resize(&self, frame: Frame, target: ResizeTarget) -> Frame {
        if frame.dimensions() == (target.width(), target.height()) {
            return frame;
        }

        // Triangle is image's bilinear filter
        let resized = imageops::resize(
            frame.as_image(),
            target.width(),
            target.height(),
            FilterType::Triangle,
        );
        Frame::new(resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VideoEditError;
    use crate::video::synthetic::SyntheticSource;

    fn rect(x1: u32, y1: u32, x2: u32, y2: u32) -> CropRect {
        CropRect::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_crop_only_dimensions() {
        let frame = SyntheticSource::frame_at(3, 64, 48);
        let out = FrameTransformer::new()
            .transform(frame, Some(rect(10, 5, 50, 45)), None)
            .unwrap();
        assert_eq!(out.dimensions(), (40, 40));
    }

    #[test]
    fn test_crop_keeps_source_pixels() {
        let frame = SyntheticSource::frame_at(7, 32, 32);
        let out = FrameTransformer::new()
            .transform(frame.clone(), Some(rect(4, 6, 20, 30)), None)
            .unwrap();
        for y in 0..out.height() {
            for x in 0..out.width() {
                assert_eq!(out.get_pixel(x, y), frame.get_pixel(x + 4, y + 6));
            }
        }
    }

    #[test]
    fn test_crop_and_resize_yields_target_dimensions() {
        let transformer = FrameTransformer::new();
        for (w, h) in [(64, 48), (33, 17), (200, 100)] {
            let frame = SyntheticSource::frame_at(1, w, h);
            let out = transformer
                .transform(
                    frame,
                    Some(rect(1, 1, w / 2 + 2, h / 2 + 2)),
                    Some(ResizeTarget::new(25, 13).unwrap()),
                )
                .unwrap();
            assert_eq!(out.dimensions(), (25, 13));
        }
    }

    #[test]
    fn test_resize_only() {
        let frame = Frame::new_filled(40, 30, [9, 9, 9]);
        let out = FrameTransformer::new()
            .transform(frame, None, Some(ResizeTarget::new(80, 10).unwrap()))
            .unwrap();
        assert_eq!(out.dimensions(), (80, 10));
        assert_eq!(out.get_pixel(79, 9), [9, 9, 9]);
    }

    #[test]
    fn test_no_parameters_is_identity() {
        let frame = SyntheticSource::frame_at(2, 16, 16);
        let out = FrameTransformer::new().transform(frame.clone(), None, None).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_transform_is_idempotent_on_its_own_output() {
        let transformer = FrameTransformer::new();
        let crop = rect(0, 0, 20, 10);
        let resize = ResizeTarget::new(20, 10).unwrap();

        let once = transformer
            .transform(SyntheticSource::frame_at(5, 40, 30), Some(crop), Some(resize))
            .unwrap();
        let twice = transformer.transform(once.clone(), Some(crop), Some(resize)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_full_frame_crop_returns_same_frame() {
        let frame = SyntheticSource::frame_at(9, 40, 30);
        let out = FrameTransformer::new()
            .transform(frame.clone(), Some(rect(0, 0, 40, 30)), None)
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_out_of_bounds_crop_rejected() {
        let frame = Frame::new_black(40, 30);
        let err = FrameTransformer::new()
            .transform(frame, Some(rect(10, 10, 41, 20)), None)
            .unwrap_err();
        assert!(matches!(
            err,
            VideoEditError::Frame(FrameError::InvalidRegion { width: 40, height: 30, .. })
        ));
    }
}
