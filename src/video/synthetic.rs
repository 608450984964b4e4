use tracing::debug;

use crate::error::{Result, SourceError};
use crate::video::source::VideoSource;
use crate::video::types::{Frame, VideoMetadata};

/// Deterministic in-memory video source
///
/// Every frame is a function of its index, so anything written by an export
/// can be compared against [`SyntheticSource::frame_at`]. Used by the tests,
/// the demo binary and `vidcut export --synthetic`.
pub struct SyntheticSource {
    metadata: VideoMetadata,
    position: usize,
    fail_at: Option<usize>,
}

impl SyntheticSource {
    pub fn new(frame_count: usize, fps: f64, width: u32, height: u32) -> Self {
        Self {
            metadata: VideoMetadata {
                frame_count,
                fps,
                width,
                height,
                codec: "synthetic".to_string(),
            },
            position: 0,
            fail_at: None,
        }
    }

    /// Make decoding fail when the stream reaches `index`
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// The frame this source produces at `index`
    pub fn frame_at(index: usize, width: u32, height: u32) -> Frame {
        let hue = ((index as f32) * 12.0) % 360.0;
        let mut frame = Frame::new_filled(width, height, hsv_to_rgb(hue, 0.6, 0.8));

        // Moving diagonal stripes so neighbouring frames differ spatially too
        for y in 0..height {
            for x in 0..width {
                if (x as usize + y as usize + index) % 20 < 2 {
                    frame.set_pixel(x, y, [255, 255, 255]);
                }
            }
        }
        frame
    }
}

impl VideoSource for SyntheticSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if index > self.metadata.frame_count {
            return Err(SourceError::Seek {
                index,
                reason: format!("source has only {} frames", self.metadata.frame_count),
            }
            .into());
        }
        debug!("Synthetic source seek to {}", index);
        self.position = index;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.position) {
            return Err(SourceError::Decode {
                index: self.position,
                reason: "injected decode failure".to_string(),
            }
            .into());
        }
        if self.position >= self.metadata.frame_count {
            return Ok(None);
        }

        let frame = Self::frame_at(self.position, self.metadata.width, self.metadata.height);
        self.position += 1;
        Ok(Some(frame))
    }

    fn position(&self) -> usize {
        self.position
    }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}
