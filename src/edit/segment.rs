use tracing::debug;

use crate::edit::state::EditState;
use crate::error::{Result, SegmentError};

/// Validates and stores the `[begin, end)` frame range to export
///
/// `confirm` never corrects a bad pair; shells that want the interactive
/// clamping behavior call [`clamp_begin`](Self::clamp_begin) /
/// [`clamp_end`](Self::clamp_end) before confirming.
#[derive(Debug, Clone, Default)]
pub struct SegmentSelector {
    total_frames: usize,
    begin: usize,
    end: usize,
}

impl SegmentSelector {
    pub fn new(total_frames: usize) -> Self {
        let mut selector = Self::default();
        selector.set_range(total_frames);
        selector
    }

    /// Reset to the full video, returning `(0, total_frames)`
    pub fn set_range(&mut self, total_frames: usize) -> (usize, usize) {
        self.total_frames = total_frames;
        self.begin = 0;
        self.end = total_frames;
        (self.begin, self.end)
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// The last confirmed (or reset) range
    pub fn range(&self) -> (usize, usize) {
        (self.begin, self.end)
    }

    /// Validate `0 <= begin < end <= total_frames` and return `base` with
    /// those bounds
    pub fn confirm(&mut self, base: &EditState, begin: usize, end: usize) -> Result<EditState> {
        if begin >= end || end > self.total_frames {
            return Err(SegmentError::InvalidRange {
                begin,
                end,
                total: self.total_frames,
            }
            .into());
        }

        debug!("Segment confirmed: [{}, {})", begin, end);
        self.begin = begin;
        self.end = end;

        let mut state = base.clone();
        state.segment_begin = begin;
        state.segment_end = end;
        Ok(state)
    }

    /// Drop the selection: `base` with the full-video range
    pub fn cancel(&mut self, base: &EditState) -> EditState {
        self.set_range(self.total_frames);

        let mut state = base.clone();
        state.segment_begin = 0;
        state.segment_end = self.total_frames;
        state
    }

    /// Interactive clamp for a begin value: kept strictly below `end`
    pub fn clamp_begin(&self, value: usize, end: usize) -> usize {
        value.min(end.saturating_sub(1))
    }

    /// Interactive clamp for an end value: kept strictly above `begin` and at
    /// most `total_frames`
    pub fn clamp_end(&self, value: usize, begin: usize) -> usize {
        value.max(begin + 1).min(self.total_frames)
    }
}
