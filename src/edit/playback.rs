use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Slider positions map onto speeds logarithmically: 0 -> 0.1x, 50 -> 1x,
/// 100 -> 10x
pub const SPEED_SLIDER_MAX: u32 = 100;

/// Speed selected by a slider position, rounded to one decimal
pub fn speed_from_slider(value: u32) -> f64 {
    let value = value.min(SPEED_SLIDER_MAX) as f64;
    let speed = 0.1 * 10f64.powf(value / 50.0);
    (speed * 10.0).round() / 10.0
}

/// Slider position closest to `speed`
pub fn slider_from_speed(speed: f64) -> u32 {
    if !(speed.is_finite() && speed > 0.0) {
        return SPEED_SLIDER_MAX / 2;
    }
    let value = 50.0 * (speed / 0.1).log10();
    value.round().clamp(0.0, SPEED_SLIDER_MAX as f64) as u32
}

/// Whether playback speed changes the frame rate declared for exported video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedPolicy {
    /// Speed only affects live preview; exports keep the source frame rate
    #[default]
    PreviewOnly,
    /// Exported video is declared at `source_fps * speed`
    ScaleExportRate,
}

impl SpeedPolicy {
    pub fn export_fps(self, source_fps: f64, speed: f64) -> f64 {
        match self {
            Self::PreviewOnly => source_fps,
            Self::ScaleExportRate => source_fps * speed,
        }
    }
}

/// What the preview should do on a timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not playing
    Idle,
    /// Display frame `index`; `rewound` is set when this was the last frame of
    /// the segment and playback paused back at its start
    Show { index: usize, rewound: bool },
}

/// Preview playback position and timing within the selected segment
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    source_fps: f64,
    speed: f64,
    begin: usize,
    end: usize,
    position: usize,
    playing: bool,
}

impl PlaybackClock {
    pub fn new(source_fps: f64, total_frames: usize) -> Self {
        Self {
            source_fps,
            speed: 1.0,
            begin: 0,
            end: total_frames,
            position: 0,
            playing: false,
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }

    /// Source frame rate scaled by the playback speed
    pub fn effective_fps(&self) -> f64 {
        self.source_fps * self.speed
    }

    /// Timer period between displayed frames, whole milliseconds
    pub fn frame_interval(&self) -> Duration {
        let fps = self.effective_fps();
        if fps <= 0.0 {
            return Duration::from_millis(1000);
        }
        Duration::from_millis(((1000.0 / fps) as u64).max(1))
    }

    /// Restrict playback to `[begin, end)` and jump to `begin`
    pub fn set_segment(&mut self, begin: usize, end: usize) {
        self.begin = begin;
        self.end = end.max(begin + 1);
        self.position = begin;
    }

    pub fn segment(&self) -> (usize, usize) {
        (self.begin, self.end)
    }

    /// Index of the next frame to display
    pub fn position(&self) -> usize {
        self.position
    }

    /// Jump to `index`, clamped into the segment
    ///
    /// With no frames loaded the position stays at the segment start.
    pub fn seek(&mut self, index: usize) -> usize {
        let last = self.end.saturating_sub(1).max(self.begin);
        self.position = index.clamp(self.begin, last);
        self.position
    }

    fn is_empty(&self) -> bool {
        self.end <= self.begin
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    pub fn tick(&mut self) -> Tick {
        if !self.playing {
            return Tick::Idle;
        }
        if self.is_empty() {
            self.playing = false;
            return Tick::Idle;
        }

        let index = self.position;
        self.position += 1;
        let rewound = self.position >= self.end;
        if rewound {
            self.playing = false;
            self.position = self.begin;
        }
        Tick::Show { index, rewound }
    }

    /// Seconds into the video of the next displayed frame, at source rate
    pub fn current_time(&self) -> f64 {
        if self.source_fps > 0.0 {
            self.position as f64 / self.source_fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slider_mapping() {
        assert_eq!(speed_from_slider(0), 0.1);
        assert_eq!(speed_from_slider(50), 1.0);
        assert_eq!(speed_from_slider(100), 10.0);
        assert_eq!(speed_from_slider(65), 2.0);
        assert_eq!(speed_from_slider(500), 10.0);

        assert_eq!(slider_from_speed(1.0), 50);
        assert_eq!(slider_from_speed(10.0), 100);
        assert_eq!(slider_from_speed(0.01), 0);
        assert_eq!(slider_from_speed(-1.0), 50);
    }

    #[test]
    fn test_speed_policy() {
        assert_eq!(SpeedPolicy::PreviewOnly.export_fps(30.0, 2.0), 30.0);
        assert_eq!(SpeedPolicy::ScaleExportRate.export_fps(30.0, 2.0), 60.0);
        assert_eq!(SpeedPolicy::default(), SpeedPolicy::PreviewOnly);
    }

    #[test]
    fn test_frame_interval_follows_speed() {
        let mut clock = PlaybackClock::new(25.0, 100);
        assert_eq!(clock.frame_interval(), Duration::from_millis(40));
        clock.set_speed(2.0);
        assert_eq!(clock.frame_interval(), Duration::from_millis(20));
        clock.set_speed(0.0);
        assert_eq!(clock.speed(), 2.0);
    }

    #[test]
    fn test_playback_rewinds_at_segment_end() {
        let mut clock = PlaybackClock::new(30.0, 100);
        clock.set_segment(10, 13);
        assert_eq!(clock.tick(), Tick::Idle);

        clock.play();
        assert_eq!(clock.tick(), Tick::Show { index: 10, rewound: false });
        assert_eq!(clock.tick(), Tick::Show { index: 11, rewound: false });
        assert_eq!(clock.tick(), Tick::Show { index: 12, rewound: true });
        assert!(!clock.is_playing());
        assert_eq!(clock.position(), 10);
    }

    #[test]
    fn test_seek_clamps_into_segment() {
        let mut clock = PlaybackClock::new(30.0, 100);
        clock.set_segment(20, 50);
        assert_eq!(clock.seek(5), 20);
        assert_eq!(clock.seek(70), 49);
        assert_eq!(clock.seek(30), 30);
        assert_eq!(clock.current_time(), 1.0);
    }

    #[test]
    fn test_empty_clock_seek_and_tick() {
        let mut clock = PlaybackClock::new(0.0, 0);
        assert_eq!(clock.seek(5), 0);
        assert_eq!(clock.position(), 0);

        clock.play();
        assert_eq!(clock.tick(), Tick::Idle);
        assert!(!clock.is_playing());
        assert_eq!(clock.current_time(), 0.0);
    }
}
