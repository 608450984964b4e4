use std::str::FromStr;

use tracing::debug;

use crate::edit::state::EditState;
use crate::error::{ExportError, Result, SegmentError};
use crate::video::encoder::{ImageFormat, VideoCodec};

/// Output format as the user picks it: `.jpg`/`.png` snapshot, `*.jpg`/`*.png`
/// frame sequence, or a video container extension such as `.mp4`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Image(ImageFormat),
    ImageSequence(ImageFormat),
    Video { extension: String },
}

impl FromStr for OutputFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let unsupported = || ExportError::UnsupportedFormat {
            format: s.to_string(),
        };

        let trimmed = s.trim();
        let (sequence, ext) = match trimmed.strip_prefix("*.") {
            Some(ext) => (true, ext),
            None => (false, trimmed.strip_prefix('.').unwrap_or(trimmed)),
        };

        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(unsupported());
        }

        match (ImageFormat::from_extension(ext), sequence) {
            (Some(format), false) => Ok(Self::Image(format)),
            (Some(format), true) => Ok(Self::ImageSequence(format)),
            (None, false) => Ok(Self::Video {
                extension: ext.to_lowercase(),
            }),
            (None, true) => Err(unsupported()),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image(format) => write!(f, ".{}", format.extension()),
            Self::ImageSequence(format) => write!(f, "*.{}", format.extension()),
            Self::Video { extension } => write!(f, ".{}", extension),
        }
    }
}

/// What an export run does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportMode {
    /// Only the currently displayed frame, as one image file
    SingleImage { format: ImageFormat },
    /// Every frame of the segment, one image file each
    ImageSequence { format: ImageFormat },
    /// The segment encoded into one video file
    EncodedVideo { extension: String, codec: VideoCodec },
}

impl ExportMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleImage { .. } => "frame snapshot",
            Self::ImageSequence { .. } => "image sequence",
            Self::EncodedVideo { .. } => "video",
        }
    }
}

/// Chooses the export mode and video codec for an output format
#[derive(Debug, Clone, Default)]
pub struct ExportPlanner {
    codec_override: Option<VideoCodec>,
}

impl ExportPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always encode video with `codec` instead of the platform default
    pub fn with_codec(codec: Option<VideoCodec>) -> Self {
        Self {
            codec_override: codec,
        }
    }

    /// The codec encoded-video exports will request
    pub fn codec(&self) -> VideoCodec {
        self.codec_override.unwrap_or_else(VideoCodec::platform_default)
    }

    pub fn plan(&self, format: &OutputFormat, state: &EditState) -> Result<ExportMode> {
        let mode = match format {
            OutputFormat::Image(format) => ExportMode::SingleImage { format: *format },
            OutputFormat::ImageSequence(format) => {
                Self::require_segment(state)?;
                ExportMode::ImageSequence { format: *format }
            }
            OutputFormat::Video { extension } => {
                Self::require_segment(state)?;
                ExportMode::EncodedVideo {
                    extension: extension.clone(),
                    codec: self.codec(),
                }
            }
        };

        debug!("Planned {} export for format {}", mode.label(), format);
        Ok(mode)
    }

    fn require_segment(state: &EditState) -> Result<()> {
        if state.segment_len() == 0 {
            return Err(SegmentError::Empty {
                begin: state.segment_begin(),
                end: state.segment_end(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_formats() {
        assert_eq!(".jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Image(ImageFormat::Jpeg));
        assert_eq!(".PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Image(ImageFormat::Png));
        assert_eq!(
            "*.png".parse::<OutputFormat>().unwrap(),
            OutputFormat::ImageSequence(ImageFormat::Png)
        );
        assert_eq!(
            ".mp4".parse::<OutputFormat>().unwrap(),
            OutputFormat::Video { extension: "mp4".to_string() }
        );
        assert_eq!(
            "AVI".parse::<OutputFormat>().unwrap(),
            OutputFormat::Video { extension: "avi".to_string() }
        );
        assert!("*.mp4".parse::<OutputFormat>().is_err());
        assert!(".".parse::<OutputFormat>().is_err());
        assert!(".m p4".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_display_round_trips_user_text() {
        for text in [".jpg", "*.png", ".mkv"] {
            assert_eq!(text.parse::<OutputFormat>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_plan_selects_modes() {
        let planner = ExportPlanner::with_codec(Some(VideoCodec::H264));
        let state = EditState::new(100);

        assert_eq!(
            planner.plan(&".png".parse().unwrap(), &state).unwrap(),
            ExportMode::SingleImage { format: ImageFormat::Png }
        );
        assert_eq!(
            planner.plan(&"*.jpg".parse().unwrap(), &state).unwrap(),
            ExportMode::ImageSequence { format: ImageFormat::Jpeg }
        );
        assert_eq!(
            planner.plan(&".mp4".parse().unwrap(), &state).unwrap(),
            ExportMode::EncodedVideo {
                extension: "mp4".to_string(),
                codec: VideoCodec::H264
            }
        );
    }

    #[test]
    fn test_default_codec_is_platform_specific() {
        assert_eq!(ExportPlanner::new().codec(), VideoCodec::platform_default());
    }

    #[test]
    fn test_empty_segment_rejected_for_range_modes() {
        let planner = ExportPlanner::new();
        let empty = EditState::new(0);
        let err = planner.plan(&".mp4".parse().unwrap(), &empty).unwrap_err();
        assert!(matches!(
            err,
            crate::error::VideoEditError::Segment(SegmentError::Empty { begin: 0, end: 0 })
        ));
        assert!(err.to_string().contains("[0, 0)"));
        assert!(planner.plan(&"*.png".parse().unwrap(), &empty).is_err());
        assert!(planner.plan(&".png".parse().unwrap(), &empty).is_ok());
    }
}
