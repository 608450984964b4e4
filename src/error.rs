use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the vidcut library
#[derive(Error, Debug)]
pub enum VideoEditError {
    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("Frame processing error: {0}")]
    Frame(#[from] FrameError),

    #[error("Video source error: {0}")]
    Source(#[from] SourceError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Segment selection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Invalid segment range [{begin}, {end}) for a {total}-frame video")]
    InvalidRange { begin: usize, end: usize, total: usize },

    #[error("Segment [{begin}, {end}) contains no frames")]
    Empty { begin: usize, end: usize },
}

/// Frame transformation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid crop region ({x1}, {y1})-({x2}, {y2}) for a {width}x{height} frame")]
    InvalidRegion {
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        width: u32,
        height: u32,
    },

    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Errors raised by the video source (decoder side)
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to open video file: {path}")]
    OpenFailed { path: String },

    #[error("Unsupported video format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Seek to frame {index} failed: {reason}")]
    Seek { index: usize, reason: String },

    #[error("Decoding frame {index} failed: {reason}")]
    Decode { index: usize, reason: String },

    #[error("No video loaded")]
    NotLoaded,
}

/// Errors raised by the export pipeline (sink side)
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("An export is already running")]
    Busy,

    #[error("Video encoding failed: {reason}")]
    Encode { reason: String },

    #[error("Encoder for codec '{codec}' is not available")]
    EncoderUnavailable { codec: String },

    #[error("Writing {path} failed: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    #[error("No frame is currently displayed")]
    NoCurrentFrame,

    #[error("Export cancelled after {frames_written} frames")]
    Cancelled { frames_written: usize },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using VideoEditError
pub type Result<T> = std::result::Result<T, VideoEditError>;

impl VideoEditError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether the same operation might succeed if the user tries again
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Export(ExportError::Busy) => true,
            Self::Export(ExportError::Io { .. }) => true,
            Self::Export(ExportError::Cancelled { .. }) => true,
            Self::Source(SourceError::OpenFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Source(SourceError::OpenFailed { path }) => {
                format!("Could not open video file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Source(SourceError::UnsupportedFormat { format }) => {
                format!("Unsupported file format '{}'. Supported inputs: mp4, avi, mov", format)
            }
            Self::Source(SourceError::NotLoaded) => "Please load a video first!".to_string(),
            Self::Export(ExportError::Busy) => {
                "A video processing task is in progress, please wait!".to_string()
            }
            Self::Export(ExportError::EncoderUnavailable { codec }) => {
                format!("Save failed: no encoder for '{}' is installed on this system.", codec)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => format!("Save failed: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_message_names_the_conflict() {
        let err: VideoEditError = ExportError::Busy.into();
        assert!(err.user_message().contains("in progress"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_error_is_permanent() {
        let err: VideoEditError = SourceError::Decode {
            index: 12,
            reason: "eof".to_string(),
        }
        .into();
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("frame 12"));
    }
}
