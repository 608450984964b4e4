use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    edit::playback::SpeedPolicy,
    error::{ConfigError, Result},
    video::encoder::VideoCodec,
};

/// Main configuration for vidcut
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Export pipeline settings
    pub export: ExportConfig,

    /// Loading and preview settings
    pub preview: PreviewConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.export.validate()?;
        self.preview.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Export pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Whether playback speed changes the exported video's frame rate
    pub speed_policy: SpeedPolicy,

    /// Codec for encoded video; the platform default when unset
    pub codec: Option<VideoCodec>,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// ffmpeg executable used for decoding and encoding
    pub ffmpeg_path: PathBuf,

    /// ffprobe executable used for metadata
    pub ffprobe_path: PathBuf,

    /// Delete files left behind by a failed export
    pub discard_partial_output: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            speed_policy: SpeedPolicy::default(),
            codec: None,
            jpeg_quality: 95,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            discard_partial_output: false,
        }
    }
}

impl ExportConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                key: "export.jpeg_quality".to_string(),
                value: self.jpeg_quality.to_string()
            }.into());
        }

        for (key, path) in [("export.ffmpeg_path", &self.ffmpeg_path), ("export.ffprobe_path", &self.ffprobe_path)] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: String::new()
                }.into());
            }
        }

        Ok(())
    }
}

/// Loading and preview configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Slowest selectable playback speed
    pub min_speed: f64,

    /// Fastest selectable playback speed
    pub max_speed: f64,

    /// File extensions accepted on load, without the dot
    pub input_extensions: Vec<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            min_speed: 0.1,
            max_speed: 10.0,
            input_extensions: vec!["mp4".to_string(), "avi".to_string(), "mov".to_string()],
        }
    }
}

impl PreviewConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min_speed > 0.0 && self.min_speed < self.max_speed) {
            return Err(ConfigError::InvalidValue {
                key: "preview.speed_range".to_string(),
                value: format!("{}-{}", self.min_speed, self.max_speed)
            }.into());
        }

        if self.input_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "preview.input_extensions".to_string(),
                value: "[]".to_string()
            }.into());
        }

        Ok(())
    }

    /// Whether `path` has one of the accepted extensions (case-insensitive)
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.input_extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Clamp a requested speed into the selectable range
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        speed.clamp(self.min_speed, self.max_speed)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.level.clone()
            }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.export.codec = Some(VideoCodec::H264);
        original_config.export.speed_policy = SpeedPolicy::ScaleExportRate;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[export]\nspeed_policy = \"scale_export_rate\"\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.export.speed_policy, SpeedPolicy::ScaleExportRate);
        assert_eq!(config.export.jpeg_quality, 95);
        assert_eq!(config.preview, PreviewConfig::default());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_jpeg_quality() {
        let mut config = Config::default();
        config.export.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_speed_range() {
        let mut config = Config::default();
        config.preview.min_speed = 5.0;
        config.preview.max_speed = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_input_extensions_case_insensitive() {
        let preview = PreviewConfig::default();
        assert!(preview.accepts(Path::new("/a/b/Clip.MOV")));
        assert!(preview.accepts(Path::new("clip.mp4")));
        assert!(!preview.accepts(Path::new("clip.mkv")));
        assert!(!preview.accepts(Path::new("clip")));
    }
}
