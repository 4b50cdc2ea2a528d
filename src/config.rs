//! Configuration for depthsync sessions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for a coordinator session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on a single wait for frames
    #[serde(with = "duration_millis")]
    pub wait_timeout: Duration,

    /// Default largest valid reading for depth streams
    pub max_depth: u16,

    /// Joints below this confidence are ignored by pose detection
    pub min_joint_confidence: f32,

    /// Capacity of each live stream's frame queue; producers drop frames when it is full
    pub frame_queue_depth: usize,

    /// Intensity written for depth pixels with no reading
    pub background_intensity: u8,

    /// Recorded-session playback defaults
    pub playback: PlaybackConfig,

    /// Path for storing session stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depthsync");

        Self {
            wait_timeout: Duration::from_millis(1000),
            max_depth: 10_000,
            min_joint_confidence: 0.5,
            frame_queue_depth: 2,
            background_intensity: 0,
            playback: PlaybackConfig::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depthsync")
            .join("config.json")
    }

    /// Path of the persisted session stats.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait_timeout.is_zero() {
            return Err(ConfigError::Invalid("wait_timeout must be non-zero".into()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_joint_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_joint_confidence must be within [0, 1], got {}",
                self.min_joint_confidence
            )));
        }
        if self.frame_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "frame_queue_depth must be at least 1".into(),
            ));
        }
        if !(self.playback.speed.is_finite() && self.playback.speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "playback.speed must be positive, got {}",
                self.playback.speed
            )));
        }
        Ok(())
    }
}

/// Defaults applied to recorded sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Playback multiplier
    pub speed: f64,
    /// Loop to the start at end of data instead of stopping
    pub repeat: bool,
    /// Pace delivery by recorded timestamps instead of as fast as possible
    pub realtime: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            repeat: true,
            realtime: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
