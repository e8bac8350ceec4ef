//! Player settings and configuration management

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::item::QualityTier;
use crate::player::queue::PlaybackMode;

/// Player configuration. Time-valued fields are expressed in seconds.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlayerSettings {
    /// Maximum consecutive reload attempts for the same item before giving
    /// up and advancing. Zero disables retrying entirely.
    #[serde(default = "default_maximum_retry_count")]
    pub maximum_retry_count: u32,
    /// Seconds to wait for a success signal before re-running the retry
    /// policy.
    #[serde(default = "default_retry_timeout")]
    pub retry_timeout: f64,
    /// Resume automatically when a system audio interruption ends with a
    /// resume hint.
    #[serde(default = "default_true")]
    pub resume_after_interruption: bool,
    /// Resume automatically when connectivity comes back.
    #[serde(default = "default_true")]
    pub resume_after_connection_loss: bool,
    /// Seconds after which a connection loss is no longer resumed
    /// automatically.
    #[serde(default = "default_maximum_connection_loss_time")]
    pub maximum_connection_loss_time: f64,
    #[serde(default = "default_true")]
    pub adjust_quality_automatically: bool,
    #[serde(default = "default_quality")]
    pub default_quality: QualityTier,
    /// Seconds between quality re-evaluations.
    #[serde(default = "default_adjust_quality_time_interval")]
    pub adjust_quality_time_interval: f64,
    /// Interruptions within one evaluation window that force a downgrade.
    #[serde(default = "default_adjust_quality_after_interruption_count")]
    pub adjust_quality_after_interruption_count: u32,
    #[serde(default)]
    pub mode: PlaybackMode,
    #[serde(default = "default_rate")]
    pub rate: f32,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Rate multiplier applied while a remote seek intent is held.
    #[serde(default = "default_rate_multiplier_on_seeking")]
    pub rate_multiplier_on_seeking: f32,
}

fn default_maximum_retry_count() -> u32 {
    10
}

fn default_retry_timeout() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

fn default_maximum_connection_loss_time() -> f64 {
    60.0
}

fn default_quality() -> QualityTier {
    QualityTier::Medium
}

fn default_adjust_quality_time_interval() -> f64 {
    600.0
}

fn default_adjust_quality_after_interruption_count() -> u32 {
    3
}

fn default_rate() -> f32 {
    1.0
}

fn default_volume() -> f32 {
    1.0
}

fn default_rate_multiplier_on_seeking() -> f32 {
    2.0
}

/// Error types for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    ParseError(String),
    ValidationError(String),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "I/O error: {}", e),
            ConfigError::ParseError(s) => write!(f, "Parse error: {}", s),
            ConfigError::ValidationError(s) => write!(f, "Validation error: {}", s),
        }
    }
}

impl Error for ConfigError {}

impl Default for PlayerSettings {
    fn default() -> Self {
        PlayerSettings {
            maximum_retry_count: default_maximum_retry_count(),
            retry_timeout: default_retry_timeout(),
            resume_after_interruption: true,
            resume_after_connection_loss: true,
            maximum_connection_loss_time: default_maximum_connection_loss_time(),
            adjust_quality_automatically: true,
            default_quality: default_quality(),
            adjust_quality_time_interval: default_adjust_quality_time_interval(),
            adjust_quality_after_interruption_count: default_adjust_quality_after_interruption_count(),
            mode: PlaybackMode::default(),
            rate: default_rate(),
            volume: default_volume(),
            rate_multiplier_on_seeking: default_rate_multiplier_on_seeking(),
        }
    }
}

impl PlayerSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: PlayerSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self)?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("audiopilot").join("config.json")
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Playback rate must be positive".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ConfigError::ValidationError(
                "Volume must be within [0, 1]".to_string(),
            ));
        }

        if self.retry_timeout <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Retry timeout must be positive".to_string(),
            ));
        }

        if self.maximum_connection_loss_time < 0.0 {
            return Err(ConfigError::ValidationError(
                "Maximum connection loss time cannot be negative".to_string(),
            ));
        }

        if self.adjust_quality_time_interval <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Quality adjustment interval must be positive".to_string(),
            ));
        }

        if self.adjust_quality_after_interruption_count == 0 {
            return Err(ConfigError::ValidationError(
                "Quality interruption threshold must be at least 1".to_string(),
            ));
        }

        if self.rate_multiplier_on_seeking <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Seeking rate multiplier must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn retry_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.retry_timeout)
    }

    pub fn maximum_connection_loss_duration(&self) -> Duration {
        Duration::from_secs_f64(self.maximum_connection_loss_time)
    }

    pub fn adjust_quality_interval(&self) -> Duration {
        Duration::from_secs_f64(self.adjust_quality_time_interval)
    }
}
