//! Configuration for the biostream agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::buffer::{RecordingMode, DEFAULT_WINDOW_SECS};
use crate::source::SourceConfig;
use crate::streamer::{StreamOptions, DEFAULT_MAX_CHUNK, DEFAULT_PULL_TIMEOUT};

/// Persisted defaults for recording sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds of data the rolling window keeps.
    pub window_secs: f64,

    /// Stream source used when none is given on the command line.
    pub source: SourceConfig,

    /// Directory for auto-named recordings.
    pub data_dir: PathBuf,

    /// Whether sessions record to disk.
    pub record: bool,

    /// Regularize timestamps at the stream's nominal rate.
    pub dejitter: bool,

    /// Longest wait per pull before the stop flag is rechecked.
    #[serde(with = "duration_serde")]
    pub pull_timeout: Duration,

    /// Maximum samples fetched per pull.
    pub chunk_samples: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("biostream-agent")
            .join("recordings");

        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            source: SourceConfig::default(),
            data_dir,
            record: true,
            dejitter: true,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            chunk_samples: DEFAULT_MAX_CHUNK,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("biostream-agent")
            .join("config.json")
    }

    /// Ensure the recording directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Pull-loop tuning derived from this config.
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            pull_timeout: self.pull_timeout,
            max_chunk: self.chunk_samples,
            dejitter: self.dejitter,
        }
    }

    /// Recording destination derived from this config.
    pub fn recording_mode(&self) -> RecordingMode {
        if self.record {
            RecordingMode::AutoNamed {
                data_dir: self.data_dir.clone(),
                label: None,
            }
        } else {
            RecordingMode::Disabled
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialize error: {0}")]
    Serialize(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_secs, 10.0);
        assert!(config.record);
        assert!(config.dejitter);
        assert_eq!(config.pull_timeout, Duration::from_secs(1));
        assert_eq!(config.chunk_samples, 12);
        assert_eq!(
            config.source,
            SourceConfig::Synthetic {
                channels: 4,
                sample_rate: 256.0
            }
        );
    }

    #[test]
    fn test_config_json_round_trip() {
        let mut config = Config::default();
        config.window_secs = 4.5;
        config.record = false;
        config.pull_timeout = Duration::from_secs(2);

        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.window_secs, 4.5);
        assert!(!back.record);
        assert_eq!(back.pull_timeout, Duration::from_secs(2));
        assert_eq!(back.source, config.source);
    }

    #[test]
    fn test_derived_stream_options() {
        let mut config = Config::default();
        config.dejitter = false;
        config.chunk_samples = 32;

        let options = config.stream_options();
        assert!(!options.dejitter);
        assert_eq!(options.max_chunk, 32);
        assert_eq!(options.pull_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_derived_recording_mode() {
        let mut config = Config::default();
        assert!(matches!(
            config.recording_mode(),
            RecordingMode::AutoNamed { label: None, .. }
        ));

        config.record = false;
        assert_eq!(config.recording_mode(), RecordingMode::Disabled);
    }
}
