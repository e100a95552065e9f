//! Configuration for the viscostream agent.
//!
//! All tuning knobs live in one explicit structure handed to constructors;
//! nothing reads ambient global state, so parallel test runs can use
//! different parameters freely.

use crate::broadcast::BroadcastConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Period between broadcast ticks
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// One-off delay before the first broadcast tick
    #[serde(with = "duration_serde")]
    pub settle_delay: Duration,

    /// Readings per window for derived statistics
    pub window_size: usize,

    /// Latest readings per broadcast snapshot
    pub batch_size: usize,

    /// Port for the HTTP/WebSocket server (0 for random)
    pub port: u16,

    /// Path to the JSON model artifact
    pub model_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            window_size: 5,
            batch_size: 5,
            port: 5000,
            model_path: PathBuf::from("viscosity_model.json"),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("viscostream")
            .join("config.json")
    }

    /// The subset of settings the broadcaster consumes.
    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            poll_interval: self.poll_interval,
            settle_delay: self.settle_delay,
            batch_size: self.batch_size,
            window_size: self.window_size,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

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
