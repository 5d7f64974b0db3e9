//! Configuration for the activity sentinel.

use crate::collector::types::EventSource;
use crate::detection::rules::RuleThresholds;
use crate::detection::scorer::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Subject id used when the host name cannot be determined.
pub const DEFAULT_SUBJECT_ID: &str = "USER_001";

/// Longest analysis window accepted (one day).
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// Main configuration for the sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Length of the window scored on each analysis tick
    #[serde(with = "duration_serde")]
    pub window_duration: Duration,

    /// Time between analysis ticks
    #[serde(with = "duration_serde")]
    pub analysis_interval: Duration,

    /// Identifier stamped on every decision report
    pub subject_id: String,

    /// Event store sizing
    pub stores: StoreConfig,

    /// Rule engine thresholds
    pub rules: RuleThresholds,

    /// How an external scorer (if any) combines with the rules
    pub scoring: ScoringPolicy,

    /// Path for storing transparency counters
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-activity-sentinel");

        Self {
            window_duration: Duration::from_secs(60),
            analysis_interval: Duration::from_secs(60),
            subject_id: default_subject_id(),
            stores: StoreConfig::default(),
            rules: RuleThresholds::default(),
            scoring: ScoringPolicy::default(),
            data_path: data_dir,
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
            config.validate()?;
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

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-activity-sentinel")
            .join("config.json")
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_duration.is_zero() {
            return Err(ConfigError::ZeroDuration("window_duration"));
        }
        if self.window_duration > Duration::from_secs(MAX_WINDOW_SECS) {
            return Err(ConfigError::WindowTooLong {
                window_secs: self.window_duration.as_secs(),
                max_secs: MAX_WINDOW_SECS,
            });
        }
        if self.analysis_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("analysis_interval"));
        }
        self.stores.validate()?;
        // Stores prune by retention before filtering by window
        if let Some(retention) = self.stores.retention() {
            if retention < self.window_duration {
                return Err(ConfigError::RetentionShorterThanWindow {
                    retention_secs: retention.as_secs(),
                    window_secs: self.window_duration.as_secs(),
                });
            }
        }
        self.rules.validate()?;
        self.scoring.validate()?;
        Ok(())
    }
}

/// Capacity and retention of the three event stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub keyboard_capacity: usize,
    pub pointer_capacity: usize,
    pub window_capacity: usize,
    /// Events older than this (relative to the queried window end) are dropped
    /// from a store the next time it is queried.
    pub retention_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keyboard_capacity: 1000,
            pointer_capacity: 1000,
            window_capacity: 1000,
            retention_secs: Some(300),
        }
    }
}

impl StoreConfig {
    pub fn capacity(&self, source: EventSource) -> usize {
        match source {
            EventSource::Keyboard => self.keyboard_capacity,
            EventSource::Pointer => self.pointer_capacity,
            EventSource::Window => self.window_capacity,
        }
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in EventSource::ALL {
            if self.capacity(source) == 0 {
                return Err(ConfigError::ZeroCapacity { channel: source });
            }
        }
        if self.retention_secs == Some(0) {
            return Err(ConfigError::ZeroDuration("retention_secs"));
        }
        Ok(())
    }
}

/// Configuration errors. All of them are fatal at construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{channel} store capacity must be greater than zero")]
    ZeroCapacity { channel: EventSource },
    #[error("invalid threshold for rule '{rule}': {value}")]
    InvalidThreshold { rule: &'static str, value: f64 },
    #[error("scorer weight must be within [0, 1], got {0}")]
    InvalidScorerWeight(f64),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("window of {window_secs}s exceeds the {max_secs}s limit")]
    WindowTooLong { window_secs: u64, max_secs: u64 },
    #[error("retention of {retention_secs}s is shorter than the {window_secs}s window")]
    RetentionShorterThanWindow { retention_secs: u64, window_secs: u64 },
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

fn default_subject_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_SUBJECT_ID.to_string())
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
