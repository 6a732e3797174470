//! Scheduler configuration.
//!
//! Thresholds and bounds that tune the review pipeline without changing its
//! semantics: mastery promotion thresholds for the SM-2 engine, the retry
//! bound for optimistic-concurrency conflicts, and the timeout applied to
//! every store call. Loaded from `config.toml` under the data directory when
//! present, otherwise defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunable parameters for scheduling and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum interval (days) before a card can be promoted to mastered.
    pub mastery_interval_days: u32,
    /// Minimum consecutive passes before a card can be promoted to mastered.
    pub mastery_repetitions: u32,
    /// How many times a conflicted review is re-fetched and re-attempted
    /// before surfacing a conflict to the caller.
    pub max_review_retries: u32,
    /// Upper bound on any single store call, in milliseconds.
    pub store_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mastery_interval_days: 21,
            mastery_repetitions: 5,
            max_review_retries: 3,
            store_timeout_ms: 5000,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `config.toml` from a directory, falling back to defaults when
    /// the file does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join("config.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Default data directory (e.g. `~/.local/share/mneme`).
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mneme"))
}
