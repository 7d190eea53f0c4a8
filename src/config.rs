use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Persisted risk configuration
// ---------------------------------------------------------------------------

/// Directory name under the OS config root.
const APP_DIR_NAME: &str = "automl-flow";
/// File name of the persisted configuration record.
const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment override for the config base directory (tests, portable setups).
pub const CONFIG_HOME_ENV: &str = "AUTOML_FLOW_CONFIG_HOME";

/// Errors that can occur while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No suitable base config directory available")]
    NoBaseDir,
    #[error("Failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Risk thresholds and recommendation text, independent of any single session.
///
/// Loaded once at startup (defaults when absent) and written back on every
/// mutation; there is no versioning or migration, last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub rec_high: String,
    pub rec_medium: String,
    pub rec_low: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.75,
            medium_threshold: 0.5,
            rec_high: "Immediate outreach: offer a retention discount and a dedicated support contact.".to_string(),
            rec_medium: "Schedule a check-in call and review the account for upsell friction.".to_string(),
            rec_low: "No action needed; include in the regular satisfaction survey.".to_string(),
        }
    }
}

/// Severity bucket for a single prediction value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBucket {
    High,
    Medium,
    Low,
}

impl RiskConfig {
    /// Load the configuration from disk, falling back to defaults when the
    /// file is absent or unreadable.
    pub fn load() -> Self {
        match config_path() {
            Ok(path) => match Self::load_from(&path) {
                Ok(Some(config)) => config,
                Ok(None) => Self::default(),
                Err(err) => {
                    log::warn!("Using default configuration: {err}");
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!("Using default configuration: {err}");
                Self::default()
            }
        }
    }

    /// Load from a specific path. `Ok(None)` means the file does not exist.
    pub fn load_from(path: &PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        Ok(Some(config))
    }

    /// Persist to the default location, creating directories as needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Persist to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let data = toml::to_string_pretty(self)?;
        std::fs::write(path, data).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })
    }

    /// Clamp both thresholds into `[0, 1]` and keep medium ≤ high.
    pub fn clamp_thresholds(&mut self) {
        self.high_threshold = self.high_threshold.clamp(0.0, 1.0);
        self.medium_threshold = self.medium_threshold.clamp(0.0, 1.0);
        if self.medium_threshold > self.high_threshold {
            self.medium_threshold = self.high_threshold;
        }
    }

    /// Classify a prediction value against the configured thresholds.
    pub fn classify(&self, value: f64) -> RiskBucket {
        if value >= self.high_threshold {
            RiskBucket::High
        } else if value >= self.medium_threshold {
            RiskBucket::Medium
        } else {
            RiskBucket::Low
        }
    }

    /// Recommendation text for a bucket.
    pub fn recommendation(&self, bucket: RiskBucket) -> &str {
        match bucket {
            RiskBucket::High => &self.rec_high,
            RiskBucket::Medium => &self.rec_medium,
            RiskBucket::Low => &self.rec_low,
        }
    }
}

/// Resolve the config file path, honoring the env override.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let base = if let Ok(home) = std::env::var(CONFIG_HOME_ENV) {
        PathBuf::from(home)
    } else {
        directories::BaseDirs::new()
            .ok_or(ConfigError::NoBaseDir)?
            .config_dir()
            .to_path_buf()
    };
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
