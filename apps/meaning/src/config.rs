//! # Configuration
//!
//! Optional `meaning.toml`:
//!
//! ```toml
//! store = "people.mean"
//! log_format = "json"
//! ```
//!
//! CLI flags win over the file, the file wins over the defaults.

use meaning_core::MeaningError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "meaning.toml";

/// Store file used when neither the CLI nor the config names one.
pub const DEFAULT_STORE_FILE: &str = "meaning.store";

/// Largest config file accepted.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Contents of `meaning.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeaningConfig {
    /// Path of the store file.
    pub store: Option<PathBuf>,
    /// `text` or `json`.
    pub log_format: Option<String>,
}

impl MeaningConfig {
    /// Parse a config document.
    pub fn from_toml(text: &str) -> Result<Self, MeaningError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| MeaningError::DeserializationError(format!("Invalid config: {}", e)))?;

        if let Some(format) = &config.log_format {
            if format != "text" && format != "json" {
                return Err(MeaningError::DeserializationError(format!(
                    "Unknown log_format '{}'. Use: text, json",
                    format
                )));
            }
        }
        Ok(config)
    }

    /// Load an explicit config file, or `meaning.toml` when present.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, MeaningError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let metadata = std::fs::metadata(&path).map_err(|e| {
            MeaningError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(MeaningError::IoError(format!(
                "Config file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            MeaningError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// The store path: CLI flag, then config, then the default.
    #[must_use]
    pub fn store_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.store.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
    }

    /// True when JSON log output is requested.
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.as_deref() == Some("json")
    }
}
