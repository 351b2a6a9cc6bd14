//! Access Layer Configuration
//!
//! Operator prefixes, parser limits, batching and logging defaults. Loaded
//! from a JSON file; every field is optional.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::{FilterParser, DEFAULT_MAX_DEPTH, DEFAULT_PREFIX, STORAGE_PREFIX};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid JSON for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "AERO_CONFIG_IO",
            ConfigError::Parse(_) => "AERO_CONFIG_PARSE",
            ConfigError::Invalid(_) => "AERO_CONFIG_INVALID",
        }
    }
}

/// Access layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Operator prefix of incoming filter literals (default: "$")
    #[serde(default = "default_operator_prefix")]
    pub operator_prefix: String,

    /// Operator prefix used for persisted filters (default: "_")
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,

    /// Maximum filter nesting depth (default: 16)
    #[serde(default = "default_max_filter_depth")]
    pub max_filter_depth: usize,

    /// Coalesce single-record lookups (default: true)
    #[serde(default = "default_batching_enabled")]
    pub batching_enabled: bool,

    /// Default log filter when RUST_LOG is unset (default: "info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_operator_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_storage_prefix() -> String {
    STORAGE_PREFIX.to_string()
}

fn default_max_filter_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_batching_enabled() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            operator_prefix: default_operator_prefix(),
            storage_prefix: default_storage_prefix(),
            max_filter_depth: default_max_filter_depth(),
            batching_enabled: default_batching_enabled(),
            log_filter: default_log_filter(),
        }
    }
}

impl AccessConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Load a config file, falling back to defaults when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parse and validate JSON config text
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_prefix("operator_prefix", &self.operator_prefix)?;
        validate_prefix("storage_prefix", &self.storage_prefix)?;
        if self.max_filter_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_filter_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parser for incoming filter literals
    pub fn parser(&self) -> FilterParser {
        FilterParser::new(self.operator_prefix.as_str()).with_max_depth(self.max_filter_depth)
    }

    /// Parser for persisted filter literals
    pub fn storage_parser(&self) -> FilterParser {
        FilterParser::new(self.storage_prefix.as_str()).with_max_depth(self.max_filter_depth)
    }
}

/// A prefix must be non-empty and must not be confusable with a field name
fn validate_prefix(name: &str, prefix: &str) -> ConfigResult<()> {
    if prefix.is_empty() {
        return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
    }
    if prefix.chars().any(char::is_alphanumeric) {
        return Err(ConfigError::Invalid(format!(
            "{} '{}' must not contain letters or digits",
            name, prefix
        )));
    }
    Ok(())
}
