//! # Query Filter Errors
//!
//! Structural errors raised while parsing filter literals. They are reported
//! at parse time and never retried.

use thiserror::Error;

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Query filter errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Malformed filter literal
    #[error("Invalid query filter parameter at {}: {}", display_path(.path), .reason)]
    InvalidQueryFilterParameter { path: String, reason: String },

    /// Filter nests deeper than the parser allows
    #[error("Query filter at {} exceeds maximum depth of {}", display_path(.path), .max_depth)]
    DepthExceeded { path: String, max_depth: usize },
}

impl FilterError {
    /// Create an invalid parameter error for the node at `path`
    pub fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidQueryFilterParameter {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        "AERO_INVALID_QUERY_FILTER"
    }

    /// Path of the offending node ("" for the root)
    pub fn path(&self) -> &str {
        match self {
            Self::InvalidQueryFilterParameter { path, .. } | Self::DepthExceeded { path, .. } => path,
        }
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        format!("'{}'", path)
    }
}
