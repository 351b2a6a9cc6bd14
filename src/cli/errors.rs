//! Fatal CLI errors.
//!
//! These end the process with a non-zero status. Problems with the request
//! itself (bad filters, denied access) are written to stdout as error
//! responses instead.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded
    #[error("AERO_CLI_CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),

    /// stdin was empty
    #[error("AERO_CLI_IO_ERROR: no request on stdin")]
    EmptyRequest,

    /// stdin did not hold a JSON document
    #[error("AERO_CLI_IO_ERROR: request is not valid JSON: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    /// stdin or stdout failed
    #[error("AERO_CLI_IO_ERROR: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "AERO_CLI_CONFIG_ERROR",
            Self::EmptyRequest | Self::MalformedRequest(_) | Self::Io(_) => "AERO_CLI_IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err = CliError::from(ConfigError::Invalid("max_filter_depth".into()));
        assert_eq!(err.code(), "AERO_CLI_CONFIG_ERROR");
        assert!(err.to_string().starts_with("AERO_CLI_CONFIG_ERROR: "));
    }

    #[test]
    fn test_io_codes() {
        assert_eq!(CliError::EmptyRequest.code(), "AERO_CLI_IO_ERROR");
        let io = CliError::from(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        assert_eq!(io.code(), "AERO_CLI_IO_ERROR");
        assert_eq!(io.to_string(), "AERO_CLI_IO_ERROR: closed");
    }
}
