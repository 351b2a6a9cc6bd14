//! # Field Set Errors
//!
//! Error types for field set parsing.

use thiserror::Error;

/// Result type for field set operations
pub type FieldSetResult<T> = Result<T, FieldSetError>;

/// Field set errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldSetError {
    /// Literal is not an array of non-empty field names
    #[error("Invalid field set: {0}")]
    InvalidFieldSet(String),
}

impl FieldSetError {
    /// Create an invalid field set error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidFieldSet(reason.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFieldSet(_) => "AERO_INVALID_FIELD_SET",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_and_message() {
        let err = FieldSetError::invalid("expected an array");
        assert_eq!(err.code(), "AERO_INVALID_FIELD_SET");
        assert_eq!(err.to_string(), "Invalid field set: expected an array");
    }
}
