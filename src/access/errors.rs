//! # Access Errors
//!
//! Error types for access values, permissions and the authorization step.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::fields::FieldSetError;
use crate::filter::FilterError;

/// Result type for access operations
pub type AccessResult<T> = Result<T, AccessError>;

/// Access errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    // ==================
    // Literal Errors
    // ==================
    /// Malformed access or permission literal
    #[error("Invalid access value: {0}")]
    InvalidAccessValue(String),

    /// Malformed `fields` part
    #[error("{0}")]
    FieldSet(#[from] FieldSetError),

    /// Malformed `filter` part
    #[error("{0}")]
    Filter(#[from] FilterError),

    // ==================
    // Authorization Errors
    // ==================
    /// Authenticated actor denied
    #[error("Not authorized to {action} {model}")]
    Forbidden { model: String, action: String },

    /// Anonymous caller denied
    #[error("Authentication required to {action} {model}")]
    Unauthorized { model: String, action: String },
}

impl AccessError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidAccessValue(reason.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::InvalidAccessValue(_) => "AERO_INVALID_ACCESS_VALUE",
            AccessError::FieldSet(err) => err.code(),
            AccessError::Filter(err) => err.code(),
            AccessError::Forbidden { .. } => "AERO_FORBIDDEN",
            AccessError::Unauthorized { .. } => "AERO_UNAUTHORIZED",
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AccessError::InvalidAccessValue(_) => StatusCode::BAD_REQUEST,
            AccessError::FieldSet(_) => StatusCode::BAD_REQUEST,
            AccessError::Filter(_) => StatusCode::BAD_REQUEST,

            // 401 / 403
            AccessError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AccessError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }

    /// Whether this is a deny rather than a malformed input
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            AccessError::Forbidden { .. } | AccessError::Unauthorized { .. }
        )
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl From<AccessError> for ErrorResponse {
    fn from(err: AccessError) -> Self {
        Self {
            code: err.code(),
            error: err.to_string(),
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse::from(self));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AccessError::invalid("expected an object").status_code(),
            StatusCode::BAD_REQUEST
        );
        let forbidden = AccessError::Forbidden {
            model: "posts".into(),
            action: "read".into(),
        };
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.code(), "AERO_FORBIDDEN");

        let unauthorized = AccessError::Unauthorized {
            model: "posts".into(),
            action: "read".into(),
        };
        assert_eq!(unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthorized.to_string(), "Authentication required to read posts");
    }

    #[test]
    fn test_nested_error_codes_propagate() {
        let err = AccessError::from(FilterError::invalid("", "expected an object"));
        assert_eq!(err.code(), "AERO_INVALID_QUERY_FILTER");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_denial());
    }

    #[test]
    fn test_into_response_status() {
        let response = AccessError::Forbidden {
            model: "posts".into(),
            action: "delete".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
