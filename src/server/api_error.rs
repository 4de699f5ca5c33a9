//! Standardized API error responses for all endpoints.
//!
//! # Response Format
//!
//! ```json
//! {
//!   "error": {
//!     "code": "INVALID_FIELD",
//!     "message": "Invalid value for 'student_email': must be a valid email address",
//!     "details": { "field": "student_email" }
//!   }
//! }
//! ```
//!
//! The `details` field is optional and may contain additional context.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::AcademyError;
use crate::validation::ValidationError;

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Validation Errors (400) ===
    /// Request payload is invalid or malformed
    InvalidRequest,
    /// A field value is invalid
    InvalidField,

    // === Authentication Errors (401/403) ===
    /// No authentication token provided
    MissingToken,
    /// Authorization header is malformed
    InvalidHeader,
    /// Identity token is invalid or expired
    InvalidToken,
    /// Caller has no staff role
    Forbidden,

    // === Resource Errors (404) ===
    /// Requested user does not exist at the identity provider
    UserNotFound,

    // === Server Errors (5xx) ===
    /// Document store operation failed
    StoreError,
    /// Identity provider operation failed
    IdentityError,
    /// Server configuration error
    ConfigError,
    /// External service communication failed
    NetworkError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest | ErrorCode::InvalidField => StatusCode::BAD_REQUEST,

            ErrorCode::MissingToken | ErrorCode::InvalidHeader | ErrorCode::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }

            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::UserNotFound => StatusCode::NOT_FOUND,

            ErrorCode::StoreError
            | ErrorCode::IdentityError
            | ErrorCode::ConfigError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,

            ErrorCode::NetworkError => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Request payload is invalid",
            ErrorCode::InvalidField => "A field value is invalid",
            ErrorCode::MissingToken => "Authentication token is required",
            ErrorCode::InvalidHeader => "Authorization header is malformed",
            ErrorCode::InvalidToken => "Authentication token is invalid",
            ErrorCode::Forbidden => "Access denied",
            ErrorCode::UserNotFound => "User not found",
            ErrorCode::StoreError => "Document store operation failed",
            ErrorCode::IdentityError => "Identity provider operation failed",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::NetworkError => "Failed to communicate with external service",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }

    fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// The inner error object containing code, message, and optional details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field name, constraint violated, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Standardized API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

impl ApiError {
    /// Creates a new API error with the default message for `code`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: code.default_message().to_string(),
                details: None,
            },
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.error.code.status_code()
    }

    /// Invalid request error with field details.
    pub fn invalid_field(field: &str, reason: &str) -> Self {
        Self::with_details(
            ErrorCode::InvalidField,
            format!("Invalid value for '{}': {}", field, reason),
            serde_json::json!({ "field": field }),
        )
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::Forbidden, message)
    }

    pub fn user_not_found(uid: &str) -> Self {
        Self::with_message(ErrorCode::UserNotFound, format!("User '{}' not found", uid))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.error.code.default_message(),
            self.error.message
        )
    }
}

impl std::error::Error for ApiError {}

// === Conversions ===

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid_field(&err.field, &err.message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::with_message(ErrorCode::InvalidRequest, rejection.body_text())
    }
}

impl From<AcademyError> for ApiError {
    fn from(err: AcademyError) -> Self {
        let code = match &err {
            AcademyError::UserNotFound(uid) => return ApiError::user_not_found(uid),
            AcademyError::InvalidToken(_) => ErrorCode::InvalidToken,
            AcademyError::ConfigError(_) => ErrorCode::ConfigError,
            AcademyError::NetworkError(_) => ErrorCode::NetworkError,
            AcademyError::StoreError(_) => ErrorCode::StoreError,
            AcademyError::IdentityError(_) => ErrorCode::IdentityError,
            AcademyError::MailError(_) => ErrorCode::InternalError,
        };

        if code.is_server_error() {
            // Internal detail stays in the log.
            error!(error = %err, code = ?code, "Request failed");
            ApiError::new(code)
        } else {
            ApiError::with_message(code, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidField.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::UserNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::StoreError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn api_error_serialization() {
        let err = ApiError::invalid_field("student_email", "must be a valid email address");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"]["code"], "INVALID_FIELD");
        assert_eq!(json["error"]["details"]["field"], "student_email");
    }

    #[test]
    fn missing_user_is_not_found() {
        let err: ApiError = AcademyError::UserNotFound("uid-9".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.error.message.contains("uid-9"));
    }

    #[test]
    fn mail_failure_is_generic_internal_error() {
        let err: ApiError = AcademyError::MailError("relay refused".to_string()).into();
        assert_eq!(err.error.code, ErrorCode::InternalError);
        assert!(!err.error.message.contains("relay"));
    }

    #[test]
    fn server_errors_hide_detail() {
        let err: ApiError =
            AcademyError::StoreError("permission denied on projects/ade".to_string()).into();
        assert_eq!(err.error.code, ErrorCode::StoreError);
        assert!(!err.error.message.contains("projects/ade"));
    }

    #[test]
    fn validation_error_conversion() {
        let err: ApiError = ValidationError::new("percentage", "must be between 1 and 100").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error.details.unwrap()["field"], "percentage");
    }
}
