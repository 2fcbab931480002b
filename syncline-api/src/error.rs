//! Error Types for the Syncline Gateway
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.
//! Unexpected-error messages are sanitized: the root cause stays in server
//! logs, never in the response body.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use syncline_store::ResilienceError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during gateway operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required parameter is missing from request
    MissingParameter,

    /// Parameter value is out of valid range
    InvalidRange,

    // ========================================================================
    // Auth Errors (401, 403) - surfaced for collaborators, unused by the
    // gateway's own routes (authentication is an external concern)
    // ========================================================================
    Unauthorized,
    Forbidden,

    // ========================================================================
    // Not Found (404)
    // ========================================================================
    /// Requested catalog entity does not exist
    EntityNotFound,

    // ========================================================================
    // Conflict (409)
    // ========================================================================
    /// Operation conflicts with current state
    Conflict,

    // ========================================================================
    // Admission / Upstream Errors (429, 5xx)
    // ========================================================================
    /// Request rate limit exceeded
    TooManyRequests,

    /// Upstream catalog call failed
    ExternalServiceError,

    /// Upstream catalog call timed out
    Timeout,

    /// Circuit breaker is open for the upstream operation
    CircuitOpen,

    /// Catalog storage operation failed
    DatabaseError,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingParameter
            | ErrorCode::InvalidRange => StatusCode::BAD_REQUEST,

            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,

            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,

            ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingParameter => "Required parameter is missing",
            ErrorCode::InvalidRange => "Value is out of valid range",
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::Conflict => "Operation conflicts with current state",
            ErrorCode::TooManyRequests => "Rate limit exceeded",
            ErrorCode::ExternalServiceError => "Upstream service error",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::CircuitOpen => "Service temporarily unavailable",
            ErrorCode::DatabaseError => "Storage operation failed",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for gateway operations.
///
/// Every error body is `{error, message}` JSON (plus optional fields); the
/// correlation id travels in the `x-request-id` response header so a
/// client-observed failure can be matched against server logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    #[serde(rename = "error")]
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Seconds the client should wait before retrying (429/503 only)
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Attach a retry hint (also emitted as a `Retry-After` header).
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a MissingParameter error.
    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            ErrorCode::MissingParameter,
            format!("Required parameter '{}' is missing", name),
        )
    }

    /// Create an InvalidRange error.
    pub fn invalid_range(name: &str, min: impl fmt::Display, max: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Parameter '{}' must be between {} and {}", name, min, max),
        )
    }

    /// Create an EntityNotFound error.
    pub fn entity_not_found(entity_type: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    /// Create a TooManyRequests error with a retry hint.
    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::TooManyRequests,
            format!(
                "Rate limit exceeded. Retry after {} seconds",
                retry_after_secs
            ),
        )
        .with_retry_after(retry_after_secs)
    }

    /// Create an ExternalServiceError.
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalServiceError, message)
    }

    /// Create a Timeout error.
    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }

    /// Create a CircuitOpen error with a retry hint.
    pub fn circuit_open(retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::CircuitOpen,
            "Upstream temporarily unavailable, circuit open",
        )
        .with_retry_after(retry_after_secs)
    }

    /// Create an InternalError. The given message is logged server-side;
    /// the client sees the sanitized default.
    pub fn internal_error(message: impl fmt::Display) -> Self {
        tracing::error!(error = %message, "internal error");
        Self::from_code(ErrorCode::InternalError)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Implement IntoResponse for ApiError to enable automatic error handling
/// in Axum. Retryable errors (429, 503) carry a `Retry-After` header.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after;
        let mut response = (status, Json(self)).into_response();

        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
        }

        response
    }
}

// ============================================================================
// CONVERSIONS FROM COMPONENT ERRORS
// ============================================================================

/// Convert cursor validation failures into 400s.
impl From<syncline_core::CursorError> for ApiError {
    fn from(err: syncline_core::CursorError) -> Self {
        ApiError::validation_failed(err.to_string())
    }
}

impl From<syncline_core::CoreError> for ApiError {
    fn from(err: syncline_core::CoreError) -> Self {
        match err {
            syncline_core::CoreError::Cursor(cursor) => cursor.into(),
            syncline_core::CoreError::UnknownEntityType(segment) => {
                ApiError::invalid_input(format!("Unknown entity type: {}", segment))
            }
        }
    }
}

/// Map resilience outcomes onto protocol statuses: circuit-open is a
/// distinct retryable 503, timeouts are 504, exhausted retries surface the
/// wrapped error.
impl From<ResilienceError<ApiError>> for ApiError {
    fn from(err: ResilienceError<ApiError>) -> Self {
        match err {
            ResilienceError::CircuitOpen { key, retry_after } => {
                tracing::warn!(key = %key, "request short-circuited by open circuit");
                ApiError::circuit_open(retry_after.as_secs().max(1))
            }
            ResilienceError::Timeout { timeout } => {
                ApiError::timeout(&format!("upstream ({}ms budget)", timeout.as_millis()))
            }
            ResilienceError::Exhausted { source, .. } => source,
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for gateway operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(
            ErrorCode::ValidationFailed.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::EntityNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::ExternalServiceError.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ErrorCode::CircuitOpen.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_constructors() {
        let err = ApiError::entity_not_found("track", "t42");
        assert_eq!(err.code, ErrorCode::EntityNotFound);
        assert!(err.message.contains("track"));
        assert!(err.message.contains("t42"));

        let err = ApiError::missing_parameter("q");
        assert_eq!(err.code, ErrorCode::MissingParameter);
        assert!(err.message.contains("q"));
    }

    #[test]
    fn test_too_many_requests_carries_retry_after() {
        let err = ApiError::too_many_requests(7);
        assert_eq!(err.retry_after, Some(7));
        assert!(err.message.contains("7"));
    }

    #[test]
    fn test_internal_error_is_sanitized() {
        let err = ApiError::internal_error("connection string leaked: postgres://secret");
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn test_error_serialization_shape() -> Result<(), serde_json::Error> {
        let err = ApiError::too_many_requests(30);
        let json = serde_json::to_value(&err)?;

        assert_eq!(json["error"], "TOO_MANY_REQUESTS");
        assert_eq!(json["retryAfter"], 30);
        assert!(json["message"].as_str().is_some());
        Ok(())
    }

    #[test]
    fn test_resilience_error_mapping() {
        let circuit: ApiError = ResilienceError::<ApiError>::CircuitOpen {
            key: "catalog.entity".to_string(),
            retry_after: Duration::from_secs(12),
        }
        .into();
        assert_eq!(circuit.code, ErrorCode::CircuitOpen);
        assert_eq!(circuit.retry_after, Some(12));

        let timeout: ApiError = ResilienceError::<ApiError>::Timeout {
            timeout: Duration::from_millis(500),
        }
        .into();
        assert_eq!(timeout.code, ErrorCode::Timeout);

        let exhausted: ApiError = ResilienceError::Exhausted {
            attempts: 3,
            source: ApiError::external_service("catalog unreachable"),
        }
        .into();
        assert_eq!(exhausted.code, ErrorCode::ExternalServiceError);
    }

    #[test]
    fn test_cursor_error_maps_to_validation() {
        let err: ApiError = syncline_core::CursorError::InvertedWindow {
            since: "b".to_string(),
            until: "a".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
