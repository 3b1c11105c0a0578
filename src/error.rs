// Resource-level error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// Resource-level failure returned by every repository operation.
///
/// `Backend` carries errors reported by the backend request handler; they are
/// surfaced with their own status code and never reinterpreted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    // 400 Bad Request
    #[error("{0}")]
    BadRequest(String),

    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 500 Internal Server Error
    #[error("{0}")]
    Internal(String),

    // Passed through from the backend unchanged
    #[error("{message}")]
    Backend { status: u16, message: String },
}

impl ResourceError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ResourceError::BadRequest(_) => 400,
            ResourceError::NotFound(_) => 404,
            ResourceError::Internal(_) => 500,
            ResourceError::Backend { status, .. } => *status,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ResourceError::BadRequest(msg) => msg,
            ResourceError::NotFound(msg) => msg,
            ResourceError::Internal(msg) => msg,
            ResourceError::Backend { message, .. } => message,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ResourceError::BadRequest(_) => "BAD_REQUEST",
            ResourceError::NotFound(_) => "NOT_FOUND",
            ResourceError::Internal(_) => "INTERNAL_SERVER_ERROR",
            ResourceError::Backend { status, .. } => match *status {
                400 => "BAD_REQUEST",
                404 => "NOT_FOUND",
                409 => "CONFLICT",
                412 => "PRECONDITION_FAILED",
                _ => "BACKEND_ERROR",
            },
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "code": self.status_code(),
            "reason": self.error_code(),
            "message": self.message(),
        })
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }
}

// Static constructor methods
impl ResourceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ResourceError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ResourceError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ResourceError::Internal(message.into())
    }

    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        ResourceError::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::backend(409, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::backend(412, message)
    }
}

// Convert other error types to ResourceError
impl From<crate::filter::error::FilterError> for ResourceError {
    fn from(err: crate::filter::error::FilterError) -> Self {
        ResourceError::bad_request(err.to_string())
    }
}

impl From<crate::backend::connection::BackendError> for ResourceError {
    fn from(err: crate::backend::connection::BackendError) -> Self {
        // Don't expose transport details to clients
        tracing::error!("Backend connection error: {}", err);
        ResourceError::internal("Failed to acquire backend connection")
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ResourceError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_keep_their_status() {
        let err = ResourceError::conflict("duplicate entry");
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "CONFLICT");
        assert_eq!(err.to_json()["message"], "duplicate entry");
    }

    #[test]
    fn filter_errors_become_bad_requests() {
        let err: ResourceError =
            crate::filter::error::FilterError::InvalidWhereClause("nope".into()).into();
        assert_eq!(err.status_code(), 400);
        assert!(err.message().contains("nope"));
    }
}
