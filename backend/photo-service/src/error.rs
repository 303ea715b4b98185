/// Error types for Photo Service
///
/// Every user-visible failure is rendered as the JSON envelope
/// `{"error": {"message", "code", "status", "details"?}}` with
/// `Cache-Control: no-store`, never a raw stack trace.
use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;

/// Result type for photo-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Request input failed validation
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// A storage write failed for an otherwise valid upload
    UploadFailed(String),

    /// Requested object does not exist
    NotFound(String),

    /// Authentication failed
    Unauthorized(String),

    /// Client exceeded the upload window
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// Object storage is not configured or unreachable at startup
    Storage(String),

    /// Image transform pipeline failed
    Processing(String),

    /// HTTP method not supported on this endpoint
    MethodNotAllowed(String),

    /// Catch-all for unexpected failures
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        AppError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Stable machine-readable code for the envelope and analytics events
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_FAILED",
            AppError::UploadFailed(_) => "UPLOAD_FAILED",
            AppError::NotFound(_) => "FILE_NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Processing(_) => "PROCESSING_ERROR",
            AppError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation { message, .. } => write!(f, "{}", message),
            AppError::UploadFailed(msg) => write!(f, "{}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::Unauthorized(msg) => write!(f, "{}", msg),
            AppError::RateLimited { message, .. } => write!(f, "{}", message),
            AppError::Storage(msg) => write!(f, "{}", msg),
            AppError::Processing(msg) => write!(f, "{}", msg),
            AppError::MethodNotAllowed(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::UploadFailed(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Processing(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        let mut error = json!({
            "message": self.to_string(),
            "code": self.code(),
            "status": status.as_u16(),
        });
        if let AppError::Validation {
            details: Some(details),
            ..
        } = self
        {
            error["details"] = details.clone();
        }

        let mut builder = HttpResponse::build(status);
        builder.insert_header((header::CACHE_CONTROL, "no-store"));

        if let AppError::RateLimited {
            retry_after_secs: Some(secs),
            ..
        } = self
        {
            builder.insert_header((header::RETRY_AFTER, secs.to_string()));
        }

        builder.json(json!({ "error": error }))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
