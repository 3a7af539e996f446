pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Body of every error response.
///
/// ```json
/// {
///   "code": 1002,
///   "error": "INVALID_OBJECT_ID",
///   "message": "Invalid category: 'abc' is not a valid identifier",
///   "details": { "field": "category", "value": "abc" }
/// }
/// ```
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details, such as the offending parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Application error type that can be converted to HTTP responses.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Query string error: {0}")]
    QueryRejection(#[from] QueryRejection),

    /// A request parameter was rejected; `code` narrows down why.
    #[error("{message}")]
    InvalidInput {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database decode error: {0}")]
    DatabaseDecode(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    pub fn invalid_input(
        code: ErrorCode,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self::InvalidInput {
            code,
            message: message.into(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::QueryRejection(e) => e.status(),
            Self::InvalidInput { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::SerdeJson(_)
            | Self::Io(_)
            | Self::Database(_)
            | Self::DatabaseDecode(_)
            | Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::SerdeJson(_) => ErrorCode::SerdeJsonError,
            Self::Io(_) => ErrorCode::IoError,
            Self::QueryRejection(_) => ErrorCode::InvalidQuery,
            Self::InvalidInput { code, .. } => *code,
            Self::BadRequest(_) => ErrorCode::ValidationError,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::DatabaseDecode(_) => ErrorCode::DatabaseDecode,
            Self::InternalServerError(_) => ErrorCode::InternalError,
            Self::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error_code = code.code(), error = %self, "Request failed");
        } else {
            tracing::info!(error_code = code.code(), error = %self, "Request rejected");
        }

        // Internal failures keep their detail in the log only.
        let (message, details) = match self {
            Self::InvalidInput {
                message, details, ..
            } => (message, details),
            Self::QueryRejection(e) => (e.body_text(), None),
            Self::BadRequest(msg) | Self::NotFound(msg) | Self::ServiceUnavailable(msg) => {
                (msg, None)
            }
            _ => (code.default_message().to_string(), None),
        };

        let body = Json(ErrorResponse {
            details,
            ..ErrorResponse::new(code, message)
        });

        (status, body).into_response()
    }
}

/// Builds an error response without going through [`AppError`].
pub fn error_response(status: StatusCode, message: String, error_code: ErrorCode) -> Response {
    (status, Json(ErrorResponse::new(error_code, message))).into_response()
}
