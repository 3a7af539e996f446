//! Event domain error types

use axum_helpers::{AppError, ErrorCode};
use serde_json::json;
use thiserror::Error;

/// Result type for event operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Event domain errors
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Invalid {field}: '{value}' is not a valid identifier")]
    InvalidId { field: &'static str, value: String },

    #[error("Invalid {field}: '{value}' is not a valid date")]
    InvalidDate { field: &'static str, value: String },

    #[error("Cannot sort by '{0}'")]
    InvalidSortField(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Unexpected document shape: {0}")]
    Decode(#[from] mongodb::bson::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        let message = err.to_string();
        match err {
            EventError::InvalidId { field, value } => AppError::invalid_input(
                ErrorCode::InvalidObjectId,
                message,
                Some(json!({ "field": field, "value": value })),
            ),
            EventError::InvalidDate { field, value } => AppError::invalid_input(
                ErrorCode::InvalidDate,
                message,
                Some(json!({ "field": field, "value": value })),
            ),
            EventError::InvalidSortField(value) => AppError::invalid_input(
                ErrorCode::ValidationError,
                message,
                Some(json!({ "field": "sort_by", "value": value })),
            ),
            EventError::Database(_) => AppError::Database(message),
            EventError::Decode(_) => AppError::DatabaseDecode(message),
            EventError::Internal(_) => AppError::InternalServerError(message),
        }
    }
}

impl axum::response::IntoResponse for EventError {
    fn into_response(self) -> axum::response::Response {
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let errors = [
            EventError::InvalidId {
                field: "category",
                value: "abc".into(),
            },
            EventError::InvalidDate {
                field: "start",
                value: "yesterday".into(),
            },
            EventError::InvalidSortField("password".into()),
        ];

        for err in errors {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_invalid_id_maps_to_object_id_code() {
        let app: AppError = EventError::InvalidId {
            field: "user",
            value: "42".into(),
        }
        .into();
        assert_eq!(app.error_code(), ErrorCode::InvalidObjectId);
        assert_eq!(app.to_string(), "Invalid user: '42' is not a valid identifier");
    }

    #[test]
    fn test_internal_error_is_server_error() {
        let err = EventError::Internal("join failed".into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
