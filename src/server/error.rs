//! HTTP error payloads.
//!
//! Every failure leaves a handler as `{"status": "error", "code": ..., "message": ...}`
//! with the status code implied by its [`ErrorCode`].
use crate::error::TrackerError;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;

/// Error categories reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed body, query string or field value
    InvalidInput,
    /// Unknown sheet or out-of-range row
    NotFound,
    /// The source workbook cannot be read
    SourceUnreadable,
    /// Store operation failed
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::SourceUnreadable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structured error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    /// Always `"error"`
    pub status: &'static str,
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::SheetNotFound(_) | TrackerError::RowNotFound { .. } => {
                ApiError::not_found(err.to_string())
            }
            TrackerError::InvalidFlag(_) => ApiError::invalid_input(err.to_string()),
            TrackerError::SourceUnreadable(_) => {
                ApiError::new(ErrorCode::SourceUnreadable, err.to_string())
            }
            TrackerError::DuckDBError(_) => {
                tracing::error!("Database error: {}", err);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            _ => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_errors_map_to_codes() {
        let cases = [
            (TrackerError::SheetNotFound("S1".to_owned()), ErrorCode::NotFound),
            (
                TrackerError::RowNotFound {
                    sheet: "S1".to_owned(),
                    column: "Blank_Column".to_owned(),
                    ordinal: 9,
                },
                ErrorCode::NotFound,
            ),
            (TrackerError::InvalidFlag("maybe".to_owned()), ErrorCode::InvalidInput),
            (TrackerError::Config("bad".to_owned()), ErrorCode::InternalError),
        ];
        for (error, code) in cases {
            assert_eq!(ApiError::from(error).code, code);
        }
    }

    #[test]
    fn error_payload() {
        let error = ApiError::not_found("Sheet 'S9' not found");

        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            serde_json::json!({
                "status": "error",
                "code": "NOT_FOUND",
                "message": "Sheet 'S9' not found",
            })
        );
    }
}
