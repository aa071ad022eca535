use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the todo store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {}", .0.join(" "))]
    Validation(Vec<String>),

    #[error("store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Failures surfaced to HTTP callers. Every variant renders the same
/// `{success: false, ...}` envelope the success paths use.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Field-presence or pattern failure caught before the store is called.
    #[error("{0}")]
    BadRequest(String),

    /// Record-level constraint violations, reported all at once.
    #[error("validation failed")]
    Validation(Vec<String>),

    /// The id in the request path does not parse; distinct from not-found.
    #[error("invalid todo id")]
    MalformedId,

    #[error("todo not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(messages) => ApiError::Validation(messages),
            StoreError::Sqlite(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": message }),
            ),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": "Validation failed.", "errors": errors }),
            ),
            ApiError::MalformedId => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "message": "Invalid todo id." }),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": "Todo not found." }),
            ),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": "Internal server error.", "error": message }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
