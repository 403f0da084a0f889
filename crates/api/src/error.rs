//! Maps internal failures onto the HTTP status codes spec.md §7's error
//! taxonomy names for the API surface: 400 for a malformed request body,
//! 401 for a rejected `X-API-Key`, 404 for a missing resource, 500 for
//! everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid or missing API key".to_string()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Unavailable(detail) => (StatusCode::SERVICE_UNAVAILABLE, detail),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
