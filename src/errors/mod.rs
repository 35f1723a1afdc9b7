use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Shared behaviour for every error type exposed over the HTTP API.
///
/// Each enum implements this directly instead of funnelling everything
/// through one god-error: callers can match on the concrete variant while
/// the web layer only needs `status_code`/`user_message` to render a
/// response.
pub trait AppError: std::error::Error {
    fn status_code(&self) -> StatusCode;
    fn error_code(&self) -> &'static str;

    fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Implements `IntoResponse` for a type that already implements `AppError`,
/// rendering the flat `{"status":"error", ...}` envelope used across the API.
macro_rules! impl_into_response {
    ($error_type:ty) => {
        impl axum::response::IntoResponse for $error_type {
            fn into_response(self) -> axum::response::Response {
                use crate::errors::AppError;
                let status = self.status_code();
                tracing::warn!(error_code = self.error_code(), %status, "{}", self);
                let body = serde_json::json!({
                    "status": "error",
                    "code": self.error_code(),
                    "detail": self.user_message(),
                });
                (status, axum::response::Json(body)).into_response()
            }
        }
    };
}
pub(crate) use impl_into_response;

/// Generic catch-all for handlers that don't need a bespoke error enum.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("storage full")]
    StorageFull,

    #[error("upstream storage unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::StorageFull => StatusCode::INSUFFICIENT_STORAGE,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::StorageFull => "STORAGE_FULL",
            ApiError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn user_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl_into_response!(ApiError);

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

pub mod pipeline;
