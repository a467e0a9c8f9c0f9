// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert streamfan_core errors to HTTP errors
impl From<streamfan_core::Error> for AppError {
    fn from(err: streamfan_core::Error) -> Self {
        use streamfan_core::Error;

        match err {
            Error::InvalidInput(msg) => AppError::bad_request(msg),
            Error::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                AppError::internal_server_error("Service temporarily unavailable")
            }
            Error::Timeout(msg) => {
                tracing::error!("Registry timeout: {}", msg);
                AppError::internal_server_error("Service temporarily unavailable")
            }
            other => {
                tracing::error!("Internal error: {}", other);
                AppError::internal_server_error("Internal server error")
            }
        }
    }
}
