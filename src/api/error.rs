//! API error types
//!
//! Every failure is reported synchronously as an HTTP status with a short
//! JSON body. Nothing here is retried.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::error::StoreError;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Wrong verb for the route
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Malformed or undecodable body (detail kept for logs)
    #[error("Invalid request body")]
    InvalidRequest(String),

    /// Update target absent
    #[error("Name not found")]
    NotFound,

    /// No route under `/api`
    #[error("Not found")]
    UnknownRoute,

    /// Underlying persistence error
    #[error("Database error")]
    Store(#[from] StoreError),

    /// Blocking task failed
    #[error("Internal error")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UnknownRoute => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::NotFound | Self::UnknownRoute => "NOT_FOUND",
            Self::Store(_) => "STORE_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create an invalid request error
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidRequest(detail.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code (machine-readable)
    pub error: &'static str,
    /// Error message (human-readable)
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::Store(e) => tracing::error!(error = %e, "Store operation failed"),
            Self::Internal(detail) => tracing::error!(detail = %detail, "Internal error"),
            Self::InvalidRequest(detail) => {
                tracing::debug!(detail = %detail, "Rejected request body")
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
