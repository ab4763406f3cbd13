// SPDX-License-Identifier: MIT
// Copyright 2026 Hearthboard Contributors

//! Application error types with consistent API responses.
//!
//! The taxonomy matters for callers:
//! - `AuthExpired`: the access token was rejected upstream; retry once with a
//!   re-resolved token, then prompt reconnection.
//! - `AuthRequired`: no refresh is possible; the user must reconnect.
//! - `Transient`: network/5xx; eligible for bounded retry, credentials intact.
//! - `Validation`: malformed input; never retried.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Access token expired or rejected")]
    AuthExpired,

    #[error("Account must be reconnected")]
    AuthRequired,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Transient upstream failure: {0}")]
    Transient(String),

    #[error("Provider API error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::AuthExpired => (StatusCode::UNAUTHORIZED, "auth_expired", None),
            AppError::AuthRequired => (StatusCode::UNAUTHORIZED, "auth_required", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::Transient(msg) => {
                tracing::warn!(error = %msg, "Transient upstream failure");
                (StatusCode::SERVICE_UNAVAILABLE, "transient_failure", None)
            }
            AppError::Provider(msg) => {
                (StatusCode::BAD_GATEWAY, "provider_error", Some(msg.clone()))
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl AppError {
    /// Whether this error means the user has to go through OAuth again.
    pub fn needs_reconnect(&self) -> bool {
        matches!(self, AppError::AuthExpired | AppError::AuthRequired)
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
