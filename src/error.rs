// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Client token required")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Missing Google OAuth configuration.")]
    ConfigMissing,

    #[error("Unable to refresh access token: {0}")]
    RefreshFailed(String),

    #[error("{0}")]
    UnsupportedFileType(String),

    /// The target copy exists but the source could not be removed.
    #[error("Copy succeeded, cleanup failed: {message}")]
    PartialFailure {
        new_file_id: String,
        message: String,
    },

    #[error("Google API error: {0}")]
    GoogleApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Machine-readable error kind used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::NotFound(_) => "not_found",
            AppError::ConfigMissing => "config_missing",
            AppError::RefreshFailed(_) => "refresh_failed",
            AppError::UnsupportedFileType(_) => "unsupported_file_type",
            AppError::PartialFailure { .. } => "partial_failure",
            AppError::GoogleApi(_) => "google_error",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest(_)
            | AppError::ConfigMissing
            | AppError::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
            AppError::RefreshFailed(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PartialFailure { .. } | AppError::GoogleApi(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl AppError {
    /// Message safe to show to clients. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::RefreshFailed(_) => "Unable to refresh access token.".to_string(),
            AppError::GoogleApi(_) => "Google API request failed.".to_string(),
            AppError::PartialFailure { .. } => "Copy succeeded, cleanup failed.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(msg) => tracing::error!(error = %msg, "Database error"),
            AppError::Internal(err) => tracing::error!(error = %err, "Internal server error"),
            AppError::RefreshFailed(reason) => {
                tracing::warn!(reason = %reason, "Linked account needs re-authorization")
            }
            AppError::GoogleApi(detail) => tracing::warn!(error = %detail, "Google API error"),
            AppError::PartialFailure {
                new_file_id,
                message,
            } => tracing::warn!(new_file_id = %new_file_id, error = %message, "Partial failure"),
            _ => {}
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.public_message(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
