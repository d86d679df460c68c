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
///
/// Variants mirror the failure taxonomy of the Tuya integration: fatal
/// configuration problems, missing/ambiguous linked accounts, transport
/// failures, and upstream envelope errors. Token values never appear in
/// the `Display` output of any variant.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("No linked Tuya accounts found. Complete the OAuth flow first.")]
    NoLinkedAccount,

    #[error("Multiple Tuya accounts linked. Specify the uid query parameter.")]
    AmbiguousAccount,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Tuya API request failed with status {status}")]
    Network { status: u16, body: String },

    #[error("Tuya API error: {msg}")]
    Api {
        msg: String,
        code: Option<i64>,
        detail: Option<serde_json::Value>,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Config(err) => {
                tracing::error!(error = %err, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    None,
                )
            }
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "not_found",
                Some(serde_json::Value::String(msg.clone())),
            ),
            AppError::NoLinkedAccount => (
                StatusCode::BAD_REQUEST,
                "no_linked_account",
                Some(serde_json::Value::String(self.to_string())),
            ),
            AppError::AmbiguousAccount => (
                StatusCode::BAD_REQUEST,
                "ambiguous_account",
                Some(serde_json::Value::String(self.to_string())),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                Some(serde_json::Value::String(msg.clone())),
            ),
            AppError::Network { status, body } => {
                tracing::error!(status, body = %body, "Upstream HTTP error");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_http_error",
                    Some(serde_json::Value::String(format!("HTTP {}", status))),
                )
            }
            // The vendor envelope is preserved for diagnostics; it carries
            // no tokens (those only appear in token endpoint results, which
            // are never surfaced through this path).
            AppError::Api { msg, detail, .. } => (
                StatusCode::BAD_REQUEST,
                "tuya_error",
                Some(detail.clone().unwrap_or_else(|| {
                    serde_json::Value::String(msg.clone())
                })),
            ),
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

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
