//! Error types and handling for the completion proxy.
//!
//! This module provides a unified error type [`AppError`] covering every way a
//! single proxied request can fail, and converts it into an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub const ERROR_TYPE_API: &str = "api_error";
pub const ERROR_TYPE_CONFIGURATION: &str = "configuration_error";
pub const ERROR_TYPE_NOT_IMPLEMENTED: &str = "not_implemented_error";
pub const ERROR_TYPE_BACKEND: &str = "backend_error";
pub const ERROR_TYPE_NETWORK: &str = "network_error";
pub const ERROR_TYPE_TIMEOUT: &str = "timeout_error";

/// Main error type for the proxy.
///
/// Every failure is local to the request that triggered it; nothing here is
/// retried.
#[derive(Error, Debug)]
pub enum AppError {
    /// The proxy is missing settings needed to serve the request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The client asked for a mode the proxy does not provide
    #[error("Not implemented: {0}")]
    Unimplemented(String),

    /// The backend answered with a non-200 status before streaming began
    #[error("Failed to fetch from the target endpoint (status {status})")]
    Backend { status: u16 },

    /// Connection-level failure talking to the backend
    #[error("Backend request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend did not produce a response head in time
    #[error("Gateway timeout")]
    Timeout,

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal server errors with custom message
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status the client sees for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::Backend { status } => backend_status(*status),
            AppError::Network(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => ERROR_TYPE_CONFIGURATION,
            AppError::Unimplemented(_) => ERROR_TYPE_NOT_IMPLEMENTED,
            AppError::Backend { .. } => ERROR_TYPE_BACKEND,
            AppError::Network(e) if e.is_timeout() => ERROR_TYPE_TIMEOUT,
            AppError::Network(_) => ERROR_TYPE_NETWORK,
            AppError::Timeout => ERROR_TYPE_TIMEOUT,
            AppError::Serialization(_) | AppError::Internal(_) => ERROR_TYPE_API,
        }
    }
}

/// Pass the backend's status through when it is an error status the client
/// can act on; anything else becomes 502.
fn backend_status(status: u16) -> StatusCode {
    match StatusCode::from_u16(status) {
        Ok(code) if code.is_client_error() || code.is_server_error() => code,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
