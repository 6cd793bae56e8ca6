//! HTTP request handlers for the Copilot-facing API.
//!
//! This module contains the token stub, the streamed completion endpoint,
//! the health check and the metrics endpoint.

use crate::api::disconnect::DisconnectStream;
use crate::api::models::{CompletionRequest, HealthResponse, TokenStub};
use crate::api::relay::{relay_stream, BackendClient};
use crate::core::config::ProxyConfig;
use crate::core::logging::current_or_new_request_id;
use crate::core::{AppError, Result};
use crate::transformer::transform_request;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

/// Shared application state.
///
/// Built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub config: ProxyConfig,
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let backend = BackendClient::new(&config)?;
        Ok(Self { config, backend })
    }
}

/// Return the placeholder credential so the editor client proceeds.
pub async fn copilot_token() -> Json<TokenStub> {
    tracing::debug!("GET /copilot_internal/v2/token - serving placeholder token");
    Json(TokenStub::placeholder())
}

/// Handle Copilot code completion requests.
///
/// Only streamed completions are supported. The body is rewritten for the
/// backend and the backend's streamed bytes are relayed back as they arrive.
#[tracing::instrument(skip_all)]
pub async fn code_completions(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CompletionRequest>,
) -> Result<Response> {
    let request_id = current_or_new_request_id();

    let backend_uri = state.config.backend_uri()?;

    let body = transform_request(payload, &state.config);
    tracing::info!(
        request_id = %request_id,
        body = %body.log_summary(),
        "Forwarding completion request"
    );

    if !body.is_streaming() {
        return Err(AppError::Unimplemented(
            "non-streaming completions are not supported".to_string(),
        ));
    }

    let response = state
        .backend
        .open_stream(backend_uri, &body, &request_id)
        .await?;

    let relay = relay_stream(
        Box::pin(response.bytes_stream()),
        state.backend.timeout(),
        request_id.clone(),
    );
    let body = Body::from_stream(DisconnectStream::new(relay, request_id));

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Basic health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.config.backend_uri.clone(),
    })
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler() -> Result<Response> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copilot_token_is_constant() {
        let Json(first) = copilot_token().await;
        let Json(second) = copilot_token().await;
        assert_eq!(first, second);
        assert_eq!(first.token, "1316850460");
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let state = Arc::new(AppState::new(ProxyConfig::default()).unwrap());
        let Json(health) = health(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.backend.as_deref(), Some("http://localhost:5000"));
    }

    #[tokio::test]
    async fn test_metrics_handler_ok() {
        crate::core::init_metrics();
        let response = metrics_handler().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
