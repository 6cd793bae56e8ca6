//! Route table for the proxy.

use crate::api::handlers::{code_completions, copilot_token, health, metrics_handler, AppState};
use crate::core::{request_id_middleware, MetricsMiddleware};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Path the editor client requests a credential from.
pub const TOKEN_PATH: &str = "/copilot_internal/v2/token";

/// Path the editor client posts completion requests to.
pub const COMPLETIONS_PATH: &str = "/v1/engines/codegen/completions";

/// Build the router with all endpoints and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(TOKEN_PATH, get(copilot_token))
        .route(COMPLETIONS_PATH, post(code_completions))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(MetricsMiddleware::track_metrics))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
