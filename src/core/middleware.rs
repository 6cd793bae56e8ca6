//! HTTP middleware: request-id propagation and request metrics.

use crate::core::logging::{generate_request_id, REQUEST_ID, REQUEST_ID_HEADER};
use crate::core::metrics::get_metrics;
use axum::{
    extract::{MatchedPath, Request},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Attach a request id to every request.
///
/// Reuses the client's `x-request-id` when present, otherwise generates one.
/// The id is available through [`crate::core::logging::get_request_id`] while
/// the handler runs and is echoed on the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(generate_request_id);

    let mut response = REQUEST_ID.scope(request_id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Endpoint label for requests that matched no route.
pub const UNMATCHED_ENDPOINT: &str = "unmatched";

/// Holds one slot of the active-request gauge; released on drop so requests
/// abandoned mid-handler are not left counted.
struct ActiveRequestGuard {
    endpoint: String,
}

impl ActiveRequestGuard {
    fn new(endpoint: String) -> Self {
        get_metrics()
            .active_requests
            .with_label_values(&[&endpoint])
            .inc();
        Self { endpoint }
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        get_metrics()
            .active_requests
            .with_label_values(&[&self.endpoint])
            .dec();
    }
}

/// Middleware for tracking request metrics.
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Track metrics for incoming requests.
    ///
    /// Requests are labelled by their route template, not the raw path. For
    /// streamed completions the handler returns once the backend answered, so
    /// the recorded duration is time to first byte.
    pub async fn track_metrics(request: Request, next: Next) -> Response {
        let path = request.uri().path().to_string();
        let method = request.method().to_string();

        // Skip metrics endpoint itself to avoid recursion
        if path == "/metrics" {
            return next.run(request).await;
        }

        let endpoint = request
            .extensions()
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_string())
            .unwrap_or_else(|| UNMATCHED_ENDPOINT.to_string());

        let _active = ActiveRequestGuard::new(endpoint.clone());

        let start = Instant::now();
        let response = next.run(request).await;
        let duration = start.elapsed().as_secs_f64();
        let status_code = response.status().as_u16().to_string();

        let metrics = get_metrics();
        metrics
            .request_count
            .with_label_values(&[&method, &endpoint, &status_code])
            .inc();
        metrics
            .request_duration
            .with_label_values(&[&method, &endpoint])
            .observe(duration);

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info!(
            "{} {} - status={} content_type={} duration={:.3}s",
            method,
            path,
            status_code,
            content_type,
            duration
        );

        response
    }
}
