//! Streaming relay to the completions backend.
//!
//! Opens one streamed POST per completion request and forwards the backend's
//! body bytes to the client in arrival order, without buffering or rewriting
//! them.

use crate::api::models::CompletionRequest;
use crate::core::config::ProxyConfig;
use crate::core::error::{AppError, Result};
use crate::core::metrics::get_metrics;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::error::Error;
use std::time::Duration;

/// Path appended to the backend base URI.
pub const BACKEND_COMPLETIONS_PATH: &str = "/v1/completions";

/// Build the backend completions URL from its base URI.
pub fn completions_url(backend_uri: &str) -> String {
    format!(
        "{}{}",
        backend_uri.trim_end_matches('/'),
        BACKEND_COMPLETIONS_PATH
    )
}

/// HTTP client for the completions backend.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl BackendClient {
    /// Create a pooled client using the configured timeout.
    ///
    /// The timeout bounds connecting, waiting for the response head and each
    /// wait for the next body chunk; there is no cap on total stream length.
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send the transformed body and wait for a 200 response head.
    ///
    /// No body bytes are read here, so a failure at this stage means nothing
    /// has reached the client yet.
    pub async fn open_stream(
        &self,
        backend_uri: &str,
        body: &CompletionRequest,
        request_id: &str,
    ) -> Result<reqwest::Response> {
        let url = completions_url(backend_uri);

        let request = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(body)
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(
                    request_id = %request_id,
                    url = %url,
                    error = %e,
                    error_source = ?e.source(),
                    is_timeout = e.is_timeout(),
                    is_connect = e.is_connect(),
                    "HTTP request failed to backend"
                );
                let kind = if e.is_timeout() { "timeout" } else { "network" };
                get_metrics().backend_errors.with_label_values(&[kind]).inc();
                return Err(AppError::Network(e));
            }
            Err(_) => {
                tracing::error!(
                    request_id = %request_id,
                    url = %url,
                    timeout_secs = self.timeout.as_secs(),
                    "Backend did not respond in time"
                );
                get_metrics()
                    .backend_errors
                    .with_label_values(&["timeout"])
                    .inc();
                return Err(AppError::Timeout);
            }
        };

        let status = response.status();
        tracing::debug!(
            request_id = %request_id,
            url = %url,
            status = %status,
            method = "POST",
            "HTTP request completed"
        );

        if status.as_u16() != 200 {
            tracing::warn!(
                request_id = %request_id,
                url = %url,
                status = status.as_u16(),
                "Backend returned an error status"
            );
            get_metrics()
                .backend_errors
                .with_label_values(&["status"])
                .inc();
            return Err(AppError::Backend {
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

struct RelayState<S> {
    chunks: S,
    read_timeout: Duration,
    request_id: String,
    chunk_count: usize,
    byte_count: u64,
    done: bool,
}

/// Relay backend body chunks to the client.
///
/// - chunks are yielded unchanged, in arrival order
/// - the stream ends when the backend finishes; dropping it early drops the
///   backend response and closes that connection
/// - a read timeout after data has flowed ends the stream cleanly
/// - a read timeout before the first chunk, or any other read error, yields
///   one error item so the client's response is aborted
pub fn relay_stream<S, E>(
    chunks: S,
    read_timeout: Duration,
    request_id: String,
) -> BoxStream<'static, std::io::Result<Bytes>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = RelayState {
        chunks,
        read_timeout,
        request_id,
        chunk_count: 0,
        byte_count: 0,
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }

        let next = tokio::time::timeout(state.read_timeout, state.chunks.next()).await;

        match next {
            Ok(Some(Ok(bytes))) => {
                state.chunk_count += 1;
                state.byte_count += bytes.len() as u64;
                get_metrics().relayed_bytes.inc_by(bytes.len() as u64);
                tracing::trace!(
                    request_id = %state.request_id,
                    chunk = state.chunk_count,
                    size = bytes.len(),
                    "Relaying chunk"
                );
                Some((Ok(bytes), state))
            }
            Ok(Some(Err(e))) => {
                tracing::error!(
                    request_id = %state.request_id,
                    error = %e,
                    chunks = state.chunk_count,
                    "Backend stream failed"
                );
                get_metrics()
                    .backend_errors
                    .with_label_values(&["network"])
                    .inc();
                state.done = true;
                Some((Err(std::io::Error::other(e.to_string())), state))
            }
            Ok(None) => {
                tracing::debug!(
                    request_id = %state.request_id,
                    chunks = state.chunk_count,
                    bytes = state.byte_count,
                    "Backend stream finished"
                );
                None
            }
            Err(_) if state.chunk_count > 0 => {
                tracing::warn!(
                    request_id = %state.request_id,
                    chunks = state.chunk_count,
                    bytes = state.byte_count,
                    "A timeout occurred while reading data from the backend, ending stream"
                );
                None
            }
            Err(_) => {
                tracing::error!(
                    request_id = %state.request_id,
                    timeout_secs = state.read_timeout.as_secs_f64(),
                    "Backend sent no data before timing out"
                );
                get_metrics()
                    .backend_errors
                    .with_label_values(&["timeout"])
                    .inc();
                state.done = true;
                Some((
                    Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "backend sent no data before timing out",
                    )),
                    state,
                ))
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    type Chunk = std::result::Result<Bytes, std::io::Error>;

    fn collect_ok(items: Vec<std::io::Result<Bytes>>) -> Vec<Bytes> {
        items.into_iter().map(|item| item.unwrap()).collect()
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            completions_url("http://localhost:5000"),
            "http://localhost:5000/v1/completions"
        );
        assert_eq!(
            completions_url("http://localhost:5000/"),
            "http://localhost:5000/v1/completions"
        );
        assert_eq!(
            completions_url("http://gpu/api"),
            "http://gpu/api/v1/completions"
        );
    }

    #[tokio::test]
    async fn test_relay_preserves_bytes_and_order() {
        let chunks: Vec<Chunk> = vec![
            Ok(Bytes::from_static(b"data: {\"a\":1}\n\n")),
            Ok(Bytes::from_static(b"data: {\"b\":2}\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let items: Vec<_> = relay_stream(
            stream::iter(chunks),
            Duration::from_secs(1),
            "req".to_string(),
        )
        .collect()
        .await;

        assert_eq!(
            collect_ok(items),
            vec![
                Bytes::from_static(b"data: {\"a\":1}\n\n"),
                Bytes::from_static(b"data: {\"b\":2}\n\n"),
                Bytes::from_static(b"data: [DONE]\n\n"),
            ]
        );
    }

    #[tokio::test]
    async fn test_timeout_after_data_ends_cleanly() {
        let chunks = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"partial"))])
            .chain(stream::pending());

        let items: Vec<_> = relay_stream(
            chunks,
            Duration::from_millis(50),
            "req".to_string(),
        )
        .collect()
        .await;

        assert_eq!(collect_ok(items), vec![Bytes::from_static(b"partial")]);
    }

    #[tokio::test]
    async fn test_timeout_before_data_is_an_error() {
        let chunks = stream::pending::<Chunk>();

        let items: Vec<_> = relay_stream(
            chunks,
            Duration::from_millis(50),
            "req".to_string(),
        )
        .collect()
        .await;

        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_read_error_terminates_stream() {
        let chunks: Vec<Chunk> = vec![
            Ok(Bytes::from_static(b"one")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            )),
            Ok(Bytes::from_static(b"never")),
        ];

        let items: Vec<_> = relay_stream(
            stream::iter(chunks),
            Duration::from_secs(1),
            "req".to_string(),
        )
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_dropping_relay_releases_backend_source() {
        struct Released(Arc<AtomicBool>);

        impl Drop for Released {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let released = Arc::new(AtomicBool::new(false));
        let guard = Released(released.clone());
        let chunks = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"first"))])
            .chain(stream::pending())
            .map(move |chunk| {
                let _ = &guard;
                chunk
            });

        let mut relay = relay_stream(chunks, Duration::from_secs(30), "req".to_string());
        assert_eq!(relay.next().await.unwrap().unwrap(), Bytes::from_static(b"first"));
        assert!(!released.load(Ordering::SeqCst));

        drop(relay);
        assert!(released.load(Ordering::SeqCst));
    }
}
