//! Local Copilot Proxy - Main entry point
//!
//! Parses startup flags, initializes logging and metrics, and serves the
//! proxy until interrupted.

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use local_copilot_proxy::{
    api::{build_router, AppState, COMPLETIONS_PATH, TOKEN_PATH},
    core::{init_metrics, CliArgs},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Load .env file if present (before clap reads any environment variables)
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(worker_threads) = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        builder.worker_threads(worker_threads);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(async_main(args))
}

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn init_tracing() {
    // NO_COLOR disables ANSI codes (for file logging)
    let no_color = std::env::var("NO_COLOR").is_ok();

    let base_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,local_copilot_proxy=debug".to_string());

    // Always suppress noisy HTTP library logs regardless of RUST_LOG setting
    let filter_str = format!(
        "{},hyper=warn,hyper::proto=warn,h2=warn,reqwest=warn",
        base_filter
    );
    let filter = tracing_subscriber::EnvFilter::new(filter_str);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(LocalTime)
                .with_ansi(!no_color),
        )
        .init();
}

async fn async_main(args: CliArgs) -> Result<()> {
    init_tracing();
    init_metrics();

    let config = args.into_config()?;
    config.log_summary();

    let host = config.server.host.clone();
    let port = config.server.port;

    let state = Arc::new(AppState::new(config)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!("Starting Local Copilot Proxy on {}", listener.local_addr()?);
    tracing::info!("Token stub: GET {}", TOKEN_PATH);
    tracing::info!("Completions: POST {}", COMPLETIONS_PATH);
    tracing::info!("Metrics endpoint: /metrics");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
