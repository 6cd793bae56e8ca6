//! Core functionality for the completion proxy.
//!
//! This module contains fundamental components used throughout the application:
//! - Configuration management
//! - Error handling
//! - Request-scoped logging context
//! - Metrics collection and HTTP middleware

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;

// Re-export commonly used types
pub use config::{CliArgs, ParamOverrides, ProxyConfig, ServerConfig};
pub use error::{AppError, Result};
pub use logging::{generate_request_id, get_request_id, REQUEST_ID};
pub use metrics::{get_metrics, init_metrics, Metrics};
pub use middleware::{request_id_middleware, MetricsMiddleware};
