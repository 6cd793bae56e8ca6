//! Local Copilot Proxy - lets Copilot-style editor clients use a self-hosted
//! completions backend.
//!
//! The proxy answers the client's token request with a placeholder credential and
//! forwards completion requests to an OpenAI-style `/v1/completions` backend
//! (vLLM, FastChat, ...), rewriting a few fields on the way:
//!
//! - **Model / generation limit**: optionally forced to configured values
//! - **Prompt truncation**: only the tail of long prompts is forwarded
//! - **Parameter overrides**: a JSON object merged into every request
//! - **Suffix removal**: fill-in-the-middle suffixes are dropped
//!
//! Backend bytes are streamed back to the client unmodified as they arrive.
//!
//! # Architecture
//!
//! - [`core`]: config, errors, logging context, metrics, middleware
//! - [`transformer`]: the request rewrite rules
//! - [`api`]: HTTP handlers, models, the backend relay and the router

pub mod api;
pub mod core;
pub mod transformer;

// Re-export commonly used types for convenience
pub use api::{build_router, AppState, CompletionRequest, TokenStub};
pub use core::{AppError, CliArgs, ProxyConfig, Result};
pub use transformer::transform_request;
