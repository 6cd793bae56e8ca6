//! API layer for the completion proxy.
//!
//! This module contains the HTTP handlers, request/response models, the
//! backend stream relay and the route table.

pub mod disconnect;
pub mod handlers;
pub mod models;
pub mod relay;
pub mod router;

// Re-export commonly used types
pub use handlers::{code_completions, copilot_token, health, metrics_handler, AppState};
pub use models::{CompletionRequest, Prompt, TokenStub};
pub use relay::{completions_url, relay_stream, BackendClient};
pub use router::{build_router, COMPLETIONS_PATH, TOKEN_PATH};
