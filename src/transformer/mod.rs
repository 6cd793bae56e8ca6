//! Rewrites Copilot completion requests into the shape the backend accepts.
//!
//! The rules are applied in a fixed order:
//!
//! 1. force the configured model
//! 2. force the configured generation limit
//! 3. keep only the tail of the prompt
//! 4. merge generation parameter overrides
//! 5. drop `suffix`, which the backend does not support

use crate::api::models::CompletionRequest;
use crate::core::config::ProxyConfig;
use serde_json::Value;

/// Build the outbound body from the inbound one and the config snapshot.
pub fn transform_request(mut body: CompletionRequest, config: &ProxyConfig) -> CompletionRequest {
    if !config.default_model.is_empty() {
        body.model = Some(Value::String(config.default_model.clone()));
    }

    if let Some(max_tokens) = config.default_max_tokens {
        body.max_tokens = Some(Value::from(max_tokens));
    }

    if let Some(limit) = config.default_max_prompt_units {
        if let Some(prompt) = body.prompt.as_mut() {
            prompt.keep_last(limit);
        }
    }

    if let Some(overrides) = &config.param_overrides {
        body.apply_overrides(overrides);
    }

    body.suffix = None;

    body
}
