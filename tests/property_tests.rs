//! Property-based tests for the request rewrite rules.
//!
//! These tests use proptest to verify properties that should hold for all
//! inbound bodies, focusing on prompt truncation and forced fields.

use local_copilot_proxy::{
    api::{CompletionRequest, Prompt},
    core::{config::ParamOverrides, ProxyConfig},
    transform_request,
};
use proptest::prelude::*;
use serde_json::{json, Value};

fn config_with_limit(limit: usize) -> ProxyConfig {
    ProxyConfig {
        default_max_prompt_units: Some(limit),
        ..ProxyConfig::default()
    }
}

/// Generate an inbound body with optional client-side fields
fn request_strategy() -> impl Strategy<Value = CompletionRequest> {
    (
        proptest::option::of("[a-z0-9-]{1,12}"),
        proptest::option::of(0u64..2048),
        proptest::option::of(".{0,64}"),
        proptest::option::of(-2.0f64..2.0),
        any::<bool>(),
    )
        .prop_map(|(model, max_tokens, suffix, temperature, stream)| {
            let mut body = json!({ "prompt": "fn main() {}", "stream": stream });
            let obj = body.as_object_mut().unwrap();
            if let Some(model) = model {
                obj.insert("model".to_string(), json!(model));
            }
            if let Some(max_tokens) = max_tokens {
                obj.insert("max_tokens".to_string(), json!(max_tokens));
            }
            if let Some(suffix) = suffix {
                obj.insert("suffix".to_string(), json!(suffix));
            }
            if let Some(temperature) = temperature {
                obj.insert("temperature".to_string(), json!(temperature));
            }
            serde_json::from_value(body).unwrap()
        })
}

proptest! {
    /// Property: a text prompt is either unchanged or exactly its last K characters
    #[test]
    fn prop_text_prompt_keeps_tail(text in ".{0,200}", limit in 1usize..100) {
        let body = CompletionRequest {
            prompt: Some(Prompt::Text(text.clone())),
            ..CompletionRequest::default()
        };

        let outbound = transform_request(body, &config_with_limit(limit));
        let chars: Vec<char> = text.chars().collect();
        let expected: String = if chars.len() <= limit {
            text.clone()
        } else {
            chars[chars.len() - limit..].iter().collect()
        };

        prop_assert_eq!(outbound.prompt, Some(Prompt::Text(expected)));
    }

    /// Property: an array prompt keeps its last K elements in order
    #[test]
    fn prop_token_prompt_keeps_tail(tokens in prop::collection::vec(0u32..50_000, 0..300), limit in 1usize..150) {
        let body = CompletionRequest {
            prompt: Some(Prompt::Units(tokens.iter().map(|t| json!(t)).collect())),
            ..CompletionRequest::default()
        };

        let outbound = transform_request(body, &config_with_limit(limit));
        let start = tokens.len().saturating_sub(limit);
        let expected: Vec<Value> = tokens[start..].iter().map(|t| json!(t)).collect();

        prop_assert_eq!(outbound.prompt, Some(Prompt::Units(expected)));
    }

    /// Property: suffix never reaches the backend
    #[test]
    fn prop_suffix_never_forwarded(body in request_strategy()) {
        let outbound = transform_request(body, &ProxyConfig::default());
        let value = serde_json::to_value(&outbound).unwrap();
        prop_assert!(value.get("suffix").is_none());
    }

    /// Property: a configured model always wins
    #[test]
    fn prop_default_model_forced(body in request_strategy(), model in "[A-Za-z0-9-]{1,20}") {
        let config = ProxyConfig {
            default_model: model.clone(),
            ..ProxyConfig::default()
        };
        let outbound = transform_request(body, &config);
        prop_assert_eq!(outbound.model, Some(json!(model)));
    }

    /// Property: overrides win over whatever the client sent
    #[test]
    fn prop_overrides_win(body in request_strategy()) {
        let config = ProxyConfig {
            param_overrides: Some(ParamOverrides::parse(r#"{"temperature": 0.1}"#).unwrap()),
            ..ProxyConfig::default()
        };
        let outbound = transform_request(body, &config);
        prop_assert_eq!(outbound.extra.get("temperature"), Some(&json!(0.1)));
    }

    /// Property: the transform is deterministic
    #[test]
    fn prop_transform_deterministic(body in request_strategy()) {
        let config = ProxyConfig {
            default_max_tokens: Some(16),
            ..ProxyConfig::default()
        };
        let first = transform_request(body.clone(), &config);
        let second = transform_request(body, &config);
        prop_assert_eq!(first, second);
    }
}
