//! Configuration management for the completion proxy.
//!
//! Settings are read once at startup from command-line flags (each of which
//! can also come from the environment or a `.env` file) and frozen into a
//! [`ProxyConfig`] that every request reads through shared state.

use crate::core::error::AppError;
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::{Map, Value};

/// Default number of prompt units kept when truncating.
pub const DEFAULT_MAX_PROMPT_UNITS: usize = 4000;

/// Default backend timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default backend base URI.
pub const DEFAULT_BACKEND_URI: &str = "http://localhost:5000";

/// Process-wide proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Server configuration (host, port)
    pub server: ServerConfig,

    /// Base URI of the inference backend; `None` until configured
    pub backend_uri: Option<String>,

    /// Model forced onto every request; empty means keep the client's value
    pub default_model: String,

    /// Generation limit forced onto every request
    pub default_max_tokens: Option<u64>,

    /// Number of trailing prompt units forwarded to the backend
    pub default_max_prompt_units: Option<usize>,

    /// Fields merged into every request body, overriding client values
    pub param_overrides: Option<ParamOverrides>,

    /// Timeout for connecting, waiting for headers and each streamed chunk
    pub request_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backend_uri: Some(DEFAULT_BACKEND_URI.to_string()),
            default_model: String::new(),
            default_max_tokens: None,
            default_max_prompt_units: Some(DEFAULT_MAX_PROMPT_UNITS),
            param_overrides: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ProxyConfig {
    /// Backend base URI, or a configuration error when none is set.
    pub fn backend_uri(&self) -> std::result::Result<&str, AppError> {
        self.backend_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| {
                AppError::Configuration("Fatal Error, BACKEND_URI is not set".to_string())
            })
    }

    /// Log the effective settings at startup.
    pub fn log_summary(&self) {
        let model = if self.default_model.is_empty() {
            "<client>"
        } else {
            self.default_model.as_str()
        };
        tracing::info!(
            backend = self.backend_uri.as_deref().unwrap_or("<unset>"),
            model = model,
            max_tokens = ?self.default_max_tokens,
            max_prompt_units = ?self.default_max_prompt_units,
            timeout_secs = self.request_timeout_secs,
            "Proxy configuration loaded"
        );
        if let Some(overrides) = &self.param_overrides {
            tracing::info!("Using generation params override: {}", overrides);
        }
    }
}

/// Server-specific configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
        }
    }
}

/// Generation parameters merged into every outbound request.
///
/// Validated at construction so that merging can never fail per request:
/// `model` must be a string and `max_tokens` a non-negative integer (either may
/// also be null).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParamOverrides(Map<String, Value>);

impl ParamOverrides {
    /// Parse overrides from a JSON object string.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .with_context(|| format!("Invalid generation params override JSON: {}", raw))?;
        Self::try_from(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for ParamOverrides {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            bail!("Generation params override must be a JSON object");
        };

        if let Some(model) = map.get("model") {
            if !(model.is_string() || model.is_null()) {
                bail!("Override 'model' must be a string, got {}", model);
            }
        }
        if let Some(max_tokens) = map.get("max_tokens") {
            if !(max_tokens.is_u64() || max_tokens.is_null()) {
                bail!(
                    "Override 'max_tokens' must be a non-negative integer, got {}",
                    max_tokens
                );
            }
        }

        Ok(Self(map))
    }
}

impl std::fmt::Display for ParamOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// Command-line surface of the proxy.
#[derive(Debug, Parser)]
#[command(name = "local-copilot-proxy")]
#[command(about = "Serve Copilot completion requests from a self-hosted backend")]
#[command(version)]
pub struct CliArgs {
    /// Host to bind to
    #[arg(long, env = "COPILOT_PROXY_HOST", default_value = "localhost")]
    pub host: String,

    /// Port to bind to
    #[arg(long, env = "COPILOT_PROXY_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Base URI of the completions backend (empty leaves it unset)
    #[arg(long, env = "COPILOT_PROXY_BACKEND", default_value = DEFAULT_BACKEND_URI)]
    pub backend: String,

    /// Model name forced onto every request
    #[arg(long, env = "COPILOT_PROXY_MODEL", default_value = "")]
    pub model: String,

    /// Generation limit forced onto every request
    #[arg(long = "max-generate-tokens", env = "COPILOT_PROXY_MAX_GENERATE_TOKENS")]
    pub max_generate_tokens: Option<u64>,

    /// Trailing prompt units kept per request (0 disables truncation)
    #[arg(
        long = "max-prompt-words",
        env = "COPILOT_PROXY_MAX_PROMPT_WORDS",
        default_value_t = DEFAULT_MAX_PROMPT_UNITS
    )]
    pub max_prompt_words: usize,

    /// JSON object merged into every request body
    #[arg(
        long = "generation-params-override",
        env = "COPILOT_PROXY_GENERATION_PARAMS_OVERRIDE"
    )]
    pub generation_params_override: Option<String>,

    /// Backend timeout in seconds
    #[arg(
        long = "request-timeout-secs",
        env = "COPILOT_PROXY_REQUEST_TIMEOUT_SECS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS
    )]
    pub request_timeout_secs: u64,
}

impl CliArgs {
    /// Freeze the parsed flags into a [`ProxyConfig`].
    pub fn into_config(self) -> Result<ProxyConfig> {
        let param_overrides = self
            .generation_params_override
            .as_deref()
            .map(ParamOverrides::parse)
            .transpose()?;

        if self.request_timeout_secs == 0 {
            bail!("--request-timeout-secs must be greater than zero");
        }

        let backend = self.backend.trim();

        Ok(ProxyConfig {
            server: ServerConfig {
                host: self.host,
                port: self.port,
            },
            backend_uri: (!backend.is_empty()).then(|| backend.to_string()),
            default_model: self.model,
            default_max_tokens: self.max_generate_tokens,
            default_max_prompt_units: (self.max_prompt_words > 0).then_some(self.max_prompt_words),
            param_overrides,
            request_timeout_secs: self.request_timeout_secs,
        })
    }
}
