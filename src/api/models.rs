//! Request and response models for the Copilot-facing API.

use crate::core::config::ParamOverrides;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Completion request as sent by the editor client.
///
/// Fields the proxy rewrites are held separately; everything else is kept in
/// `extra` and forwarded untouched. `model`, `max_tokens` and `stream` keep
/// the client's raw JSON so odd values (`"max_tokens": 1.5`, `"stream": 1`,
/// explicit `null`) are accepted and forwarded exactly as received unless a
/// rewrite rule replaces them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<Value>,

    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_tokens: Option<Value>,

    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt: Option<Prompt>,

    /// Fill-in-the-middle suffix; never forwarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<Value>,

    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub stream: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionRequest {
    /// Whether the client asked for a streamed response (JSON truthiness).
    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().map(is_truthy).unwrap_or(false)
    }

    /// Merge overrides into the body; an override always wins.
    pub fn apply_overrides(&mut self, overrides: &ParamOverrides) {
        for (key, value) in overrides.iter() {
            match key.as_str() {
                "model" => self.model = Some(value.clone()),
                "max_tokens" => self.max_tokens = Some(value.clone()),
                "prompt" => {
                    self.prompt = Some(
                        serde_json::from_value(value.clone())
                            .unwrap_or_else(|_| Prompt::Other(value.clone())),
                    )
                }
                "suffix" => self.suffix = Some(value.clone()),
                "stream" => self.stream = Some(value.clone()),
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// The body as logged: everything except the prompt text, which is
    /// replaced by its unit count.
    pub fn log_summary(&self) -> Value {
        let mut summary = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(obj) = summary.as_object_mut() {
            if obj.remove("prompt").is_some() {
                let units = self.prompt.as_ref().map(Prompt::unit_count).unwrap_or(0);
                obj.insert("prompt_units".to_string(), Value::from(units));
            }
        }
        summary
    }
}

/// Prompt in one of the shapes completion APIs accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    /// Plain text; one unit is one character
    Text(String),
    /// Token ids or a batch of strings; one unit is one element
    Units(Vec<Value>),
    /// Any other shape, forwarded as-is and never truncated
    Other(Value),
}

impl Prompt {
    pub fn unit_count(&self) -> usize {
        match self {
            Prompt::Text(text) => text.chars().count(),
            Prompt::Units(units) => units.len(),
            Prompt::Other(_) => 0,
        }
    }

    /// Keep only the last `limit` units, dropping from the front.
    ///
    /// Prompts with at most `limit` units are unchanged. A limit of zero keeps
    /// the whole prompt.
    pub fn keep_last(&mut self, limit: usize) {
        if limit == 0 {
            return;
        }
        match self {
            Prompt::Text(text) => {
                let count = text.chars().count();
                if count > limit {
                    if let Some((start, _)) = text.char_indices().nth(count - limit) {
                        text.drain(..start);
                    }
                }
            }
            Prompt::Units(units) => {
                if units.len() > limit {
                    let excess = units.len() - limit;
                    units.drain(..excess);
                }
            }
            Prompt::Other(_) => {}
        }
    }
}

/// JSON truthiness: `false`, `null`, `0`, `""`, `[]` and `{}` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A key that is present maps to `Some`, even when its value is `null`.
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Placeholder credential handed to the editor client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStub {
    pub token: String,
    pub expires_at: i64,
    pub refresh_in: i64,
}

impl TokenStub {
    pub const TOKEN: &'static str = "1316850460";
    pub const EXPIRES_AT: i64 = 2_600_000_000;
    pub const REFRESH_IN: i64 = 1800;

    pub fn placeholder() -> Self {
        Self {
            token: Self::TOKEN.to_string(),
            expires_at: Self::EXPIRES_AT,
            refresh_in: Self::REFRESH_IN,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: Option<String>,
}
