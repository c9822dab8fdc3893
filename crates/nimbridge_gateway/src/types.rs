use nimbridge_core::ChatMessage;
use nimbridge_rules::VariableValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound OpenAI chat completion request.
///
/// Only the fields the proxy touches are typed; everything else (temperature,
/// tools, stop sequences...) rides along in `extra` and is forwarded as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionRequest {
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}

/// One entry of `GET /v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            object: "model".into(),
            created,
            owned_by: "nvidia".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub rule_sets: usize,
    pub enabled_rule_sets: usize,
    pub turn_count: u64,
}

/// Body of `POST /rulesets/{name}/toggle`. No `enabled` flips the flag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToggleRequest {
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableUpdate {
    pub value: VariableValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchUpdate {
    pub value: bool,
}
