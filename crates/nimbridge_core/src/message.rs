use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Roles an injected message can carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of an OpenAI-style chat conversation.
///
/// The role stays a plain string and unknown fields (`name`, `tool_calls`, ...)
/// are kept in `extra`, so a message that passes through the proxy untouched
/// serializes back to what the client sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Build a plain text message.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: Value::String(text.into()),
            extra: Map::new(),
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role.as_str()
    }

    /// Text view of the content.
    ///
    /// String content is returned as is; an array of content parts yields its
    /// `text` parts joined by newlines; anything else is empty.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }

    /// Copy of this message with `text` added after `separator`.
    ///
    /// Content-part arrays get a new text part instead of string concatenation.
    pub fn with_appended_text(&self, separator: &str, text: &str) -> Self {
        let content = match &self.content {
            Value::Array(parts) => {
                let mut parts = parts.clone();
                parts.push(serde_json::json!({ "type": "text", "text": text }));
                Value::Array(parts)
            }
            Value::Null => Value::String(format!("{}{}", separator, text)),
            Value::String(s) => Value::String(format!("{}{}{}", s, separator, text)),
            other => Value::String(format!("{}{}{}", other, separator, text)),
        };
        Self {
            role: self.role.clone(),
            content,
            extra: self.extra.clone(),
        }
    }
}
