// Conversation history -> chat-completions wire messages

use pricelens_core::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Local notices such as error lines. Never sent to the service.
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One entry of the local conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, text: text.into() }
    }
}

/// Message as sent in the `messages` array of a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

/// Map history to wire messages in order, skipping local `System` notices.
/// A non-empty `system_prompt` is prepended as the first message.
pub fn format_messages(history: &[ChatMessage], system_prompt: Option<&str>) -> Vec<WireMessage> {
    let prompt = system_prompt.filter(|p| !p.is_empty());
    let mut out = Vec::with_capacity(history.len() + usize::from(prompt.is_some()));

    if let Some(prompt) = prompt {
        out.push(WireMessage { role: Role::System, content: prompt.to_string() });
    }

    out.extend(
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage { role: m.role, content: m.text.clone() }),
    );
    out
}

/// Like [`format_messages`] for untyped history, e.g. read from a JSON file.
///
/// Each entry needs a string `text` plus either a `role` of `"user"`,
/// `"assistant"` or `"system"`, or a boolean `isBot`.
pub fn format_value(history: &Value, system_prompt: Option<&str>) -> Result<Vec<WireMessage>, ApiError> {
    let items = history
        .as_array()
        .ok_or_else(|| ApiError::validation("messages must be an array"))?;

    let messages = items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_entry(idx, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(format_messages(&messages, system_prompt))
}

fn parse_entry(idx: usize, item: &Value) -> Result<ChatMessage, ApiError> {
    let obj = item
        .as_object()
        .ok_or_else(|| ApiError::validation(format!("message {} is not an object", idx + 1)))?;

    let text = obj
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::validation(format!("message {} has no text", idx + 1)))?;

    let role = match (obj.get("role"), obj.get("isBot")) {
        (Some(role), _) => serde_json::from_value::<Role>(role.clone()).map_err(|_| {
            ApiError::validation(format!("message {} has an unknown role: {}", idx + 1, role))
        })?,
        (None, Some(Value::Bool(true))) => Role::Assistant,
        (None, Some(Value::Bool(false))) => Role::User,
        _ => {
            return Err(ApiError::validation(format!("message {} has no role", idx + 1)));
        }
    };

    Ok(ChatMessage { role, text: text.to_string() })
}
