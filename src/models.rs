/// Wire types for the relay endpoint.
/// The inbound shape is what the extension sends; the outbound shape is the
/// upstream chat-completions payload. Message contents are pure payload and
/// are never inspected beyond shape validation.
use serde::{Deserialize, Serialize};

/// A single turn in the conversation. Position within the request list is
/// conversational order and is preserved verbatim on the way upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking ("system", "user", "assistant"). Must be non-empty.
    pub role: String,
    /// The message text. May be empty.
    pub content: String,
}

/// The inbound body for `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_tokens() -> u32 {
    500
}

impl ChatRequest {
    /// Shape checks the deserializer can't express. Collects every violation
    /// so the caller sees the full list in one round trip rather than one
    /// field at a time.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        if self.messages.is_empty() {
            violations.push("messages: must contain at least one message".to_string());
        }
        for (i, message) in self.messages.iter().enumerate() {
            if message.role.is_empty() {
                violations.push(format!("messages[{i}].role: must be non-empty"));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// The outbound body sent to the upstream completions endpoint. Borrows the
/// inbound messages so they are serialized verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f64,
    pub max_tokens: u32,
}
