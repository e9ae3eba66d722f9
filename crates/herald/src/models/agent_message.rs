use serde::{Deserialize, Serialize};

pub const TEXT_PLAIN: &str = "text/plain";

fn default_content_type() -> String {
    TEXT_PLAIN.to_string()
}

/// A single piece of an agent message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

impl MessagePart {
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            content_type: default_content_type(),
        }
    }
}

/// The envelope exchanged between the coordinator and agent services.
///
/// Success and degraded results share this shape: a unit that could not do its work still
/// answers with a message whose text describes the problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl AgentMessage {
    /// Create a message holding a single text part
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            parts: vec![MessagePart::text(content)],
        }
    }

    pub fn with_part(mut self, part: MessagePart) -> Self {
        self.parts.push(part);
        self
    }

    /// Content of the first part, if there is one
    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().map(|part| part.content.as_str())
    }
}

/// The input an agent unit acts on: the first part of the first message.
pub fn first_input_text(messages: &[AgentMessage]) -> Option<&str> {
    messages.first()?.first_text()
}
