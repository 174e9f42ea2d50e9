//! Core types for model interactions

use serde::{Deserialize, Serialize};

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    #[default]
    Stop,
    /// Maximum tokens reached
    Length,
    /// Tool use requested
    ToolUse,
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

/// Content blocks in messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text content
    Text { text: String },
    /// Tool invocation requested by the model
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Outcome of a tool invocation, sent back to the model
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Content {
    /// Create text content
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool use block
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a tool result block
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// Get text if this is text content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Conversation messages sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// User turn (plain text or tool results)
    User { content: Vec<Content> },
    /// Assistant turn
    Assistant { content: Vec<Content> },
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![Content::text(text)],
        }
    }

    /// Get the role as a string
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    /// Get the content blocks
    pub fn content(&self) -> &[Content] {
        match self {
            Self::User { content } | Self::Assistant { content } => content,
        }
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.content()
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (used in API calls)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for the input
    pub parameters: serde_json::Value,
}

impl Tool {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool invocation returned by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// One request to the model
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Model identifier (e.g. "claude-sonnet-4-5")
    pub model: String,
    /// System prompt
    pub system_prompt: Option<String>,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// Tool catalog
    pub tools: Vec<Tool>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

/// A completed model response, split into text blocks and tool-use blocks
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub text_blocks: Vec<String>,
    pub tool_uses: Vec<ToolUse>,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl ModelResponse {
    /// A text-only response
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text_blocks: vec![text.into()],
            ..Default::default()
        }
    }

    /// A response containing the given tool invocations
    pub fn from_tool_uses(tool_uses: Vec<ToolUse>) -> Self {
        Self {
            tool_uses,
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        }
    }

    /// Combined text of all text blocks
    pub fn text(&self) -> String {
        self.text_blocks.join("\n").trim().to_string()
    }

    /// Rebuild the assistant message this response represents
    pub fn to_message(&self) -> Message {
        let mut content: Vec<Content> = self
            .text_blocks
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(Content::text)
            .collect();
        content.extend(
            self.tool_uses
                .iter()
                .map(|u| Content::tool_use(&u.id, &u.name, u.input.clone())),
        );
        Message::Assistant { content }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_blocks() {
        let resp = ModelResponse {
            text_blocks: vec!["Done.".into(), "Anything else?".into()],
            ..Default::default()
        };
        assert_eq!(resp.text(), "Done.\nAnything else?");
    }

    #[test]
    fn test_response_to_message_keeps_tool_order() {
        let resp = ModelResponse {
            text_blocks: vec!["Checking".into()],
            tool_uses: vec![
                ToolUse {
                    id: "a".into(),
                    name: "search".into(),
                    input: serde_json::json!({}),
                },
                ToolUse {
                    id: "b".into(),
                    name: "update".into(),
                    input: serde_json::json!({}),
                },
            ],
            ..Default::default()
        };
        let msg = resp.to_message();
        assert_eq!(msg.role(), "assistant");
        let names: Vec<&str> = msg
            .content()
            .iter()
            .filter_map(|c| match c {
                Content::ToolUse { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["search", "update"]);
        assert_eq!(msg.text(), "Checking");
    }

    #[test]
    fn test_content_serde_tagging() {
        let c = Content::tool_result("t1", "{\"ok\":true}", false);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["tool_use_id"], "t1");
    }
}
