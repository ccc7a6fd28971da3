//! AI SDK types for provider communication
//!
//! These are NOT domain types - they're specific to AI provider APIs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Tool call parsed from a model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Content types that can be in a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        output: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Unified message format for provider communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Vec<Content>,
}

impl ModelMessage {
    /// Build a plain text message.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![Content::Text { text: text.into() }],
        }
    }

    /// Concatenated text blocks, ignoring tool content.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let Content::Text { text } = block {
                out.push_str(text);
            }
        }
        out
    }

    /// Whether any block is a tool invocation.
    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, Content::ToolUse { .. }))
    }

    /// Whether any block is a tool result.
    pub fn has_tool_result(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, Content::ToolResult { .. }))
    }
}

/// Usage information from a provider response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: usize,
    #[serde(default)]
    pub completion_tokens: usize,
    #[serde(default)]
    pub total_tokens: usize,
}

/// One completed (non-streaming) model turn.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Text the model produced this turn, if any.
    pub text: String,
    /// Tool invocations requested this turn, in emission order.
    pub tool_calls: Vec<AiToolCall>,
    pub usage: Usage,
}

impl ModelResponse {
    /// Assemble the assistant message to append to history: text block
    /// first, then tool-use blocks in the order the model emitted them.
    pub fn to_assistant_message(&self) -> ModelMessage {
        let mut content =
            Vec::with_capacity(self.tool_calls.len() + usize::from(!self.text.is_empty()));

        if !self.text.is_empty() {
            content.push(Content::Text {
                text: self.text.clone(),
            });
        }

        for call in &self.tool_calls {
            content.push(Content::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.arguments.clone(),
            });
        }

        ModelMessage {
            role: Role::Assistant,
            content,
        }
    }
}

/// A fully prepared model request: the truncated transcript plus the tool
/// definitions the agent is allowed to use this turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<AiTool>,
    pub max_tokens: usize,
    pub temperature: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assistant_message_preserves_call_order() {
        let response = ModelResponse {
            text: "thinking".to_string(),
            tool_calls: vec![
                AiToolCall {
                    id: "a".into(),
                    name: "first".into(),
                    arguments: json!({}),
                },
                AiToolCall {
                    id: "b".into(),
                    name: "second".into(),
                    arguments: json!({}),
                },
            ],
            usage: Usage::default(),
        };

        let msg = response.to_assistant_message();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.len(), 3);
        assert!(matches!(&msg.content[0], Content::Text { text } if text == "thinking"));
        assert!(matches!(&msg.content[1], Content::ToolUse { name, .. } if name == "first"));
        assert!(matches!(&msg.content[2], Content::ToolUse { name, .. } if name == "second"));
    }

    #[test]
    fn text_content_skips_tool_blocks() {
        let msg = ModelMessage {
            role: Role::Assistant,
            content: vec![
                Content::Text { text: "a".into() },
                Content::ToolUse {
                    id: "1".into(),
                    name: "t".into(),
                    input: json!({}),
                },
                Content::Text { text: "b".into() },
            ],
        };
        assert_eq!(msg.text_content(), "ab");
        assert!(msg.has_tool_use());
        assert!(!msg.has_tool_result());
    }
}
