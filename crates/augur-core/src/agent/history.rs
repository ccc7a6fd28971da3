//! Message history with token tracking and context truncation.
//!
//! The transcript sent to the model is bounded by a token budget. When the
//! estimate exceeds the budget, the oldest non-system messages are dropped —
//! always a whole tool-call/tool-result pair at a time, never one half — and
//! a single synthetic marker message records the omission. The system prompt
//! is held separately and is never dropped.

use crate::ai::types::{Content, ModelMessage, Role};

/// Rough chars-per-token divisor for budget estimates.
const CHARS_PER_TOKEN: usize = 4;

/// Fixed per-message overhead in the estimate (role, framing).
const MESSAGE_OVERHEAD_TOKENS: usize = 8;

const TRUNCATION_MARKER: &str = "[Earlier history has been truncated.]";

/// Ordered, append-only conversation transcript with a token budget.
pub struct MessageHistory {
    system: String,
    messages: Vec<ModelMessage>,
    budget_tokens: usize,
    truncated: bool,
}

impl MessageHistory {
    pub fn new(system: impl Into<String>, budget_tokens: usize) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
            budget_tokens,
            truncated: false,
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message. Never rejected; the budget is enforced when the
    /// payload is built.
    pub fn append(&mut self, message: ModelMessage) {
        self.messages.push(message);
    }

    /// Estimated token footprint of the current transcript (system included).
    pub fn estimated_tokens(&self) -> usize {
        let mut total = self.system.len() / CHARS_PER_TOKEN;
        for message in &self.messages {
            total += estimate_message(message);
        }
        total
    }

    /// Truncate, then return the ordered transcript for the model.
    ///
    /// The returned sequence is always syntactically valid: the marker (if
    /// any) leads, every retained tool call still has its result, and
    /// relative order is untouched.
    pub fn to_request_payload(&mut self) -> Vec<ModelMessage> {
        self.truncate();
        self.messages.clone()
    }

    /// Drop oldest message groups until the estimate fits the budget.
    ///
    /// A group is either a single plain message or an assistant message
    /// carrying tool calls together with the following tool-result message.
    /// The most recent message is always retained.
    pub fn truncate(&mut self) {
        while self.estimated_tokens() > self.budget_tokens {
            // Index 0 may be the marker from an earlier truncation.
            let start = usize::from(self.truncated);
            if self.messages.len().saturating_sub(start) <= 1 {
                break;
            }

            let group = self.group_len_at(start);
            if start + group >= self.messages.len() {
                break;
            }
            self.messages.drain(start..start + group);

            if !self.truncated {
                self.truncated = true;
                self.messages
                    .insert(0, ModelMessage::text(Role::User, TRUNCATION_MARKER));
            }
        }
    }

    /// Number of messages forming one droppable group starting at `index`.
    fn group_len_at(&self, index: usize) -> usize {
        let message = &self.messages[index];
        if message.has_tool_use() {
            // The paired result message directly follows the call.
            if self
                .messages
                .get(index + 1)
                .is_some_and(|next| next.has_tool_result())
            {
                return 2;
            }
        }
        1
    }

    #[cfg(test)]
    fn was_truncated(&self) -> bool {
        self.truncated
    }
}

fn estimate_message(message: &ModelMessage) -> usize {
    let mut chars = 0;
    for block in &message.content {
        chars += match block {
            Content::Text { text } => text.len(),
            Content::ToolUse { name, input, .. } => name.len() + input.to_string().len(),
            Content::ToolResult { output, .. } => match output {
                serde_json::Value::String(s) => s.len(),
                other => other.to_string().len(),
            },
        };
    }
    chars / CHARS_PER_TOKEN + MESSAGE_OVERHEAD_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn call_pair(id: &str, payload_chars: usize) -> (ModelMessage, ModelMessage) {
        let call = ModelMessage {
            role: Role::Assistant,
            content: vec![Content::ToolUse {
                id: id.to_string(),
                name: "web_search".to_string(),
                input: json!({"query_text": "x".repeat(payload_chars)}),
            }],
        };
        let result = ModelMessage {
            role: Role::User,
            content: vec![Content::ToolResult {
                tool_use_id: id.to_string(),
                output: Value::String("y".repeat(payload_chars)),
                is_error: None,
            }],
        };
        (call, result)
    }

    /// Every retained ToolUse id has a matching ToolResult id and vice versa.
    fn assert_pairing_intact(messages: &[ModelMessage]) {
        let mut calls = Vec::new();
        let mut results = Vec::new();
        for message in messages {
            for block in &message.content {
                match block {
                    Content::ToolUse { id, .. } => calls.push(id.clone()),
                    Content::ToolResult { tool_use_id, .. } => results.push(tool_use_id.clone()),
                    Content::Text { .. } => {}
                }
            }
        }
        calls.sort();
        results.sort();
        assert_eq!(calls, results, "tool call/result pairing was split");
    }

    #[test]
    fn no_truncation_under_budget() {
        let mut history = MessageHistory::new("sys", 10_000);
        history.append(ModelMessage::text(Role::User, "hello"));
        history.append(ModelMessage::text(Role::Assistant, "world"));

        let payload = history.to_request_payload();
        assert_eq!(payload.len(), 2);
        assert!(!history.was_truncated());
    }

    #[test]
    fn drops_pairs_together_and_inserts_single_marker() {
        let mut history = MessageHistory::new("sys", 300);
        history.append(ModelMessage::text(Role::User, "task"));
        for i in 0..6 {
            let (call, result) = call_pair(&format!("call_{i}"), 400);
            history.append(call);
            history.append(result);
        }
        history.append(ModelMessage::text(Role::Assistant, "final answer"));

        let payload = history.to_request_payload();
        assert!(history.was_truncated());
        assert_pairing_intact(&payload);

        let markers = payload
            .iter()
            .filter(|m| m.text_content() == TRUNCATION_MARKER)
            .count();
        assert_eq!(markers, 1, "marker must not stack");
        assert_eq!(payload[0].text_content(), TRUNCATION_MARKER);
        assert_eq!(
            payload.last().unwrap().text_content(),
            "final answer",
            "most recent message is always retained"
        );
    }

    #[test]
    fn orphan_result_is_never_retained() {
        let mut history = MessageHistory::new("sys", 160);
        let (call, result) = call_pair("call_0", 600);
        history.append(call);
        history.append(result);
        history.append(ModelMessage::text(Role::Assistant, "done"));

        let payload = history.to_request_payload();
        assert_pairing_intact(&payload);
        assert!(payload
            .iter()
            .all(|m| !m.has_tool_result() && !m.has_tool_use()));
    }

    #[test]
    fn repeated_truncations_reuse_the_marker() {
        let mut history = MessageHistory::new("sys", 250);
        for i in 0..4 {
            let (call, result) = call_pair(&format!("a{i}"), 500);
            history.append(call);
            history.append(result);
        }
        let _ = history.to_request_payload();

        for i in 0..4 {
            let (call, result) = call_pair(&format!("b{i}"), 500);
            history.append(call);
            history.append(result);
        }
        let payload = history.to_request_payload();

        let markers = payload
            .iter()
            .filter(|m| m.text_content() == TRUNCATION_MARKER)
            .count();
        assert_eq!(markers, 1);
        assert_pairing_intact(&payload);
    }

    #[test]
    fn order_is_preserved_after_truncation() {
        let mut history = MessageHistory::new("sys", 400);
        for i in 0..8 {
            history.append(ModelMessage::text(Role::User, format!("msg {i} {}", "x".repeat(200))));
        }
        let payload = history.to_request_payload();

        let texts: Vec<String> = payload
            .iter()
            .filter(|m| m.text_content() != TRUNCATION_MARKER)
            .map(|m| m.text_content())
            .collect();
        let mut sorted = texts.clone();
        sorted.sort();
        // Message numbers are single-digit and zero-padded by construction,
        // so lexical order equals append order.
        assert_eq!(texts, sorted);
    }
}
