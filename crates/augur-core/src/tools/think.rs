//! Reflection scratchpad tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolResult};

/// Lets the model write out intermediate reasoning without side effects.
pub struct ThinkTool;

impl ThinkTool {
    pub const NAME: &'static str = "think";
}

#[derive(Deserialize)]
struct ThinkParams {
    thought: String,
}

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Use the tool to think through a problem step by step. The thought is recorded but has no side effects."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "The reasoning step to record."
                }
            },
            "required": ["thought"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: ThinkParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        tracing::debug!(chars = params.thought.len(), "think step recorded");
        ToolResult::success("Thought recorded.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds_with_a_thought() {
        let result = ThinkTool.execute(json!({"thought": "hmm"})).await;
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn missing_thought_is_invalid_parameters() {
        let result = ThinkTool.execute(json!({})).await;
        assert!(result.is_error);
        assert!(result.output.contains("invalid_parameters"));
    }
}
