//! Tool execution for the agent loop.
//!
//! Tool invocations emitted in one model turn are independent by
//! construction, so they execute concurrently; results come back in the
//! order the model emitted the calls. Every failure mode — unknown tool,
//! tool error, timeout — is a failed `ToolResult`, never a fault.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;

use crate::ai::types::{AiToolCall, Content};
use crate::tools::registry::{execute_with_timeout, Tool, ToolResult};

const MAX_TOOL_OUTPUT_CHARS: usize = 30_000;

/// Execute a batch of tool calls concurrently.
///
/// Returns one `Content::ToolResult` per call, in call order.
pub(crate) async fn execute_tools(
    tool_calls: &[AiToolCall],
    tools: &HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
) -> Vec<Content> {
    let futures = tool_calls.iter().map(|call| {
        let tool = tools.get(&call.name).cloned();
        async move {
            let result = match tool {
                Some(tool) => {
                    execute_with_timeout(tool.as_ref(), call.arguments.clone(), timeout).await
                }
                None => ToolResult::error_with_code(
                    "unknown_tool",
                    format!("Unknown tool: {}", call.name),
                ),
            };

            tracing::debug!(
                tool = %call.name,
                is_error = result.is_error,
                "tool executed"
            );

            Content::ToolResult {
                tool_use_id: call.id.clone(),
                output: Value::String(truncate_output(&result.output)),
                is_error: if result.is_error { Some(true) } else { None },
            }
        }
    });

    join_all(futures).await
}

pub(crate) fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_TOOL_OUTPUT_CHARS {
        return output.to_string();
    }

    let truncated_len = floor_char_boundary(output, MAX_TOOL_OUTPUT_CHARS);
    let truncated = &output[..truncated_len];
    let break_point = truncated.rfind('\n').unwrap_or(truncated_len);
    let clean = &output[..break_point];
    format!(
        "{}\n\n[... OUTPUT TRUNCATED: {} chars -> {} chars ...]",
        clean,
        output.len(),
        clean.len()
    )
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct NamedEcho(&'static str);

    #[async_trait]
    impl Tool for NamedEcho {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            ""
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, params: Value) -> ToolResult {
            ToolResult::success(format!("{}:{}", self.0, params["n"]))
        }
    }

    fn tool_map(tools: Vec<Arc<dyn Tool>>) -> HashMap<String, Arc<dyn Tool>> {
        tools
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect()
    }

    #[tokio::test]
    async fn results_come_back_in_call_order() {
        let tools = tool_map(vec![Arc::new(NamedEcho("a")), Arc::new(NamedEcho("b"))]);
        let calls = vec![
            AiToolCall {
                id: "1".into(),
                name: "b".into(),
                arguments: json!({"n": 1}),
            },
            AiToolCall {
                id: "2".into(),
                name: "a".into(),
                arguments: json!({"n": 2}),
            },
        ];

        let results = execute_tools(&calls, &tools, Duration::from_secs(5)).await;
        assert_eq!(results.len(), 2);
        let ids: Vec<&str> = results
            .iter()
            .map(|r| match r {
                Content::ToolResult { tool_use_id, .. } => tool_use_id.as_str(),
                _ => panic!("expected tool result"),
            })
            .collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result() {
        let tools = tool_map(vec![]);
        let calls = vec![AiToolCall {
            id: "1".into(),
            name: "ghost".into(),
            arguments: json!({}),
        }];

        let results = execute_tools(&calls, &tools, Duration::from_secs(5)).await;
        match &results[0] {
            Content::ToolResult { is_error, .. } => assert_eq!(*is_error, Some(true)),
            _ => panic!("expected tool result"),
        }
    }

    #[test]
    fn truncation_cuts_on_line_boundary() {
        let line = "x".repeat(100);
        let long = vec![line; 400].join("\n");
        let out = truncate_output(&long);
        assert!(out.len() < long.len());
        assert!(out.contains("OUTPUT TRUNCATED"));
        // The kept prefix ends at a full line, not mid-line.
        let kept = out.split("\n\n[... OUTPUT").next().unwrap();
        assert_eq!(kept.len() % 101, 100);
    }

    #[test]
    fn short_output_untouched() {
        assert_eq!(truncate_output("short"), "short");
    }
}
