//! Tool registry for managing available tools
//!
//! Every capability the model can invoke implements `Tool`. Execution is
//! routed by name lookup; failures never cross the `execute` boundary as
//! errors - they become `ToolResult { is_error: true }` with a structured
//! envelope the model can read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::ai::types::AiTool;

/// Default tool execution timeout (2 minutes)
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Tool execution result
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a success result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create a structured success envelope with `ok=true` and `data`.
    pub fn success_data(data: Value) -> Self {
        let envelope = serde_json::json!({ "ok": true, "data": data });
        Self {
            output: envelope.to_string(),
            is_error: false,
        }
    }

    /// Create a structured error with explicit code.
    pub fn error_with_code(code: &str, msg: impl std::fmt::Display) -> Self {
        let envelope = serde_json::json!({
            "ok": false,
            "error": { "code": code, "message": msg.to_string() }
        });
        Self {
            output: envelope.to_string(),
            is_error: true,
        }
    }

    /// Create an invalid-parameters error.
    pub fn invalid_parameters(msg: impl std::fmt::Display) -> Self {
        Self::error_with_code("invalid_parameters", msg)
    }

    /// Create an error result, classifying the code from the message.
    pub fn error(msg: impl std::fmt::Display) -> Self {
        let message = msg.to_string();
        let code = classify_error_code(&message);
        Self::error_with_code(code, message)
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::invalid_parameters(format!("Invalid parameters: {}", e)))
}

fn classify_error_code(message: &str) -> &'static str {
    let lower = message.to_ascii_lowercase();
    if lower.contains("invalid parameters")
        || lower.contains("missing field")
        || lower.contains("unknown field")
    {
        "invalid_parameters"
    } else if lower.contains("timed out") || lower.contains("timeout") {
        "timeout"
    } else if lower.contains("unknown tool") {
        "unknown_tool"
    } else if lower.contains("not found") {
        "not_found"
    } else {
        "tool_error"
    }
}

/// A callable capability: name, schema, async execute.
///
/// Implementations must encode every failure in the returned `ToolResult`;
/// a panic or `Err` escaping `execute` is a bug.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name within a registry / an agent's allowed set.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input.
    fn input_schema(&self) -> Value;

    /// Execute the tool with the provided input.
    async fn execute(&self, params: Value) -> ToolResult;
}

/// Registry of available tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool under its own name. Last registration wins.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a list of tool names into handles. Unknown names are an
    /// error for the caller (config validation), not for the model.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Tool>>, String> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            match self.get(name) {
                Some(tool) => resolved.push(tool),
                None => return Err(format!("unknown tool: {name}")),
            }
        }
        Ok(resolved)
    }

    /// Tool definitions for the given handles, as advertised to the model.
    pub fn definitions(tools: &[Arc<dyn Tool>]) -> Vec<AiTool> {
        tools
            .iter()
            .map(|t| AiTool {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name with a bounded timeout.
    ///
    /// Unknown tools and timeouts both come back as error results so the
    /// model can adapt; neither aborts the agent loop.
    pub async fn execute(&self, name: &str, params: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error_with_code("unknown_tool", format!("Unknown tool: {name}"));
        };
        execute_with_timeout(tool.as_ref(), params, self.timeout).await
    }
}

/// Execute one tool handle with a timeout bound.
pub async fn execute_with_timeout(
    tool: &dyn Tool,
    params: Value,
    timeout: Duration,
) -> ToolResult {
    match tokio::time::timeout(timeout, tool.execute(params)).await {
        Ok(result) => result,
        Err(_) => ToolResult::error_with_code(
            "timeout",
            format!("Tool '{}' timed out after {:?}", tool.name(), timeout),
        ),
    }
}
