//! Agent run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on tool-calling iterations per run.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default context window budget for the transcript, in tokens.
pub const DEFAULT_CONTEXT_WINDOW_TOKENS: usize = 80_000;

/// Default per-response output token cap.
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 8_192;

/// Configuration for one agent run.
///
/// Created at subagent-creation time and immutable once a run is in
/// progress; the manager hands the runtime a clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique name among live subagents.
    pub name: String,
    /// System prompt defining the agent's role.
    pub system_prompt: String,
    /// Model identifier passed through to the provider.
    pub model: String,
    /// Names of the tools this agent may invoke.
    pub tools: Vec<String>,
    pub max_iterations: usize,
    /// Tools whose invocation ends the run successfully.
    pub termination_tools: Vec<String>,
    /// When set, a run that never invokes a termination tool fails even if
    /// the model produces a final answer.
    pub require_termination_tool: bool,
    pub context_window_tokens: usize,
    pub max_output_tokens: usize,
    pub temperature: f32,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            model: model.into(),
            tools: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            termination_tools: Vec::new(),
            require_termination_tool: false,
            context_window_tokens: DEFAULT_CONTEXT_WINDOW_TOKENS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: 1.0,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_termination_tools(mut self, tools: Vec<String>) -> Self {
        self.termination_tools = tools;
        self
    }

    pub fn with_require_termination_tool(mut self, required: bool) -> Self {
        self.require_termination_tool = required;
        self
    }

    pub fn with_context_window_tokens(mut self, tokens: usize) -> Self {
        self.context_window_tokens = tokens;
        self
    }

    pub fn is_termination_tool(&self, name: &str) -> bool {
        self.termination_tools.iter().any(|t| t == name)
    }
}

/// Timeouts applied at the runtime's suspension points.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeTimeouts {
    pub model_call: Duration,
    pub tool_call: Duration,
}

impl Default for RuntimeTimeouts {
    fn default() -> Self {
        Self {
            model_call: crate::ai::client::DEFAULT_CALL_TIMEOUT,
            tool_call: crate::tools::registry::DEFAULT_TOOL_TIMEOUT,
        }
    }
}
