//! Subagent control tool.
//!
//! The coordinator's surface over the `SubagentManager`: create named
//! configurations, launch them singly, in parallel, or as a sequential
//! batch, inspect their state, and retire them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::agent::config::AgentConfig;
use crate::agent::manager::{RunRequest, SubagentManager, SubagentStatus};
use crate::agent::runtime::RunReport;
use crate::error::ManagerError;
use crate::tools::registry::{parse_params, Tool, ToolResult};

pub struct SubagentManagerTool {
    manager: Arc<SubagentManager>,
    /// Default model for created subagents when the coordinator omits one.
    default_model: String,
}

impl SubagentManagerTool {
    pub const NAME: &'static str = "subagent_manager";

    pub fn new(manager: Arc<SubagentManager>, default_model: impl Into<String>) -> Self {
        Self {
            manager,
            default_model: default_model.into(),
        }
    }
}

#[derive(Deserialize)]
struct TaskSpec {
    name: String,
    input: String,
}

#[derive(Deserialize)]
struct SubagentParams {
    action: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    tools: Option<Vec<String>>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    max_iterations: Option<usize>,
    #[serde(default)]
    termination_tools: Option<Vec<String>>,
    #[serde(default)]
    require_termination_tool: Option<bool>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    tasks: Option<Vec<TaskSpec>>,
    #[serde(default)]
    stop_on_failure: Option<bool>,
}

#[async_trait]
impl Tool for SubagentManagerTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Manage subagents: create named agents with specific tools and goals, run them (singly, in parallel, or as a sequential batch), inspect their status, and delete them."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "run", "run_parallel", "run_batch", "delete", "status", "list"],
                    "description": "The action to perform on subagents."
                },
                "name": {
                    "type": "string",
                    "description": "Unique subagent name (required for create, run, delete, status)."
                },
                "system_prompt": {
                    "type": "string",
                    "description": "System prompt defining the subagent's role and goals (required for create)."
                },
                "tools": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Tool names this subagent may use (required for create). shared_memory is always included."
                },
                "model": {
                    "type": "string",
                    "description": "Model identifier for this subagent (optional for create; defaults to the coordinator's model)."
                },
                "max_iterations": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum tool-calling iterations (optional for create, default 10)."
                },
                "termination_tools": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Tools that end the run successfully when invoked (optional for create)."
                },
                "require_termination_tool": {
                    "type": "boolean",
                    "description": "Fail the run if it finishes without invoking a termination tool (optional for create)."
                },
                "input": {
                    "type": "string",
                    "description": "Task input for the run (required for run)."
                },
                "tasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "input": {"type": "string"}
                        },
                        "required": ["name", "input"]
                    },
                    "description": "Named runs to launch (required for run_parallel and run_batch)."
                },
                "stop_on_failure": {
                    "type": "boolean",
                    "description": "Stop a run_batch at the first failed run (optional, default false)."
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: SubagentParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match params.action.as_str() {
            "create" => self.create(params),
            "run" => self.run(params).await,
            "run_parallel" => self.run_parallel(params).await,
            "run_batch" => self.run_batch(params).await,
            "delete" => self.delete(params).await,
            "status" => self.status(params),
            "list" => self.list(),
            other => ToolResult::invalid_parameters(format!(
                "Invalid parameters: unknown action '{other}'"
            )),
        }
    }
}

impl SubagentManagerTool {
    fn create(&self, params: SubagentParams) -> ToolResult {
        let (Some(name), Some(system_prompt), Some(tools)) =
            (params.name, params.system_prompt, params.tools)
        else {
            return ToolResult::invalid_parameters(
                "Invalid parameters: create requires name, system_prompt and tools",
            );
        };

        let model = params.model.unwrap_or_else(|| self.default_model.clone());
        let mut config = AgentConfig::new(name.as_str(), system_prompt, model).with_tools(tools);
        if let Some(max_iterations) = params.max_iterations {
            config = config.with_max_iterations(max_iterations);
        }
        if let Some(termination_tools) = params.termination_tools {
            config = config.with_termination_tools(termination_tools);
        }
        if let Some(required) = params.require_termination_tool {
            config = config.with_require_termination_tool(required);
        }

        match self.manager.create(config) {
            Ok(()) => ToolResult::success_data(json!({ "created": name })),
            Err(err) => manager_error(err),
        }
    }

    async fn run(&self, params: SubagentParams) -> ToolResult {
        let (Some(name), Some(input)) = (params.name, params.input) else {
            return ToolResult::invalid_parameters(
                "Invalid parameters: run requires name and input",
            );
        };

        match self.manager.run(&name, &input).await {
            Ok(report) => ToolResult::success_data(report_json(&name, &report)),
            Err(err) => manager_error(err),
        }
    }

    async fn run_parallel(&self, params: SubagentParams) -> ToolResult {
        let Some(tasks) = params.tasks else {
            return ToolResult::invalid_parameters(
                "Invalid parameters: run_parallel requires tasks",
            );
        };
        let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        let requests = tasks
            .into_iter()
            .map(|t| RunRequest {
                name: t.name,
                input: t.input,
            })
            .collect();

        match self.manager.run_parallel(requests).await {
            Ok(reports) => {
                let data: Vec<Value> = names
                    .iter()
                    .zip(&reports)
                    .map(|(name, report)| report_json(name, report))
                    .collect();
                ToolResult::success_data(json!({ "reports": data }))
            }
            Err(err) => manager_error(err),
        }
    }

    async fn run_batch(&self, params: SubagentParams) -> ToolResult {
        let Some(tasks) = params.tasks else {
            return ToolResult::invalid_parameters("Invalid parameters: run_batch requires tasks");
        };
        let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        let requests = tasks
            .into_iter()
            .map(|t| RunRequest {
                name: t.name,
                input: t.input,
            })
            .collect();

        match self
            .manager
            .run_batch(requests, params.stop_on_failure.unwrap_or(false))
            .await
        {
            Ok(reports) => {
                let data: Vec<Value> = names
                    .iter()
                    .zip(&reports)
                    .map(|(name, report)| report_json(name, report))
                    .collect();
                ToolResult::success_data(json!({ "reports": data }))
            }
            Err(err) => manager_error(err),
        }
    }

    async fn delete(&self, params: SubagentParams) -> ToolResult {
        let Some(name) = params.name else {
            return ToolResult::invalid_parameters("Invalid parameters: delete requires name");
        };
        match self.manager.delete(&name).await {
            Ok(()) => ToolResult::success_data(json!({ "deleted": name })),
            Err(err) => manager_error(err),
        }
    }

    fn status(&self, params: SubagentParams) -> ToolResult {
        let Some(name) = params.name else {
            return ToolResult::invalid_parameters("Invalid parameters: status requires name");
        };
        match self.manager.status(&name) {
            Ok(status) => ToolResult::success_data(status_json(&status)),
            Err(err) => manager_error(err),
        }
    }

    fn list(&self) -> ToolResult {
        let statuses = self.manager.list();
        let data: Vec<Value> = statuses.iter().map(status_json).collect();
        ToolResult::success_data(json!({
            "count": data.len(),
            "available_slots": self.manager.available_slots(),
            "subagents": data,
        }))
    }
}

fn status_json(status: &SubagentStatus) -> Value {
    json!({
        "name": status.name,
        "state": status.state.to_string(),
        "model": status.model,
        "tools": status.tools,
        "last_termination_reason": status
            .last_report
            .as_ref()
            .map(|r| r.termination_reason.clone()),
    })
}

fn report_json(name: &str, report: &RunReport) -> Value {
    json!({
        "name": name,
        "succeeded": report.succeeded(),
        "termination_reason": report.termination_reason,
        "iterations": report.iterations,
        "total_tokens": report.total_tokens,
        "final_text": report.final_text,
        "error": report.error,
    })
}

fn manager_error(err: ManagerError) -> ToolResult {
    let code = match &err {
        ManagerError::NameConflict(_) => "name_conflict",
        ManagerError::CapacityExceeded { .. } => "capacity_exceeded",
        ManagerError::NotFound(_) => "not_found",
        ManagerError::InvalidState { .. } => "invalid_state",
        ManagerError::UnknownTool(_) => "unknown_tool",
    };
    ToolResult::error_with_code(code, err)
}
