//! Result reporting tool.
//!
//! The stock termination tool: a subagent calls it to hand its findings
//! back to the coordinator, and configs usually list it in
//! `termination_tools`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolResult};

pub struct ReportResultsTool;

impl ReportResultsTool {
    pub const NAME: &'static str = "report_results";
}

#[derive(Deserialize)]
struct ReportParams {
    task_status: String,
    findings: String,
    #[serde(default)]
    recommendations: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    80.0
}

#[async_trait]
impl Tool for ReportResultsTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Report findings and results back to the coordinator. Use this when the assigned task is complete."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_status": {
                    "type": "string",
                    "enum": ["completed", "partially_completed", "failed"],
                    "description": "Status of the assigned task."
                },
                "findings": {
                    "type": "string",
                    "description": "Key findings, results, or data discovered during task execution."
                },
                "recommendations": {
                    "type": "string",
                    "description": "Recommendations for next steps (optional)."
                },
                "confidence": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 100,
                    "description": "Confidence in the findings, 0-100 (optional)."
                }
            },
            "required": ["task_status", "findings"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: ReportParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if !matches!(
            params.task_status.as_str(),
            "completed" | "partially_completed" | "failed"
        ) {
            return ToolResult::invalid_parameters(format!(
                "Invalid parameters: unknown task_status '{}'",
                params.task_status
            ));
        }

        ToolResult::success_data(json!({
            "task_status": params.task_status,
            "findings": params.findings,
            "recommendations": params.recommendations,
            "confidence": params.confidence,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_the_report_back() {
        let result = ReportResultsTool
            .execute(json!({
                "task_status": "completed",
                "findings": "base rate is 40%",
                "confidence": 65,
            }))
            .await;
        assert!(!result.is_error);
        assert!(result.output.contains("base rate is 40%"));
    }

    #[tokio::test]
    async fn rejects_unknown_status() {
        let result = ReportResultsTool
            .execute(json!({"task_status": "done", "findings": "x"}))
            .await;
        assert!(result.is_error);
    }
}
