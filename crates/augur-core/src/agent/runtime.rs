//! Agent runtime — the single bounded tool-calling loop.
//!
//! One `AgentRuntime` drives one conversation to a terminal state: submit
//! the transcript, interpret the response as a final answer or a batch of
//! tool invocations, execute the batch concurrently, append the call/result
//! pairs, and repeat. Termination comes from a final answer, a termination
//! tool, the iteration bound, retry exhaustion, or cooperative cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::config::{AgentConfig, RuntimeTimeouts};
use crate::agent::executor::execute_tools;
use crate::agent::history::MessageHistory;
use crate::ai::client::ModelClient;
use crate::ai::retry::{with_retry, RetryConfig};
use crate::ai::types::{ModelMessage, ModelRequest, ModelResponse, Role};
use crate::tools::registry::{Tool, ToolRegistry};

/// Terminal classification of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Natural completion: a final text answer with no pending policy.
    Completed,
    /// A termination tool was invoked.
    Terminated,
    /// Iteration bound, termination policy, provider failure, or cancellation.
    Failed,
}

/// What a finished run reports back to its supervisor.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Machine-readable reason, e.g. `natural_completion`,
    /// `termination_tool_called (report_results)`, `max_iterations_reached`.
    pub termination_reason: String,
    /// Final assistant text, when the run produced one.
    pub final_text: Option<String>,
    pub iterations: usize,
    pub total_tokens: usize,
    /// Last provider/tool error for failed runs.
    pub error: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed | RunOutcome::Terminated)
    }
}

/// One bounded conversational loop instance.
pub struct AgentRuntime {
    config: AgentConfig,
    client: Arc<dyn ModelClient>,
    tools: Vec<Arc<dyn Tool>>,
    tool_map: HashMap<String, Arc<dyn Tool>>,
    timeouts: RuntimeTimeouts,
    retry: RetryConfig,
    cancel: CancellationToken,
    history: MessageHistory,
    iteration_count: usize,
    total_tokens: usize,
}

impl AgentRuntime {
    pub fn new(config: AgentConfig, client: Arc<dyn ModelClient>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let tool_map = tools
            .iter()
            .map(|t| (t.name().to_string(), Arc::clone(t)))
            .collect();
        let history = MessageHistory::new(&config.system_prompt, config.context_window_tokens);
        Self {
            config,
            client,
            tools,
            tool_map,
            timeouts: RuntimeTimeouts::default(),
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
            history,
            iteration_count: 0,
            total_tokens: 0,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeouts(mut self, timeouts: RuntimeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Execute the loop to a terminal state.
    pub async fn run(&mut self, task_input: &str) -> RunReport {
        tracing::info!(agent = %self.config.name, "run started");
        self.history
            .append(ModelMessage::text(Role::User, task_input));

        let definitions = ToolRegistry::definitions(&self.tools);
        let mut termination_invoked = false;

        loop {
            if self.iteration_count >= self.config.max_iterations {
                return self.fail("max_iterations_reached", None);
            }
            if self.cancel.is_cancelled() {
                return self.fail("cancelled", None);
            }

            let request = ModelRequest {
                model: self.config.model.clone(),
                system: self.history.system().to_string(),
                messages: self.history.to_request_payload(),
                tools: definitions.clone(),
                max_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
            };

            let response = match self.call_model(&request).await {
                Ok(response) => response,
                Err(reason) => {
                    if self.cancel.is_cancelled() {
                        return self.fail("cancelled", Some(reason));
                    }
                    return self.fail("provider_error", Some(reason));
                }
            };

            self.total_tokens += response.usage.total_tokens;
            self.history.append(response.to_assistant_message());

            if response.tool_calls.is_empty() {
                // Natural completion, unless the policy demanded an explicit
                // termination tool that was never invoked.
                if self.config.require_termination_tool && !termination_invoked {
                    return self.fail("termination_tool_required_but_not_called", None);
                }
                return self.finish(
                    RunOutcome::Completed,
                    "natural_completion",
                    Some(response.text),
                );
            }

            self.iteration_count += 1;
            tracing::debug!(
                agent = %self.config.name,
                iteration = self.iteration_count,
                calls = response.tool_calls.len(),
                "executing tool batch"
            );

            let results =
                execute_tools(&response.tool_calls, &self.tool_map, self.timeouts.tool_call).await;
            self.history.append(ModelMessage {
                role: Role::User,
                content: results,
            });

            // The termination tool's own result is recorded above before the
            // run ends.
            if let Some(call) = response
                .tool_calls
                .iter()
                .find(|c| self.config.is_termination_tool(&c.name))
            {
                termination_invoked = true;
                return self.finish(
                    RunOutcome::Terminated,
                    &format!("termination_tool_called ({})", call.name),
                    None,
                );
            }

            if self.cancel.is_cancelled() {
                return self.fail("cancelled", None);
            }
        }
    }

    /// One model call, bounded by the per-call timeout, the retry policy,
    /// and cancellation. A timed-out attempt counts as a transient failure.
    async fn call_model(&self, request: &ModelRequest) -> Result<ModelResponse, String> {
        let call = with_retry(&self.retry, &self.cancel, || async {
            match tokio::time::timeout(self.timeouts.model_call, self.client.complete(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(crate::error::ProviderError::Transient {
                    status: None,
                    message: format!(
                        "model call timed out after {:?}",
                        self.timeouts.model_call
                    ),
                    retry_after: None,
                }),
            }
        });

        tokio::select! {
            result = call => result.map_err(|e| e.to_string()),
            _ = self.cancel.cancelled() => Err("cancelled".to_string()),
        }
    }

    fn finish(
        &self,
        outcome: RunOutcome,
        reason: &str,
        final_text: Option<String>,
    ) -> RunReport {
        tracing::info!(
            agent = %self.config.name,
            ?outcome,
            reason,
            iterations = self.iteration_count,
            total_tokens = self.total_tokens,
            "run finished"
        );
        RunReport {
            outcome,
            termination_reason: reason.to_string(),
            final_text: final_text.filter(|t| !t.is_empty()),
            iterations: self.iteration_count,
            total_tokens: self.total_tokens,
            error: None,
        }
    }

    fn fail(&self, reason: &str, error: Option<String>) -> RunReport {
        tracing::warn!(
            agent = %self.config.name,
            reason,
            error = error.as_deref().unwrap_or(""),
            iterations = self.iteration_count,
            "run failed"
        );
        RunReport {
            outcome: RunOutcome::Failed,
            termination_reason: reason.to_string(),
            final_text: None,
            iterations: self.iteration_count,
            total_tokens: self.total_tokens,
            error,
        }
    }
}
