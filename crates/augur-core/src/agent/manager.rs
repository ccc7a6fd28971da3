//! Subagent manager
//!
//! Owns the catalog of named agent configurations, their run states, and the
//! global concurrency ceiling. State transitions happen only here; the
//! runtimes it supervises report outcomes back through it. Parallel batch
//! admission is all-or-nothing: either every requested run is admitted or
//! none is.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::agent::config::{AgentConfig, RuntimeTimeouts};
use crate::agent::runtime::{AgentRuntime, RunOutcome, RunReport};
use crate::ai::client::ModelClient;
use crate::ai::retry::RetryConfig;
use crate::error::ManagerError;
use crate::memory::{MemoryCategory, MemoryStore};
use crate::tools::memory_tool::SharedMemoryTool;
use crate::tools::registry::{Tool, ToolRegistry};
use crate::tools::report::ReportResultsTool;

/// Fixed ceiling on simultaneously running subagents.
pub const DEFAULT_CONCURRENCY_CEILING: usize = 5;

/// Lifecycle state of a named subagent config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Completed,
    /// Ended via a termination tool.
    Terminated,
    Failed,
    Deleted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Created => "created",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Terminated => "terminated",
            RunState::Failed => "failed",
            RunState::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

/// Read-only view of a registered subagent.
#[derive(Debug, Clone)]
pub struct SubagentStatus {
    pub name: String,
    pub state: RunState,
    pub model: String,
    pub tools: Vec<String>,
    pub last_report: Option<RunReport>,
}

/// One launch request for `run_parallel` / `run_batch`.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub name: String,
    pub input: String,
}

struct SlotState {
    run_state: RunState,
    cancel: Option<CancellationToken>,
    last_report: Option<RunReport>,
}

struct Slot {
    config: AgentConfig,
    state: Mutex<SlotState>,
    done: Notify,
}

impl Slot {
    fn new(config: AgentConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SlotState {
                run_state: RunState::Created,
                cancel: None,
                last_report: None,
            }),
            done: Notify::new(),
        }
    }
}

/// Tool names the manager materializes per run rather than resolving from
/// the shared registry (they carry run identity: author name, task scope).
const PER_RUN_TOOLS: [&str; 2] = [SharedMemoryTool::NAME, ReportResultsTool::NAME];

/// Catalog + scheduler for named subagent runs.
pub struct SubagentManager {
    client: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    memory: MemoryStore,
    task_id: String,
    agents: DashMap<String, Arc<Slot>>,
    permits: Arc<Semaphore>,
    ceiling: usize,
    timeouts: RuntimeTimeouts,
    retry: RetryConfig,
}

impl SubagentManager {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        memory: MemoryStore,
        task_id: impl Into<String>,
    ) -> Self {
        Self::with_ceiling(client, registry, memory, task_id, DEFAULT_CONCURRENCY_CEILING)
    }

    pub fn with_ceiling(
        client: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        memory: MemoryStore,
        task_id: impl Into<String>,
        ceiling: usize,
    ) -> Self {
        Self {
            client,
            registry,
            memory,
            task_id: task_id.into(),
            agents: DashMap::new(),
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
            timeouts: RuntimeTimeouts::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: RuntimeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Slots currently free under the ceiling.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Register a new named configuration.
    pub fn create(&self, config: AgentConfig) -> Result<(), ManagerError> {
        for tool in &config.tools {
            if !PER_RUN_TOOLS.contains(&tool.as_str()) && !self.registry.contains(tool) {
                return Err(ManagerError::UnknownTool(tool.clone()));
            }
        }

        match self.agents.entry(config.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ManagerError::NameConflict(config.name))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                tracing::info!(agent = %config.name, model = %config.model, "subagent created");
                entry.insert(Arc::new(Slot::new(config)));
                Ok(())
            }
        }
    }

    /// Run a named config to a terminal state.
    pub async fn run(&self, name: &str, input: &str) -> Result<RunReport, ManagerError> {
        let slot = self.get_slot(name)?;
        self.check_runnable(&slot, name)?;

        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| ManagerError::CapacityExceeded {
                requested: 1,
                available: 0,
            })?;

        self.mark_running(&slot, name)?;
        Ok(self.execute_run(slot, input.to_string(), permit).await)
    }

    /// Launch several runs concurrently with all-or-nothing admission.
    ///
    /// If the remaining capacity cannot hold the whole batch, nothing is
    /// launched and the call fails with `CapacityExceeded`.
    pub async fn run_parallel(
        &self,
        requests: Vec<RunRequest>,
    ) -> Result<Vec<RunReport>, ManagerError> {
        let mut slots = Vec::with_capacity(requests.len());
        for request in &requests {
            let slot = self.get_slot(&request.name)?;
            self.check_runnable(&slot, &request.name)?;
            slots.push(slot);
        }

        // Acquire the whole batch before flipping any state; dropping the
        // partial set on failure leaves the ceiling untouched.
        let mut permits = Vec::with_capacity(requests.len());
        for _ in &requests {
            match self.permits.clone().try_acquire_owned() {
                Ok(permit) => permits.push(permit),
                Err(_) => {
                    let available = permits.len();
                    drop(permits);
                    return Err(ManagerError::CapacityExceeded {
                        requested: requests.len(),
                        available,
                    });
                }
            }
        }

        let mut marked: Vec<(Arc<Slot>, RunState)> = Vec::with_capacity(requests.len());
        for (slot, request) in slots.iter().zip(&requests) {
            match self.mark_running(slot, &request.name) {
                Ok(prior) => marked.push((Arc::clone(slot), prior)),
                Err(err) => {
                    for (slot, prior) in &marked {
                        self.unmark_running(slot, *prior);
                    }
                    return Err(err);
                }
            }
        }

        let futures = slots
            .into_iter()
            .zip(requests)
            .zip(permits)
            .map(|((slot, request), permit)| self.execute_run(slot, request.input, permit));

        Ok(futures::future::join_all(futures).await)
    }

    /// Run the listed requests strictly one after another.
    ///
    /// A later run still starts after an earlier one failed, unless
    /// `stop_on_failure` is set. Synchronous admission errors abort the
    /// batch either way.
    pub async fn run_batch(
        &self,
        requests: Vec<RunRequest>,
        stop_on_failure: bool,
    ) -> Result<Vec<RunReport>, ManagerError> {
        let mut reports = Vec::with_capacity(requests.len());
        for request in requests {
            let report = self.run(&request.name, &request.input).await?;
            let failed = report.outcome == RunOutcome::Failed;
            reports.push(report);
            if failed && stop_on_failure {
                break;
            }
        }
        Ok(reports)
    }

    /// Remove a subagent. A running one is cancelled cooperatively first;
    /// the call returns only once the run reached a terminal state.
    pub async fn delete(&self, name: &str) -> Result<(), ManagerError> {
        let slot = self.get_slot(name)?;

        loop {
            // Register for the terminal notification before inspecting state,
            // so a transition between the check and the await is not missed.
            let mut notified = std::pin::pin!(slot.done.notified());
            notified.as_mut().enable();
            {
                let mut state = slot.state.lock();
                match state.run_state {
                    RunState::Running => {
                        if let Some(cancel) = &state.cancel {
                            cancel.cancel();
                        }
                    }
                    _ => {
                        state.run_state = RunState::Deleted;
                        break;
                    }
                }
            }
            notified.await;
        }

        self.agents.remove(name);
        tracing::info!(agent = %name, "subagent deleted");
        Ok(())
    }

    pub fn status(&self, name: &str) -> Result<SubagentStatus, ManagerError> {
        let slot = self.get_slot(name)?;
        Ok(Self::status_of(name, &slot))
    }

    pub fn list(&self) -> Vec<SubagentStatus> {
        let mut statuses: Vec<SubagentStatus> = self
            .agents
            .iter()
            .map(|entry| Self::status_of(entry.key(), entry.value()))
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    fn status_of(name: &str, slot: &Slot) -> SubagentStatus {
        let state = slot.state.lock();
        SubagentStatus {
            name: name.to_string(),
            state: state.run_state,
            model: slot.config.model.clone(),
            tools: slot.config.tools.clone(),
            last_report: state.last_report.clone(),
        }
    }

    fn get_slot(&self, name: &str) -> Result<Arc<Slot>, ManagerError> {
        self.agents
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ManagerError::NotFound(name.to_string()))
    }

    fn check_runnable(&self, slot: &Slot, name: &str) -> Result<(), ManagerError> {
        let state = slot.state.lock();
        match state.run_state {
            RunState::Created | RunState::Completed => Ok(()),
            other => Err(ManagerError::InvalidState {
                name: name.to_string(),
                state: other.to_string(),
                operation: "run".to_string(),
            }),
        }
    }

    /// Flip a runnable slot to Running; returns the prior state so a failed
    /// batch admission can restore it exactly.
    fn mark_running(&self, slot: &Slot, name: &str) -> Result<RunState, ManagerError> {
        let mut state = slot.state.lock();
        match state.run_state {
            prior @ (RunState::Created | RunState::Completed) => {
                state.run_state = RunState::Running;
                state.cancel = Some(CancellationToken::new());
                Ok(prior)
            }
            other => Err(ManagerError::InvalidState {
                name: name.to_string(),
                state: other.to_string(),
                operation: "run".to_string(),
            }),
        }
    }

    fn unmark_running(&self, slot: &Slot, prior: RunState) {
        let mut state = slot.state.lock();
        if state.run_state == RunState::Running {
            state.run_state = prior;
            state.cancel = None;
        }
    }

    /// Drive one admitted run to its terminal state and record the outcome.
    async fn execute_run(
        &self,
        slot: Arc<Slot>,
        input: String,
        permit: OwnedSemaphorePermit,
    ) -> RunReport {
        let name = slot.config.name.clone();
        let cancel = slot
            .state
            .lock()
            .cancel
            .clone()
            .unwrap_or_default();

        let report = match self.build_tools(&slot.config) {
            Ok(tools) => {
                let mut runtime =
                    AgentRuntime::new(slot.config.clone(), Arc::clone(&self.client), tools)
                        .with_cancellation(cancel)
                        .with_timeouts(self.timeouts)
                        .with_retry(self.retry.clone());
                runtime.run(&input).await
            }
            Err(message) => RunReport {
                outcome: RunOutcome::Failed,
                termination_reason: "tool_resolution_failed".to_string(),
                final_text: None,
                iterations: 0,
                total_tokens: 0,
                error: Some(message),
            },
        };

        {
            let mut state = slot.state.lock();
            state.run_state = match report.outcome {
                RunOutcome::Completed => RunState::Completed,
                RunOutcome::Terminated => RunState::Terminated,
                RunOutcome::Failed => RunState::Failed,
            };
            state.cancel = None;
            state.last_report = Some(report.clone());
        }
        slot.done.notify_waiters();
        drop(permit);

        if report.outcome == RunOutcome::Failed {
            self.record_failure(&name, &report);
        }

        report
    }

    /// Resolve the config's tool names, materializing the per-run tools
    /// that carry run identity. Every subagent gets shared memory access
    /// whether or not it was listed.
    fn build_tools(&self, config: &AgentConfig) -> Result<Vec<Arc<dyn Tool>>, String> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(config.tools.len() + 1);
        let mut has_memory = false;

        for name in &config.tools {
            match name.as_str() {
                SharedMemoryTool::NAME => {
                    has_memory = true;
                    tools.push(Arc::new(SharedMemoryTool::new(
                        self.memory.clone(),
                        config.name.as_str(),
                        self.task_id.as_str(),
                    )));
                }
                ReportResultsTool::NAME => tools.push(Arc::new(ReportResultsTool)),
                other => match self.registry.get(other) {
                    Some(tool) => tools.push(tool),
                    None => return Err(format!("unknown tool: {other}")),
                },
            }
        }

        if !has_memory {
            tools.push(Arc::new(SharedMemoryTool::new(
                self.memory.clone(),
                config.name.as_str(),
                self.task_id.as_str(),
            )));
        }

        Ok(tools)
    }

    /// A failed run's terminal state and last error go into shared memory
    /// so the coordinator can decide whether to retry differently.
    fn record_failure(&self, name: &str, report: &RunReport) {
        let content = format!(
            "reason: {}\nerror: {}\niterations: {}",
            report.termination_reason,
            report.error.as_deref().unwrap_or("none"),
            report.iterations,
        );
        if let Err(err) = self.memory.store(
            &self.task_id,
            MemoryCategory::Errors,
            &format!("run failed: {name}"),
            &content,
            &[],
            name,
        ) {
            tracing::warn!(agent = %name, %err, "failed to record run failure in shared memory");
        }
    }
}
