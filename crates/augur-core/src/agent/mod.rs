//! Agent system for Augur
//!
//! ## Runtime (the canonical tool-calling loop)
//! - `AgentRuntime` - one bounded conversational loop to a terminal state
//! - `RunReport` / `RunOutcome` - what a finished run reports back
//! - `AgentConfig` - per-run configuration, immutable once running
//!
//! ## Context management
//! - `MessageHistory` - token-budgeted transcript with pair-preserving
//!   truncation
//!
//! ## Sub-agents
//! - `SubagentManager` - named config catalog, concurrency ceiling,
//!   lifecycle state machine, cooperative cancellation
//! - `RunState` / `SubagentStatus` / `RunRequest`

pub mod config;
pub mod executor;
pub mod history;
pub mod manager;
pub mod runtime;

pub use config::{
    AgentConfig, RuntimeTimeouts, DEFAULT_CONTEXT_WINDOW_TOKENS, DEFAULT_MAX_ITERATIONS,
    DEFAULT_MAX_OUTPUT_TOKENS,
};
pub use history::MessageHistory;
pub use manager::{
    RunRequest, RunState, SubagentManager, SubagentStatus, DEFAULT_CONCURRENCY_CEILING,
};
pub use runtime::{AgentRuntime, RunOutcome, RunReport};
