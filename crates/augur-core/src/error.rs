//! Error taxonomy for the orchestration runtime.
//!
//! Three seams, three enums: the model provider, the subagent manager, and
//! the shared memory store. Tool execution errors never appear here — they
//! are encoded as failed `ToolResult`s and fed back to the model.

use std::time::Duration;

use thiserror::Error;

/// Errors from the model provider API.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transient failure (rate limit, server error, timeout). Retried with
    /// backoff before being escalated.
    #[error("transient provider error (status {status:?}): {message}")]
    Transient {
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Permanent failure (bad request, auth). Not retried.
    #[error("provider error (status {status:?}): {message}")]
    Permanent { status: Option<u16>, message: String },

    /// The response body could not be interpreted.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Retries exhausted; carries the final error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: usize, last: String },
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Errors returned synchronously by the subagent manager.
///
/// Per the propagation policy, none of these mutate manager state: they are
/// rejected before any transition happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagerError {
    /// A config with this name is already registered and not deleted.
    #[error("subagent '{0}' already exists")]
    NameConflict(String),

    /// Admitting the run(s) would exceed the concurrency ceiling.
    #[error("capacity exceeded: {requested} run(s) requested, {available} slot(s) available")]
    CapacityExceeded { requested: usize, available: usize },

    /// No config registered under this name.
    #[error("subagent '{0}' does not exist")]
    NotFound(String),

    /// The named config is not in a state that allows the operation.
    #[error("subagent '{name}' is {state}; cannot {operation}")]
    InvalidState {
        name: String,
        state: String,
        operation: String,
    },

    /// A config references a tool the registry does not provide.
    #[error("tool '{0}' is not available")]
    UnknownTool(String),
}

/// Errors from the shared memory store.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("memory entry {0} not found")]
    NotFound(i64),

    #[error("unknown memory category '{0}'")]
    UnknownCategory(String),

    #[error("failed to open memory store at {path}: {source}")]
    Open {
        path: String,
        source: rusqlite::Error,
    },

    #[error("failed to prepare memory store directory {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
