//! Model provider layer
//!
//! - `types` - wire-level message/tool types shared with the agent loop
//! - `client` - `ModelClient` trait and the OpenRouter implementation
//! - `retry` - exponential backoff for transient provider errors

pub mod client;
pub mod retry;
pub mod types;

pub use client::{ModelClient, OpenRouterClient, DEFAULT_CALL_TIMEOUT};
pub use retry::{is_retryable_status, with_retry, RetryConfig};
pub use types::{
    AiTool, AiToolCall, Content, ModelMessage, ModelRequest, ModelResponse, Role, Usage,
};
