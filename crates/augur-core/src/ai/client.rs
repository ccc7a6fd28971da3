//! Model provider client
//!
//! `ModelClient` is the seam the agent runtime drives; `OpenRouterClient` is
//! the production implementation speaking the OpenAI chat-completions format
//! against an OpenRouter-compatible endpoint. Tests substitute a scripted
//! client behind the same trait.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::ai::retry::is_retryable_status;
use crate::ai::types::{Content, ModelMessage, ModelRequest, ModelResponse, Role, Usage};
use crate::error::ProviderError;

/// Default bound on a single model call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

/// One non-streaming completion turn against a model provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError>;
}

/// OpenAI-compatible chat-completions client (OpenRouter by default).
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    call_timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_body(&self, request: &ModelRequest) -> Value {
        let mut messages = vec![json!({"role": "system", "content": request.system})];
        for message in &request.messages {
            convert_message(message, &mut messages);
        }

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_body(request);

        let send = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        // A hung call is treated like any other transient failure: the
        // retry layer above decides whether to try again.
        let response = match tokio::time::timeout(self.call_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                return Err(ProviderError::Transient {
                    status: None,
                    message: format!("request failed: {err}"),
                    retry_after: None,
                });
            }
            Err(_) => {
                return Err(ProviderError::Transient {
                    status: None,
                    message: format!("model call timed out after {:?}", self.call_timeout),
                    retry_after: None,
                });
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let retry_after = parse_retry_after(response.headers());
            let message = response.text().await.unwrap_or_default();
            return if is_retryable_status(status) {
                Err(ProviderError::Transient {
                    status: Some(status),
                    message,
                    retry_after,
                })
            } else {
                Err(ProviderError::Permanent {
                    status: Some(status),
                    message,
                })
            };
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        parse_completion(&payload)
    }
}

/// Convert one transcript message into OpenAI wire messages.
///
/// An assistant turn becomes a single message carrying `tool_calls`; each
/// tool-result block becomes its own `role: tool` message, in block order,
/// so call/result pairing survives the format change.
fn convert_message(message: &ModelMessage, out: &mut Vec<Value>) {
    match message.role {
        Role::Assistant => {
            let text = message.text_content();
            let tool_calls: Vec<Value> = message
                .content
                .iter()
                .filter_map(|block| match block {
                    Content::ToolUse { id, name, input } => Some(json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();

            let mut msg = json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            });
            if !tool_calls.is_empty() {
                msg["tool_calls"] = Value::Array(tool_calls);
            }
            out.push(msg);
        }
        _ => {
            let mut pushed_tool_result = false;
            for block in &message.content {
                if let Content::ToolResult {
                    tool_use_id,
                    output,
                    ..
                } = block
                {
                    let content = match output {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    out.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    }));
                    pushed_tool_result = true;
                }
            }

            if !pushed_tool_result {
                let role = match message.role {
                    Role::System => "system",
                    _ => "user",
                };
                out.push(json!({
                    "role": role,
                    "content": message.text_content(),
                }));
            }
        }
    }
}

fn parse_completion(payload: &Value) -> Result<ModelResponse, ProviderError> {
    let message = payload
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ProviderError::MalformedResponse("missing choices[0].message".into()))?;

    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let function = call.get("function").cloned().unwrap_or(Value::Null);
            let name = function
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            // Arguments arrive as a JSON-encoded string; an unparsable blob
            // is preserved under "raw" so the tool can report it back.
            let arguments = function
                .get("arguments")
                .and_then(|v| v.as_str())
                .map(|raw| {
                    serde_json::from_str(raw).unwrap_or_else(|_| json!({ "raw": raw }))
                })
                .unwrap_or_else(|| json!({}));

            if name.is_empty() {
                return Err(ProviderError::MalformedResponse(
                    "tool call without a function name".into(),
                ));
            }
            tool_calls.push(crate::ai::types::AiToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    let usage = payload
        .get("usage")
        .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok())
        .unwrap_or_default();

    Ok(ModelResponse {
        text,
        tool_calls,
        usage,
    })
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
