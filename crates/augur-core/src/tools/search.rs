//! Web search capability.
//!
//! Queries a search-augmented completions endpoint (Perplexity-compatible)
//! for up-to-date information. Consumed as an opaque capability; the
//! runtime imposes nothing beyond the generic tool contract.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolResult};

const SEARCH_URL: &str = "https://api.perplexity.ai/chat/completions";
const SEARCH_MODEL: &str = "sonar";
const MAX_ANSWER_TOKENS: usize = 2000;

const SEARCH_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides information and the latest news on a given topic. The information you provide will be used for forecasting purposes, so it should be up to date, relevant and accurate.";

pub struct WebSearchTool {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl WebSearchTool {
    pub const NAME: &'static str = "web_search";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            url: SEARCH_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[derive(Deserialize)]
struct SearchParams {
    query_text: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information and news articles on a topic."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query_text": {
                    "type": "string",
                    "description": "The query text to search for."
                }
            },
            "required": ["query_text"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: SearchParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let body = json!({
            "model": SEARCH_MODEL,
            "messages": [
                {"role": "system", "content": SEARCH_SYSTEM_PROMPT},
                {"role": "user", "content": params.query_text}
            ],
            "max_tokens": MAX_ANSWER_TOKENS,
        });

        let response = match self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return ToolResult::error(format!("search request failed: {err}")),
        };

        if !response.status().is_success() {
            return ToolResult::error(format!(
                "search request failed with status {}",
                response.status()
            ));
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(err) => return ToolResult::error(format!("malformed search response: {err}")),
        };

        match payload
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|t| t.as_str())
        {
            Some(answer) => ToolResult::success(answer.to_string()),
            None => ToolResult::error("search response had no content"),
        }
    }
}
