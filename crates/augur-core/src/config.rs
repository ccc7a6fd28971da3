//! Process configuration
//!
//! Credentials and service endpoints come from environment variables; model
//! selection comes from the CLI. Everything here is input to AgentConfig
//! construction — the runtime itself never reads the environment.

use anyhow::{bail, Context, Result};

/// Default OpenRouter-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Model alias selectable from the CLI, mapped to a provider model id and
/// the bot user registered for it on the forecasting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAlias {
    Opus,
    Gpt5,
    Grok,
    Gemini,
    Multi,
}

impl ModelAlias {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "opus" => Some(ModelAlias::Opus),
            "gpt-5" => Some(ModelAlias::Gpt5),
            "grok" => Some(ModelAlias::Grok),
            "gemini" => Some(ModelAlias::Gemini),
            "multi" => Some(ModelAlias::Multi),
            _ => None,
        }
    }

    pub fn model_id(&self) -> &'static str {
        match self {
            ModelAlias::Opus => "anthropic/claude-opus-4.1",
            ModelAlias::Gpt5 => "openai/gpt-5",
            ModelAlias::Grok => "x-ai/grok-4",
            ModelAlias::Gemini => "google/gemini-2.5-pro",
            ModelAlias::Multi => "x-ai/grok-4-fast:free",
        }
    }

    /// Bot user id registered for this alias on the forecasting platform.
    pub fn forecast_user_id(&self) -> u64 {
        match self {
            ModelAlias::Opus => 18,
            ModelAlias::Gpt5 => 19,
            ModelAlias::Grok => 20,
            ModelAlias::Gemini => 21,
            ModelAlias::Multi => 22,
        }
    }
}

impl std::fmt::Display for ModelAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelAlias::Opus => "opus",
            ModelAlias::Gpt5 => "gpt-5",
            ModelAlias::Grok => "grok",
            ModelAlias::Gemini => "gemini",
            ModelAlias::Multi => "multi",
        };
        write!(f, "{s}")
    }
}

/// Environment-sourced settings for external collaborators.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Model provider credential (`AUGUR_API_KEY`).
    pub api_key: String,
    /// Provider endpoint override (`AUGUR_BASE_URL`).
    pub base_url: String,
    /// Forecasting service base URL (`AUGUR_API_URL`).
    pub forecast_url: String,
    /// Forecasting bot credentials (`AUGUR_BOT_USERNAME`/`AUGUR_BOT_PASSWORD`).
    pub bot_username: String,
    pub bot_password: String,
    /// Search provider credential (`AUGUR_SEARCH_API_KEY`); search is
    /// disabled when unset.
    pub search_api_key: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("AUGUR_API_KEY")
            .context("AUGUR_API_KEY environment variable is required")?;
        if api_key.trim().is_empty() {
            bail!("AUGUR_API_KEY environment variable is empty");
        }

        Ok(Self {
            api_key,
            base_url: std::env::var("AUGUR_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            forecast_url: std::env::var("AUGUR_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            bot_username: std::env::var("AUGUR_BOT_USERNAME").unwrap_or_default(),
            bot_password: std::env::var("AUGUR_BOT_PASSWORD").unwrap_or_default(),
            search_api_key: std::env::var("AUGUR_SEARCH_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }
}
