//! Augur - autonomous multi-agent forecasting orchestrator
//!
//! Wires configuration, logging, the shared memory store, and the tool
//! registry together, then runs a coordinator agent that decomposes the
//! forecasting workflow into subagent runs.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use augur_core::agent::{AgentConfig, AgentRuntime, SubagentManager};
use augur_core::ai::OpenRouterClient;
use augur_core::config::{ModelAlias, Settings};
use augur_core::memory::MemoryStore;
use augur_core::paths;
use augur_core::tools::{
    ForecastClient, GetForecastDataTool, GetForecastPointsTool, GetForecastsTool,
    MemoryManagerTool, SharedMemoryTool, SubagentManagerTool, ThinkTool, Tool, ToolRegistry,
    UpdateForecastTool, WebSearchTool,
};

const COORDINATOR_NAME: &str = "orchestrator";
const COORDINATOR_MAX_ITERATIONS: usize = 50;

const COORDINATOR_PROMPT: &str = "\
You are the coordinator of a team of forecasting subagents. Today is {current_date}.

Your role:
1. Fetch the open forecasts and break the work into independent subtasks.
2. Create specialized subagents for each subtask, choosing their tools.
3. Launch them (in parallel where the tasks are independent) and let them \
record findings in shared memory.
4. Read the shared memory, synthesize the findings, and submit point \
forecasts with clear rationales.

Subagents coordinate only through shared memory; check it before deciding \
the next step.";

/// Augur - Autonomous Forecasting Agents
#[derive(Parser)]
#[command(name = "augur")]
#[command(about = "Autonomous multi-agent forecasting orchestrator", long_about = None)]
struct Cli {
    /// Model alias: opus, gpt-5, grok, gemini, or multi
    #[arg(short, long, default_value = "grok")]
    model: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Task id scoping this session's shared memory
    #[arg(long, default_value = "multi_agent_session")]
    task_id: String,

    /// Run a single workflow pass instead of looping
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let Some(alias) = ModelAlias::parse(&cli.model) else {
        bail!(
            "invalid model '{}'; choose between opus, gpt-5, grok, gemini, or multi",
            cli.model
        );
    };

    let settings = Settings::from_env()?;
    let model_id = alias.model_id().to_string();
    tracing::info!(model = %model_id, task_id = %cli.task_id, "starting augur");

    let client = Arc::new(OpenRouterClient::new(
        settings.base_url.clone(),
        settings.api_key.clone(),
    ));
    let memory = MemoryStore::open(&paths::memory_db_path())
        .context("failed to open shared memory store")?;

    let registry = Arc::new(build_registry(&settings, alias));
    let manager = Arc::new(SubagentManager::new(
        client.clone(),
        registry.clone(),
        memory.clone(),
        cli.task_id.as_str(),
    ));

    // The coordinator is itself an agent runtime; its tool set adds
    // subagent control and memory administration on top of the registry.
    let coordinator_tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(SubagentManagerTool::new(manager.clone(), model_id.clone())),
        Arc::new(SharedMemoryTool::new(
            memory.clone(),
            COORDINATOR_NAME,
            cli.task_id.as_str(),
        )),
        Arc::new(MemoryManagerTool::new(memory.clone())),
        Arc::new(ThinkTool),
    ];

    let current_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let system_prompt = COORDINATOR_PROMPT.replace("{current_date}", &current_date);
    let config = AgentConfig::new(COORDINATOR_NAME, system_prompt, model_id.as_str())
        .with_max_iterations(COORDINATOR_MAX_ITERATIONS);

    loop {
        let mut coordinator = AgentRuntime::new(config.clone(), client.clone(), coordinator_tools.clone());
        let cancel = coordinator.cancellation_token();

        let report = tokio::select! {
            report = coordinator.run("Run the autonomous forecasting workflow.") => report,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                cancel.cancel();
                break;
            }
        };

        tracing::info!(
            reason = %report.termination_reason,
            iterations = report.iterations,
            total_tokens = report.total_tokens,
            "workflow pass finished"
        );
        if let Some(text) = &report.final_text {
            println!("{text}");
        }
        if let Some(error) = &report.error {
            tracing::error!(%error, "workflow pass failed");
        }

        if cli.once {
            break;
        }
    }

    Ok(())
}

/// Registry of capabilities subagents may be granted.
fn build_registry(settings: &Settings, alias: ModelAlias) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    let forecast = ForecastClient::new(
        settings.forecast_url.clone(),
        alias.forecast_user_id(),
        settings.bot_username.clone(),
        settings.bot_password.clone(),
    );
    registry.register(Arc::new(GetForecastsTool::new(forecast.clone())));
    registry.register(Arc::new(GetForecastDataTool::new(forecast.clone())));
    registry.register(Arc::new(GetForecastPointsTool::new(forecast.clone())));
    registry.register(Arc::new(UpdateForecastTool::new(forecast)));

    registry.register(Arc::new(ThinkTool));

    match &settings.search_api_key {
        Some(key) => registry.register(Arc::new(WebSearchTool::new(key.clone()))),
        None => tracing::warn!("AUGUR_SEARCH_API_KEY not set; web_search tool disabled"),
    }

    registry
}
