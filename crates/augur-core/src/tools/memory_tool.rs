//! Shared-memory tool capabilities.
//!
//! `SharedMemoryTool` is the agent-facing surface over the store: every run
//! gets its own instance carrying its author name and task scope, so entries
//! are attributed without the model having to say who it is.
//! `MemoryManagerTool` is the coordinator-only administrative surface
//! (task summary, purge).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::memory::{MemoryCategory, MemoryEntry, MemoryQuery, MemoryStore};
use crate::tools::registry::{parse_params, Tool, ToolResult};

const DEFAULT_SEARCH_LIMIT: usize = 10;

pub struct SharedMemoryTool {
    store: MemoryStore,
    author: String,
    task_id: String,
}

impl SharedMemoryTool {
    pub const NAME: &'static str = "shared_memory";

    pub fn new(store: MemoryStore, author: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            store,
            author: author.into(),
            task_id: task_id.into(),
        }
    }
}

#[derive(Deserialize)]
struct MemoryParams {
    action: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    entry_id: Option<i64>,
    #[serde(default)]
    search_category: Option<String>,
    #[serde(default)]
    search_tags: Option<Vec<String>>,
    #[serde(default)]
    search_text: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for SharedMemoryTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Store and retrieve information from shared memory accessible to all agents on this task. Use for coordination, handoffs, and recording findings."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["store", "search", "get", "get_recent", "get_task_history",
                             "browse_categories", "list_by_agent"],
                    "description": "The action to perform on shared memory."
                },
                "category": {
                    "type": "string",
                    "enum": ["research", "analysis", "forecast_data", "decisions",
                             "progress", "errors", "coordination"],
                    "description": "Category of information being stored (required for store)."
                },
                "title": {
                    "type": "string",
                    "description": "Brief title of the information (required for store)."
                },
                "content": {
                    "type": "string",
                    "description": "The main content to store (required for store)."
                },
                "tags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Tags for categorization and search (optional for store)."
                },
                "entry_id": {
                    "type": "integer",
                    "description": "Id of a specific entry to retrieve (required for get)."
                },
                "search_category": {
                    "type": "string",
                    "description": "Category to filter by (optional for search)."
                },
                "search_tags": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Tags to filter by (optional for search)."
                },
                "search_text": {
                    "type": "string",
                    "description": "Text to search for in titles and content (optional for search)."
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50,
                    "description": "Maximum number of results (optional, default 10)."
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: MemoryParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match params.action.as_str() {
            "store" => self.store_entry(params),
            "search" => self.search(params),
            "get" => self.get(params),
            "get_recent" => self.get_recent(params),
            "get_task_history" => self.get_task_history(),
            "browse_categories" => self.browse_categories(),
            "list_by_agent" => self.list_by_agent(),
            other => ToolResult::invalid_parameters(format!(
                "Invalid parameters: unknown action '{other}'"
            )),
        }
    }
}

impl SharedMemoryTool {
    fn store_entry(&self, params: MemoryParams) -> ToolResult {
        let (Some(category), Some(title), Some(content)) =
            (params.category, params.title, params.content)
        else {
            return ToolResult::invalid_parameters(
                "Invalid parameters: store requires category, title and content",
            );
        };

        let category = match MemoryCategory::parse(&category) {
            Ok(c) => c,
            Err(e) => return ToolResult::invalid_parameters(format!("Invalid parameters: {e}")),
        };

        let tags = params.tags.unwrap_or_default();
        match self.store.store(
            &self.task_id,
            category,
            &title,
            &content,
            &tags,
            &self.author,
        ) {
            Ok(id) => ToolResult::success_data(json!({
                "id": id,
                "category": category.as_str(),
                "title": title,
                "author": self.author,
                "task_id": self.task_id,
            })),
            Err(e) => ToolResult::error(format!("store failed: {e}")),
        }
    }

    fn search(&self, params: MemoryParams) -> ToolResult {
        let category = match params.search_category.as_deref().map(MemoryCategory::parse) {
            Some(Ok(c)) => Some(c),
            Some(Err(e)) => {
                return ToolResult::invalid_parameters(format!("Invalid parameters: {e}"))
            }
            None => None,
        };

        let query = MemoryQuery {
            category,
            tags: params.search_tags,
            text: params.search_text,
            limit: Some(params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)),
        };

        match self.store.search(&self.task_id, &query) {
            Ok(entries) => entries_result(&entries),
            Err(e) => ToolResult::error(format!("search failed: {e}")),
        }
    }

    fn get(&self, params: MemoryParams) -> ToolResult {
        let Some(id) = params.entry_id else {
            return ToolResult::invalid_parameters("Invalid parameters: get requires entry_id");
        };
        match self.store.get(id) {
            Ok(entry) => ToolResult::success_data(entry_json(&entry)),
            Err(e) => ToolResult::error(format!("{e}")),
        }
    }

    fn get_recent(&self, params: MemoryParams) -> ToolResult {
        let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        match self.store.get_recent(&self.task_id, limit) {
            Ok(entries) => entries_result(&entries),
            Err(e) => ToolResult::error(format!("get_recent failed: {e}")),
        }
    }

    fn get_task_history(&self) -> ToolResult {
        match self.store.get_task_history(&self.task_id) {
            Ok(entries) => entries_result(&entries),
            Err(e) => ToolResult::error(format!("get_task_history failed: {e}")),
        }
    }

    fn browse_categories(&self) -> ToolResult {
        match self.store.browse_categories(&self.task_id) {
            Ok(summaries) => {
                let data: Vec<Value> = summaries
                    .iter()
                    .map(|s| {
                        json!({
                            "category": s.category.as_str(),
                            "count": s.count,
                            "latest_id": s.latest_id,
                            "latest_title": s.latest_title,
                        })
                    })
                    .collect();
                ToolResult::success_data(json!({ "categories": data }))
            }
            Err(e) => ToolResult::error(format!("browse_categories failed: {e}")),
        }
    }

    fn list_by_agent(&self) -> ToolResult {
        match self.store.list_by_agent(&self.task_id) {
            Ok(groups) => {
                let data: Vec<Value> = groups
                    .iter()
                    .map(|g| {
                        json!({
                            "author": g.author,
                            "count": g.entries.len(),
                            "entries": g.entries.iter().map(entry_json).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                ToolResult::success_data(json!({ "agents": data }))
            }
            Err(e) => ToolResult::error(format!("list_by_agent failed: {e}")),
        }
    }
}

fn entry_json(entry: &MemoryEntry) -> Value {
    json!({
        "id": entry.id,
        "task_id": entry.task_id,
        "category": entry.category.as_str(),
        "title": entry.title,
        "content": entry.content,
        "tags": entry.tags,
        "author": entry.author,
        "created_at": entry.created_at.to_rfc3339(),
    })
}

fn entries_result(entries: &[MemoryEntry]) -> ToolResult {
    ToolResult::success_data(json!({
        "count": entries.len(),
        "entries": entries.iter().map(entry_json).collect::<Vec<_>>(),
    }))
}

/// Administrative surface over the store, for coordinator use only.
pub struct MemoryManagerTool {
    store: MemoryStore,
}

impl MemoryManagerTool {
    pub const NAME: &'static str = "memory_manager";

    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[derive(Deserialize)]
struct MemoryManagerParams {
    action: String,
    target_task_id: String,
}

#[async_trait]
impl Tool for MemoryManagerTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Administrative functions for the shared memory system: per-task summaries and irreversible task purges. For coordinator use."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["get_task_summary", "purge_task"],
                    "description": "Administrative action to perform."
                },
                "target_task_id": {
                    "type": "string",
                    "description": "Task id to target."
                }
            },
            "required": ["action", "target_task_id"]
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params: MemoryManagerParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match params.action.as_str() {
            "get_task_summary" => self.task_summary(&params.target_task_id),
            "purge_task" => match self.store.purge(&params.target_task_id) {
                Ok(removed) => ToolResult::success_data(json!({
                    "task_id": params.target_task_id,
                    "removed": removed,
                })),
                Err(e) => ToolResult::error(format!("purge failed: {e}")),
            },
            other => ToolResult::invalid_parameters(format!(
                "Invalid parameters: unknown action '{other}'"
            )),
        }
    }
}

impl MemoryManagerTool {
    fn task_summary(&self, task_id: &str) -> ToolResult {
        let categories = match self.store.browse_categories(task_id) {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("summary failed: {e}")),
        };
        let agents = match self.store.list_by_agent(task_id) {
            Ok(a) => a,
            Err(e) => return ToolResult::error(format!("summary failed: {e}")),
        };

        let total: usize = agents.iter().map(|g| g.entries.len()).sum();
        ToolResult::success_data(json!({
            "task_id": task_id,
            "total_entries": total,
            "by_category": categories
                .iter()
                .map(|s| json!({"category": s.category.as_str(), "count": s.count}))
                .collect::<Vec<_>>(),
            "by_agent": agents
                .iter()
                .map(|g| json!({"author": g.author, "count": g.entries.len()}))
                .collect::<Vec<_>>(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> SharedMemoryTool {
        SharedMemoryTool::new(MemoryStore::open_in_memory().unwrap(), "alpha", "t1")
    }

    #[tokio::test]
    async fn store_then_get_round_trips() {
        let tool = tool();
        let stored = tool
            .execute(json!({
                "action": "store",
                "category": "research",
                "title": "cpi",
                "content": "CPI rose 0.2%",
                "tags": ["inflation"],
            }))
            .await;
        assert!(!stored.is_error, "{}", stored.output);

        let envelope: Value = serde_json::from_str(&stored.output).unwrap();
        let id = envelope["data"]["id"].as_i64().unwrap();

        let fetched = tool.execute(json!({"action": "get", "entry_id": id})).await;
        assert!(!fetched.is_error);
        assert!(fetched.output.contains("CPI rose 0.2%"));
        assert!(fetched.output.contains("\"author\":\"alpha\""));
    }

    #[tokio::test]
    async fn store_requires_category_title_content() {
        let tool = tool();
        let result = tool.execute(json!({"action": "store", "title": "x"})).await;
        assert!(result.is_error);
        assert!(result.output.contains("invalid_parameters"));
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let tool = tool();
        let result = tool
            .execute(json!({
                "action": "store",
                "category": "gossip",
                "title": "x",
                "content": "y",
            }))
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn missing_entry_is_an_error_result() {
        let tool = tool();
        let result = tool
            .execute(json!({"action": "get", "entry_id": 999}))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("not_found"));
    }

    #[tokio::test]
    async fn purge_via_manager_tool() {
        let store = MemoryStore::open_in_memory().unwrap();
        let member = SharedMemoryTool::new(store.clone(), "alpha", "t1");
        member
            .execute(json!({
                "action": "store",
                "category": "progress",
                "title": "step",
                "content": "…",
            }))
            .await;

        let admin = MemoryManagerTool::new(store.clone());
        let summary = admin
            .execute(json!({"action": "get_task_summary", "target_task_id": "t1"}))
            .await;
        assert!(summary.output.contains("\"total_entries\":1"));

        let purged = admin
            .execute(json!({"action": "purge_task", "target_task_id": "t1"}))
            .await;
        assert!(purged.output.contains("\"removed\":1"));
        assert!(store.get_task_history("t1").unwrap().is_empty());
    }
}
