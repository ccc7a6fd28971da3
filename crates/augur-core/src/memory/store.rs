//! Shared memory store
//!
//! SQLite-backed append-only coordination log. Entries are immutable once
//! stored; the only destructive operation is a task-scoped purge. Row ids
//! come from an AUTOINCREMENT sequence, so they are monotonic and never
//! reused, including after a purge.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Fixed category set for shared memory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Research,
    Analysis,
    ForecastData,
    Decisions,
    Progress,
    Errors,
    Coordination,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 7] = [
        MemoryCategory::Research,
        MemoryCategory::Analysis,
        MemoryCategory::ForecastData,
        MemoryCategory::Decisions,
        MemoryCategory::Progress,
        MemoryCategory::Errors,
        MemoryCategory::Coordination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Research => "research",
            MemoryCategory::Analysis => "analysis",
            MemoryCategory::ForecastData => "forecast_data",
            MemoryCategory::Decisions => "decisions",
            MemoryCategory::Progress => "progress",
            MemoryCategory::Errors => "errors",
            MemoryCategory::Coordination => "coordination",
        }
    }

    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        match s {
            "research" => Ok(MemoryCategory::Research),
            "analysis" => Ok(MemoryCategory::Analysis),
            "forecast_data" => Ok(MemoryCategory::ForecastData),
            "decisions" => Ok(MemoryCategory::Decisions),
            "progress" => Ok(MemoryCategory::Progress),
            "errors" => Ok(MemoryCategory::Errors),
            "coordination" => Ok(MemoryCategory::Coordination),
            other => Err(MemoryError::UnknownCategory(other.to_string())),
        }
    }
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single immutable entry in the shared memory log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: i64,
    pub task_id: String,
    pub category: MemoryCategory,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// Per-category summary for `browse_categories`.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: MemoryCategory,
    pub count: usize,
    pub latest_id: i64,
    pub latest_title: String,
}

/// Entries grouped by author for `list_by_agent`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEntries {
    pub author: String,
    pub entries: Vec<MemoryEntry>,
}

/// Search filters; all optional fields are AND-combined.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub category: Option<MemoryCategory>,
    /// Matches entries carrying at least one of these tags.
    pub tags: Option<Vec<String>>,
    /// Case-insensitive substring match over content and title.
    pub text: Option<String>,
    pub limit: Option<usize>,
}

/// Handle to the shared memory store. Cloning shares the connection;
/// every component that needs the store receives a handle explicitly.
#[derive(Clone)]
pub struct MemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl MemoryStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, MemoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MemoryError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        let conn = Connection::open(path).map_err(|e| MemoryError::Open {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_connection(conn)
    }

    /// Open a transient in-memory store (tests).
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, MemoryError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory_entries (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 task_id TEXT NOT NULL,
                 category TEXT NOT NULL,
                 title TEXT NOT NULL,
                 content TEXT NOT NULL,
                 tags TEXT NOT NULL,
                 author TEXT NOT NULL,
                 created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_memory_task ON memory_entries (task_id);
             CREATE INDEX IF NOT EXISTS idx_memory_task_category
                 ON memory_entries (task_id, category);",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Append a new entry. Returns its id.
    ///
    /// Identical arguments always produce a new entry; the log never
    /// deduplicates.
    pub fn store(
        &self,
        task_id: &str,
        category: MemoryCategory,
        title: &str,
        content: &str,
        tags: &[String],
        author: &str,
    ) -> Result<i64, MemoryError> {
        let conn = self.conn.lock();
        let tags_json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT INTO memory_entries (task_id, category, title, content, tags, author, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task_id,
                category.as_str(),
                title,
                content,
                tags_json,
                author,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch one entry by id.
    pub fn get(&self, id: i64) -> Result<MemoryEntry, MemoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, category, title, content, tags, author, created_at
             FROM memory_entries WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], map_entry_row)?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Err(MemoryError::NotFound(id)),
        }
    }

    /// Search a task's entries, most-recent-first.
    pub fn search(&self, task_id: &str, query: &MemoryQuery) -> Result<Vec<MemoryEntry>, MemoryError> {
        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(
                "SELECT id, task_id, category, title, content, tags, author, created_at
                 FROM memory_entries WHERE task_id = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt.query_map([task_id], map_entry_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let text_lower = query.text.as_ref().map(|t| t.to_lowercase());
        let mut results: Vec<MemoryEntry> = rows
            .into_iter()
            .filter(|entry| {
                if let Some(category) = query.category {
                    if entry.category != category {
                        return false;
                    }
                }
                if let Some(tags) = &query.tags {
                    if !tags.iter().any(|t| entry.tags.contains(t)) {
                        return false;
                    }
                }
                if let Some(needle) = &text_lower {
                    let haystack =
                        format!("{}\n{}", entry.title.to_lowercase(), entry.content.to_lowercase());
                    if !haystack.contains(needle.as_str()) {
                        return false;
                    }
                }
                true
            })
            .collect();

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    /// The `n` most recent entries for a task.
    pub fn get_recent(&self, task_id: &str, n: usize) -> Result<Vec<MemoryEntry>, MemoryError> {
        self.search(
            task_id,
            &MemoryQuery {
                limit: Some(n),
                ..Default::default()
            },
        )
    }

    /// All entries for a task, in insertion order.
    pub fn get_task_history(&self, task_id: &str) -> Result<Vec<MemoryEntry>, MemoryError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, category, title, content, tags, author, created_at
             FROM memory_entries WHERE task_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([task_id], map_entry_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Count and most recent entry per category, for categories that have
    /// at least one entry.
    pub fn browse_categories(&self, task_id: &str) -> Result<Vec<CategorySummary>, MemoryError> {
        let history = self.get_task_history(task_id)?;
        let mut summaries = Vec::new();
        for category in MemoryCategory::ALL {
            let entries: Vec<&MemoryEntry> =
                history.iter().filter(|e| e.category == category).collect();
            if let Some(latest) = entries.last() {
                summaries.push(CategorySummary {
                    category,
                    count: entries.len(),
                    latest_id: latest.id,
                    latest_title: latest.title.clone(),
                });
            }
        }
        Ok(summaries)
    }

    /// A task's entries grouped by author, authors sorted by name.
    pub fn list_by_agent(&self, task_id: &str) -> Result<Vec<AgentEntries>, MemoryError> {
        let history = self.get_task_history(task_id)?;
        let mut by_author: std::collections::BTreeMap<String, Vec<MemoryEntry>> =
            std::collections::BTreeMap::new();
        for entry in history {
            by_author.entry(entry.author.clone()).or_default().push(entry);
        }
        Ok(by_author
            .into_iter()
            .map(|(author, entries)| AgentEntries { author, entries })
            .collect())
    }

    /// Irreversibly remove all entries for a task. Returns the number of
    /// removed entries. Ids are never reused afterwards.
    pub fn purge(&self, task_id: &str) -> Result<usize, MemoryError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM memory_entries WHERE task_id = ?1", [task_id])?;
        Ok(removed)
    }
}

fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<MemoryEntry> {
    let category: String = row.get(2)?;
    let tags_json: String = row.get(5)?;
    let created_at: String = row.get(7)?;

    Ok(MemoryEntry {
        id: row.get(0)?,
        task_id: row.get(1)?,
        category: MemoryCategory::parse(&category).unwrap_or(MemoryCategory::Coordination),
        title: row.get(3)?,
        content: row.get(4)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        author: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(store: &MemoryStore, task: &str, author: &str, category: MemoryCategory) -> i64 {
        store
            .store(task, category, "title", "content", &[], author)
            .unwrap()
    }

    #[test]
    fn ids_are_monotonic_and_never_deduplicated() {
        let store = MemoryStore::open_in_memory().unwrap();
        let a = store
            .store("t1", MemoryCategory::Research, "same", "same", &[], "alpha")
            .unwrap();
        let b = store
            .store("t1", MemoryCategory::Research, "same", "same", &[], "alpha")
            .unwrap();
        assert!(b > a, "second identical store must yield a new, larger id");

        let entry = store.get(a).unwrap();
        assert_eq!(entry.title, "same");
        assert_eq!(entry.content, "same");
    }

    #[test]
    fn ids_survive_purge_without_reuse() {
        let store = MemoryStore::open_in_memory().unwrap();
        let before = store_with(&store, "t1", "alpha", MemoryCategory::Progress);
        assert_eq!(store.purge("t1").unwrap(), 1);
        let after = store_with(&store, "t1", "alpha", MemoryCategory::Progress);
        assert!(after > before, "purge must not recycle ids");
        assert!(matches!(store.get(before), Err(MemoryError::NotFound(_))));
    }

    #[test]
    fn search_filters_and_orders_most_recent_first() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .store(
                "t1",
                MemoryCategory::Research,
                "cpi release",
                "CPI rose 0.2% in July",
                &["inflation".to_string()],
                "alpha",
            )
            .unwrap();
        store
            .store(
                "t1",
                MemoryCategory::Analysis,
                "base rates",
                "historical base rate is 40%",
                &["method".to_string()],
                "beta",
            )
            .unwrap();
        store
            .store(
                "t2",
                MemoryCategory::Research,
                "other task",
                "unrelated",
                &[],
                "alpha",
            )
            .unwrap();

        let research = store
            .search(
                "t1",
                &MemoryQuery {
                    category: Some(MemoryCategory::Research),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(research.len(), 1);
        assert_eq!(research[0].title, "cpi release");

        let tagged = store
            .search(
                "t1",
                &MemoryQuery {
                    tags: Some(vec!["method".to_string(), "ghost".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].author, "beta");

        let text = store
            .search(
                "t1",
                &MemoryQuery {
                    text: Some("BASE RATE".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(text.len(), 1);

        let all = store.search("t1", &MemoryQuery::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].id > all[1].id, "most-recent-first ordering");
    }

    #[test]
    fn task_history_is_in_insertion_order() {
        let store = MemoryStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .store(
                    "t1",
                    MemoryCategory::Progress,
                    &format!("step {i}"),
                    "…",
                    &[],
                    "alpha",
                )
                .unwrap();
        }
        let history = store.get_task_history("t1").unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn browse_categories_counts_and_latest() {
        let store = MemoryStore::open_in_memory().unwrap();
        store_with(&store, "t1", "alpha", MemoryCategory::Research);
        store_with(&store, "t1", "alpha", MemoryCategory::Research);
        let latest = store
            .store(
                "t1",
                MemoryCategory::Decisions,
                "go with 0.7",
                "…",
                &[],
                "beta",
            )
            .unwrap();

        let summaries = store.browse_categories("t1").unwrap();
        assert_eq!(summaries.len(), 2);
        let research = summaries
            .iter()
            .find(|s| s.category == MemoryCategory::Research)
            .unwrap();
        assert_eq!(research.count, 2);
        let decisions = summaries
            .iter()
            .find(|s| s.category == MemoryCategory::Decisions)
            .unwrap();
        assert_eq!(decisions.latest_id, latest);
        assert_eq!(decisions.latest_title, "go with 0.7");
    }

    #[test]
    fn list_by_agent_groups_authors() {
        let store = MemoryStore::open_in_memory().unwrap();
        store_with(&store, "t1", "beta", MemoryCategory::Coordination);
        store_with(&store, "t1", "alpha", MemoryCategory::Coordination);
        store_with(&store, "t1", "alpha", MemoryCategory::Progress);

        let grouped = store.list_by_agent("t1").unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].author, "alpha");
        assert_eq!(grouped[0].entries.len(), 2);
        assert_eq!(grouped[1].author, "beta");
        assert_eq!(grouped[1].entries.len(), 1);
    }

    #[test]
    fn get_recent_limits() {
        let store = MemoryStore::open_in_memory().unwrap();
        for _ in 0..10 {
            store_with(&store, "t1", "alpha", MemoryCategory::Progress);
        }
        let recent = store.get_recent("t1", 3).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].id > recent[1].id);
    }

    #[test]
    fn entries_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");

        let id = {
            let store = MemoryStore::open(&path).unwrap();
            store
                .store(
                    "t1",
                    MemoryCategory::Decisions,
                    "kept",
                    "still here",
                    &[],
                    "alpha",
                )
                .unwrap()
        };

        let store = MemoryStore::open(&path).unwrap();
        let entry = store.get(id).unwrap();
        assert_eq!(entry.content, "still here");
        // The id sequence continues where it left off.
        let next = store_with(&store, "t1", "alpha", MemoryCategory::Progress);
        assert!(next > id);
    }

    #[test]
    fn category_parse_round_trip() {
        for category in MemoryCategory::ALL {
            assert_eq!(MemoryCategory::parse(category.as_str()).unwrap(), category);
        }
        assert!(MemoryCategory::parse("gossip").is_err());
    }
}
