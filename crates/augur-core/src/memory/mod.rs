//! Shared memory for cross-agent coordination
//!
//! The store is the only mutable resource shared between concurrent runs.
//! All mutations are single-entry appends; readers always observe a prefix
//! of the append history.

mod store;

pub use store::{
    AgentEntries, CategorySummary, MemoryCategory, MemoryEntry, MemoryQuery, MemoryStore,
};
