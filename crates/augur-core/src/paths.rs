//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".augur";

/// Get the augur config directory (~/.augur)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the logs directory (~/.augur/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Get the shared memory database path (~/.augur/memory.db)
pub fn memory_db_path() -> PathBuf {
    config_dir().join("memory.db")
}
