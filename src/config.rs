//! Environment configuration for hosts of the dispatcher

use crate::storage::{DialogStore, MemoryStore, SqliteStore, StorageError};
use std::path::PathBuf;
use std::sync::Arc;

/// Log filter used when `DIALOGS_LOG` and `RUST_LOG` are unset
pub const DEFAULT_LOG_FILTER: &str = "chat_dialogs=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file; records stay in memory when unset
    pub db_path: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directives
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            db_path: non_empty("DIALOGS_DB_PATH").map(PathBuf::from),
            log_filter: non_empty("DIALOGS_LOG")
                .or_else(|| non_empty("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// Open the configured store
    pub fn open_store(&self) -> Result<Arc<dyn DialogStore>, StorageError> {
        match &self.db_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "opening sqlite dialog store");
                Ok(Arc::new(SqliteStore::open(path)?))
            }
            None => {
                tracing::info!("using in-memory dialog store");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}
