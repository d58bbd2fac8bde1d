//! Persistence of the active dialog per conversation
//!
//! The dispatcher reads the record before every event and writes it at most
//! once afterwards. There is no locking or versioning; callers must keep one
//! in-flight call per conversation.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::dialog::BoxError;
use crate::update::ConversationKey;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Stored dialog of one conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRecord {
    /// Name of the registered dialog owning the conversation
    pub name: String,
    /// JSON encoding of that dialog's state
    pub state: Vec<u8>,
}

impl DialogRecord {
    pub fn new(name: impl Into<String>, state: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }

    /// State blob parsed as JSON, for inspection and logging
    pub fn state_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.state)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("storage backend: {0}")]
    Backend(#[source] BoxError),
}

impl StorageError {
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }
}

/// Storage for the active dialog of each conversation
#[async_trait]
pub trait DialogStore: Send + Sync {
    /// Current record, `None` when the conversation never left the root dialog
    async fn get_dialog(&self, key: ConversationKey) -> Result<Option<DialogRecord>, StorageError>;

    /// Replace the record of a conversation
    async fn save_dialog(&self, key: ConversationKey, record: &DialogRecord) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: DialogStore + ?Sized> DialogStore for Arc<T> {
    async fn get_dialog(&self, key: ConversationKey) -> Result<Option<DialogRecord>, StorageError> {
        (**self).get_dialog(key).await
    }

    async fn save_dialog(&self, key: ConversationKey, record: &DialogRecord) -> Result<(), StorageError> {
        (**self).save_dialog(key, record).await
    }
}
