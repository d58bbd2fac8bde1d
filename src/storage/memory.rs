//! In-memory dialog store

use super::{DialogRecord, DialogStore, StorageError};
use crate::update::ConversationKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Process-local store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<ConversationKey, DialogRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<ConversationKey, DialogRecord>>, StorageError> {
        self.records.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Seed or overwrite a record without going through the dispatcher
    pub fn insert(&self, key: ConversationKey, record: DialogRecord) -> Result<(), StorageError> {
        self.records()?.insert(key, record);
        Ok(())
    }

    /// Forget a conversation; it falls back to the root dialog
    pub fn remove(&self, key: ConversationKey) -> Result<Option<DialogRecord>, StorageError> {
        Ok(self.records()?.remove(&key))
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.records()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.records()?.is_empty())
    }

    /// Copy of all records
    pub fn snapshot(&self) -> Result<HashMap<ConversationKey, DialogRecord>, StorageError> {
        Ok(self.records()?.clone())
    }
}

#[async_trait]
impl DialogStore for MemoryStore {
    async fn get_dialog(&self, key: ConversationKey) -> Result<Option<DialogRecord>, StorageError> {
        Ok(self.records()?.get(&key).cloned())
    }

    async fn save_dialog(&self, key: ConversationKey, record: &DialogRecord) -> Result<(), StorageError> {
        self.records()?.insert(key, record.clone());
        Ok(())
    }
}
