//! SQLite-backed dialog store

use super::{DialogRecord, DialogStore, StorageError};
use crate::update::ConversationKey;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS dialogs (
    conversation_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    state BLOB NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Thread-safe store handle
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Drop the record of a conversation; returns whether one existed
    pub fn delete_dialog(&self, key: ConversationKey) -> Result<bool, StorageError> {
        let deleted = self.conn()?.execute(
            "DELETE FROM dialogs WHERE conversation_id = ?1",
            params![key.chat_id()],
        )?;
        Ok(deleted > 0)
    }

    /// Time of the last save for a conversation
    pub fn updated_at(&self, key: ConversationKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT updated_at FROM dialogs WHERE conversation_id = ?1",
                params![key.chat_id()],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(StorageError::backend)
        })
        .transpose()
    }

    fn get(&self, key: ConversationKey) -> Result<Option<DialogRecord>, StorageError> {
        let record = self
            .conn()?
            .query_row(
                "SELECT name, state FROM dialogs WHERE conversation_id = ?1",
                params![key.chat_id()],
                |row| {
                    Ok(DialogRecord {
                        name: row.get(0)?,
                        state: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn save(&self, key: ConversationKey, record: &DialogRecord) -> Result<(), StorageError> {
        let now = Utc::now();
        self.conn()?.execute(
            "INSERT INTO dialogs (conversation_id, name, state, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(conversation_id) DO UPDATE SET
                name = excluded.name,
                state = excluded.state,
                updated_at = excluded.updated_at",
            params![key.chat_id(), record.name, record.state, now.to_rfc3339()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DialogStore for SqliteStore {
    async fn get_dialog(&self, key: ConversationKey) -> Result<Option<DialogRecord>, StorageError> {
        self.get(key)
    }

    async fn save_dialog(&self, key: ConversationKey, record: &DialogRecord) -> Result<(), StorageError> {
        self.save(key, record)
    }
}
