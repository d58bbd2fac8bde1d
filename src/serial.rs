//! Per-conversation serialization
//!
//! The dispatcher assumes at most one in-flight call per conversation. Hosts
//! that process updates concurrently hold a [`KeyedLocks`] guard around each
//! dispatcher call, or push jobs through a [`KeyedQueue`] to also keep each
//! conversation's arrival order.

use crate::update::ConversationKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;

/// One async mutex per conversation, created on first use
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: RwLock<HashMap<ConversationKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder of `key`'s guard remains
    pub async fn lock(&self, key: ConversationKey) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(&key).cloned();
        let lock = match existing {
            Some(lock) => lock,
            None => self.locks.write().await.entry(key).or_default().clone(),
        };
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits on; returns how many were removed
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    /// Number of conversations with a lock entry
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}

/// Spawns jobs so that jobs for one conversation run one at a time in push
/// order, while jobs for different conversations run concurrently.
///
/// Pushing never waits: each job is spawned at once and waits inside its own
/// task for the previous job of its conversation, then for the key's lock.
#[derive(Debug)]
pub struct KeyedQueue {
    locks: Arc<KeyedLocks>,
    tails: HashMap<ConversationKey, JoinHandle<()>>,
}

impl KeyedQueue {
    pub fn new(locks: Arc<KeyedLocks>) -> Self {
        Self {
            locks,
            tails: HashMap::new(),
        }
    }

    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    /// Run `job` after every job pushed earlier for `key`
    pub fn push<F>(&mut self, key: ConversationKey, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let previous = self.tails.remove(&key);
        let locks = self.locks.clone();
        let tail = tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    tracing::warn!(conv = %key, error = %e, "earlier job for conversation did not complete");
                }
            }
            let _guard = locks.lock(key).await;
            job.await;
        });
        self.tails.insert(key, tail);
    }

    /// Forget conversations whose jobs have all finished; returns how many
    /// locks were released
    pub async fn prune(&mut self) -> usize {
        self.tails.retain(|_, tail| !tail.is_finished());
        self.locks.prune().await
    }

    /// Conversations with jobs still queued or running
    pub fn len(&self) -> usize {
        self.tails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tails.is_empty()
    }

    /// Wait for every pushed job
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        for (_, tail) in self.tails {
            tail.await?;
        }
        Ok(())
    }
}
