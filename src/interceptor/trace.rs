//! Structured logging of dialog calls

use super::{Interceptor, Next};
use crate::dialog::{ForeignEvent, HookResult};
use crate::error::Operation;
use crate::state::BoundState;
use crate::switch::Switch;
use crate::update::{ChatUpdate, ConversationKey};
use async_trait::async_trait;
use std::time::Instant;
use tracing::Level;

/// Logs every dialog call with its duration and outcome
#[derive(Debug, Clone, Copy)]
pub struct TraceInterceptor {
    level: Level,
}

impl Default for TraceInterceptor {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl TraceInterceptor {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    fn record<T>(
        &self,
        dialog: &str,
        operation: Operation,
        key: Option<ConversationKey>,
        started: Instant,
        result: &HookResult<T>,
        outcome: impl FnOnce(&T) -> Option<&'static str>,
    ) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let conv = key.map(|k| k.chat_id());
        match result {
            Ok(value) => {
                let switch_to = outcome(value);
                // `tracing` needs the level as a constant at each call site.
                match self.level {
                    Level::ERROR => tracing::error!(dialog, %operation, ?conv, ?switch_to, elapsed_ms, "dialog call"),
                    Level::WARN => tracing::warn!(dialog, %operation, ?conv, ?switch_to, elapsed_ms, "dialog call"),
                    Level::INFO => tracing::info!(dialog, %operation, ?conv, ?switch_to, elapsed_ms, "dialog call"),
                    Level::DEBUG => tracing::debug!(dialog, %operation, ?conv, ?switch_to, elapsed_ms, "dialog call"),
                    _ => tracing::trace!(dialog, %operation, ?conv, ?switch_to, elapsed_ms, "dialog call"),
                }
            }
            Err(e) => {
                tracing::warn!(dialog, %operation, ?conv, error = %e, elapsed_ms, "dialog call failed");
            }
        }
    }
}

#[async_trait]
impl Interceptor for TraceInterceptor {
    async fn handle_chat_update(
        &self,
        dialog: &str,
        state: &mut BoundState,
        update: &ChatUpdate,
        next: Next<'_>,
    ) -> HookResult<Option<Switch>> {
        let started = Instant::now();
        let result = next.handle_chat_update(state, update).await;
        let key = update.conversation_key();
        self.record(dialog, Operation::HandleChatUpdate, key, started, &result, |switch| {
            switch.as_ref().map(Switch::target)
        });
        result
    }

    async fn handle_foreign_event(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        event: &ForeignEvent,
        next: Next<'_>,
    ) -> HookResult<Option<Switch>> {
        let started = Instant::now();
        let result = next.handle_foreign_event(state, key, event).await;
        self.record(dialog, Operation::HandleForeignEvent, Some(key), started, &result, |switch| {
            switch.as_ref().map(Switch::target)
        });
        result
    }

    async fn on_start(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        next: Next<'_>,
    ) -> HookResult<()> {
        let started = Instant::now();
        let result = next.on_start(state, key).await;
        self.record(dialog, Operation::OnStart, Some(key), started, &result, |_| None);
        result
    }

    async fn on_finish(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        next: Next<'_>,
    ) -> HookResult<()> {
        let started = Instant::now();
        let result = next.on_finish(state, key).await;
        self.record(dialog, Operation::OnFinish, Some(key), started, &result, |_| None);
        result
    }
}
