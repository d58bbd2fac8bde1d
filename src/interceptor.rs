//! Middleware around dialog invocations
//!
//! Interceptors run in registration order: the first one registered sees the
//! call first and the result last. Each receives a [`Next`] holding the rest of
//! the chain; calling into it runs the following interceptor, or the dialog
//! itself once the chain is exhausted.

mod trace;

pub use trace::TraceInterceptor;

use crate::dialog::{ForeignEvent, HookResult};
use crate::registry::DialogEntry;
use crate::state::BoundState;
use crate::switch::Switch;
use crate::update::{ChatUpdate, ConversationKey};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn handle_chat_update(
        &self,
        dialog: &str,
        state: &mut BoundState,
        update: &ChatUpdate,
        next: Next<'_>,
    ) -> HookResult<Option<Switch>>;

    async fn handle_foreign_event(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        event: &ForeignEvent,
        next: Next<'_>,
    ) -> HookResult<Option<Switch>>;

    async fn on_start(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        next: Next<'_>,
    ) -> HookResult<()>;

    async fn on_finish(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        next: Next<'_>,
    ) -> HookResult<()>;
}

/// Remainder of an interceptor chain, ending in the dialog
#[derive(Clone, Copy)]
pub struct Next<'a> {
    entry: &'a DialogEntry,
    chain: &'a [Arc<dyn Interceptor>],
}

impl<'a> Next<'a> {
    pub fn new(entry: &'a DialogEntry, chain: &'a [Arc<dyn Interceptor>]) -> Self {
        Self { entry, chain }
    }

    /// Name of the dialog at the end of the chain
    pub fn dialog(&self) -> &'static str {
        self.entry.name()
    }

    fn split(self) -> Option<(&'a dyn Interceptor, Self)> {
        let (head, tail) = self.chain.split_first()?;
        Some((
            head.as_ref(),
            Self {
                entry: self.entry,
                chain: tail,
            },
        ))
    }

    pub async fn handle_chat_update(
        self,
        state: &mut BoundState,
        update: &ChatUpdate,
    ) -> HookResult<Option<Switch>> {
        let name = self.dialog();
        match self.split() {
            Some((head, next)) => head.handle_chat_update(name, state, update, next).await,
            None => self.entry.dialog().handle_chat_update(state, update).await,
        }
    }

    pub async fn handle_foreign_event(
        self,
        state: &mut BoundState,
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>> {
        let name = self.dialog();
        match self.split() {
            Some((head, next)) => head.handle_foreign_event(name, state, key, event, next).await,
            None => self.entry.dialog().handle_foreign_event(state, key, event).await,
        }
    }

    pub async fn on_start(self, state: &mut BoundState, key: ConversationKey) -> HookResult<()> {
        let name = self.dialog();
        match self.split() {
            Some((head, next)) => head.on_start(name, state, key, next).await,
            None => self.entry.dialog().on_start(state, key).await,
        }
    }

    pub async fn on_finish(self, state: &mut BoundState, key: ConversationKey) -> HookResult<()> {
        let name = self.dialog();
        match self.split() {
            Some((head, next)) => head.on_finish(name, state, key, next).await,
            None => self.entry.dialog().on_finish(state, key).await,
        }
    }
}
