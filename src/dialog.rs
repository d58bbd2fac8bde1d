//! Dialog trait
//!
//! A dialog is one state of the per-conversation state machine. The dispatcher
//! owns the state value; hooks receive it explicitly and either mutate it in
//! place (`Ok(None)`) or ask to hand the conversation over (`Ok(Some(switch))`).

mod erased;

pub(crate) use erased::{DialogAdapter, ErasedDialog};

use crate::state::DialogState;
use crate::switch::Switch;
use crate::update::{ChatUpdate, ConversationKey};
use async_trait::async_trait;
use std::any::Any;

/// Error type returned by user hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type HookResult<T> = Result<T, BoxError>;

/// Application-originated event, downcast by the dialog that expects it
pub type ForeignEvent = dyn Any + Send + Sync;

#[async_trait]
pub trait Dialog: Send + Sync + 'static {
    /// Unique name; stored alongside the state to find the dialog again
    const NAME: &'static str;

    type State: DialogState;

    /// State a conversation starts with when switched to this dialog
    fn initial_state() -> Self::State;

    /// Called for every chat update while this dialog is active
    async fn handle_chat_update(
        &self,
        state: &mut Self::State,
        update: &ChatUpdate,
    ) -> HookResult<Option<Switch>>;

    /// Called for events pushed by the application through the dispatcher
    async fn handle_foreign_event(
        &self,
        state: &mut Self::State,
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>>;

    /// Called when the conversation switches to this dialog. Changes to `state`
    /// are persisted as the dialog's first state.
    async fn on_start(&self, state: &mut Self::State, key: ConversationKey) -> HookResult<()>;

    /// Called when the conversation switches away from this dialog
    async fn on_finish(&self, state: &Self::State, key: ConversationKey) -> HookResult<()>;
}

/// No-op hook implementations for dialogs to delegate to
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseDialog;

impl BaseDialog {
    #[allow(clippy::unused_self)]
    pub fn handle_chat_update(&self, _update: &ChatUpdate) -> HookResult<Option<Switch>> {
        Ok(None)
    }

    #[allow(clippy::unused_self)]
    pub fn handle_foreign_event(
        &self,
        _key: ConversationKey,
        _event: &ForeignEvent,
    ) -> HookResult<Option<Switch>> {
        Ok(None)
    }

    #[allow(clippy::unused_self)]
    pub fn on_start(&self, _key: ConversationKey) -> HookResult<()> {
        Ok(())
    }

    #[allow(clippy::unused_self)]
    pub fn on_finish(&self, _key: ConversationKey) -> HookResult<()> {
        Ok(())
    }
}
