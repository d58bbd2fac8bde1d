//! Object-safe view of a [`Dialog`] over [`BoundState`]

use super::{BoxError, Dialog, ForeignEvent, HookResult};
use crate::state::BoundState;
use crate::switch::Switch;
use crate::update::{ChatUpdate, ConversationKey};
use async_trait::async_trait;
use std::any;

#[async_trait]
pub(crate) trait ErasedDialog: Send + Sync {
    fn name(&self) -> &'static str;

    fn state_type(&self) -> &'static str;

    fn initial_state(&self) -> BoundState;

    fn decode_state(&self, raw: &[u8]) -> serde_json::Result<BoundState>;

    fn accepts(&self, state: &BoundState) -> bool;

    async fn handle_chat_update(
        &self,
        state: &mut BoundState,
        update: &ChatUpdate,
    ) -> HookResult<Option<Switch>>;

    async fn handle_foreign_event(
        &self,
        state: &mut BoundState,
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>>;

    async fn on_start(&self, state: &mut BoundState, key: ConversationKey) -> HookResult<()>;

    async fn on_finish(&self, state: &mut BoundState, key: ConversationKey) -> HookResult<()>;
}

pub(crate) struct DialogAdapter<D>(pub(crate) D);

impl<D: Dialog> DialogAdapter<D> {
    fn typed<'s>(&self, state: &'s mut BoundState) -> HookResult<&'s mut D::State> {
        let found = state.type_name();
        state.downcast_mut::<D::State>().ok_or_else(|| -> BoxError {
            format!(
                "dialog {:?} expects state {}, got {found}",
                D::NAME,
                any::type_name::<D::State>()
            )
            .into()
        })
    }
}

#[async_trait]
impl<D: Dialog> ErasedDialog for DialogAdapter<D> {
    fn name(&self) -> &'static str {
        D::NAME
    }

    fn state_type(&self) -> &'static str {
        any::type_name::<D::State>()
    }

    fn initial_state(&self) -> BoundState {
        BoundState::new(D::initial_state())
    }

    fn decode_state(&self, raw: &[u8]) -> serde_json::Result<BoundState> {
        BoundState::decode::<D::State>(raw)
    }

    fn accepts(&self, state: &BoundState) -> bool {
        state.is::<D::State>()
    }

    async fn handle_chat_update(
        &self,
        state: &mut BoundState,
        update: &ChatUpdate,
    ) -> HookResult<Option<Switch>> {
        let state = self.typed(state)?;
        self.0.handle_chat_update(state, update).await
    }

    async fn handle_foreign_event(
        &self,
        state: &mut BoundState,
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>> {
        let state = self.typed(state)?;
        self.0.handle_foreign_event(state, key, event).await
    }

    async fn on_start(&self, state: &mut BoundState, key: ConversationKey) -> HookResult<()> {
        let state = self.typed(state)?;
        self.0.on_start(state, key).await
    }

    async fn on_finish(&self, state: &mut BoundState, key: ConversationKey) -> HookResult<()> {
        let state = self.typed(state)?;
        self.0.on_finish(state, key).await
    }
}
