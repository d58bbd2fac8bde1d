//! Per-conversation dialog dispatcher
//!
//! Every call is a read-modify-write of one conversation's record:
//! load the active dialog and its state, run the hook through the interceptor
//! chain, then either persist the changed state or switch dialogs.
//!
//! The dispatcher takes no locks. Callers must not run two calls for the same
//! conversation at once (see [`crate::serial::KeyedLocks`]); calls for
//! different conversations are independent.

#[cfg(test)]
mod proptests;

use crate::dialog::{Dialog, ForeignEvent, HookResult};
use crate::error::{ConfigError, DispatchError, Operation, StorageOp};
use crate::interceptor::{Interceptor, Next};
use crate::registry::{DialogEntry, Registry};
use crate::state::BoundState;
use crate::storage::{DialogRecord, DialogStore};
use crate::switch::Switch;
use crate::update::{ChatUpdate, ConversationKey, OffChatUpdate, Routed, Update};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Handler for updates that do not belong to any conversation
#[async_trait]
pub trait OffChatHandler: Send + Sync {
    async fn handle_off_chat_update(&self, update: OffChatUpdate) -> HookResult<()>;
}

/// Drops off-chat updates
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreOffChat;

#[async_trait]
impl OffChatHandler for IgnoreOffChat {
    async fn handle_off_chat_update(&self, _update: OffChatUpdate) -> HookResult<()> {
        Ok(())
    }
}

/// Event handed to the active dialog
#[derive(Clone, Copy)]
enum Inbound<'e> {
    Chat(&'e ChatUpdate),
    Foreign(&'e ForeignEvent),
}

impl Inbound<'_> {
    fn operation(self) -> Operation {
        match self {
            Self::Chat(_) => Operation::HandleChatUpdate,
            Self::Foreign(_) => Operation::HandleForeignEvent,
        }
    }
}

/// Builder for [`Dispatcher`]
pub struct DispatcherBuilder<S> {
    store: S,
    registry: Registry,
    interceptors: Vec<Arc<dyn Interceptor>>,
    off_chat: Box<dyn OffChatHandler>,
}

impl<S: DialogStore> DispatcherBuilder<S> {
    /// Register another dialog. Names are checked here, before any update is
    /// processed.
    pub fn dialog<D: Dialog>(mut self, dialog: D) -> Result<Self, ConfigError> {
        self.registry.register(dialog)?;
        Ok(self)
    }

    /// Append an interceptor; earlier ones wrap later ones
    #[must_use]
    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    #[must_use]
    pub fn off_chat_handler(mut self, handler: impl OffChatHandler + 'static) -> Self {
        self.off_chat = Box::new(handler);
        self
    }

    pub fn build(self) -> Dispatcher<S> {
        tracing::debug!(
            dialogs = ?self.registry.names(),
            root = self.registry.root().name(),
            interceptors = self.interceptors.len(),
            "dialog dispatcher ready"
        );
        Dispatcher {
            store: self.store,
            registry: self.registry,
            interceptors: self.interceptors.into(),
            off_chat: self.off_chat,
        }
    }
}

/// Routes updates to the active dialog of each conversation
pub struct Dispatcher<S> {
    store: S,
    registry: Registry,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    off_chat: Box<dyn OffChatHandler>,
}

impl<S: DialogStore> Dispatcher<S> {
    /// Start building a dispatcher around `store` with `root` as the dialog of
    /// conversations that have no stored record
    pub fn builder<D: Dialog>(store: S, root: D) -> DispatcherBuilder<S> {
        DispatcherBuilder {
            store,
            registry: Registry::new(root),
            interceptors: Vec::new(),
            off_chat: Box::new(IgnoreOffChat),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Switch to a registered dialog by name, starting from its initial state
    pub fn switch_to(&self, name: &str) -> Result<Switch, DispatchError> {
        Ok(self.registry.resolve(name)?.switch())
    }

    /// Handle a raw transport update. Chat updates go to the active dialog,
    /// off-chat updates to the off-chat handler; anything else is dropped.
    pub async fn handle_bot_update(&self, update: Update) -> Result<(), DispatchError> {
        let update_id = update.update_id;
        match update.route() {
            Routed::Chat(key, chat) => self.handle_chat_update(key, &chat).await,
            Routed::OffChat(off_chat) => self
                .off_chat
                .handle_off_chat_update(off_chat)
                .await
                .map_err(DispatchError::OffChat),
            Routed::Ignore => {
                tracing::debug!(update_id, "ignoring update without chat or off-chat payload");
                Ok(())
            }
        }
    }

    pub async fn handle_chat_update(
        &self,
        key: ConversationKey,
        update: &ChatUpdate,
    ) -> Result<(), DispatchError> {
        self.handle_dialog_event(key, Inbound::Chat(update)).await
    }

    /// Deliver an application event to the active dialog of `key`
    pub async fn handle_foreign_event<E>(&self, key: ConversationKey, event: E) -> Result<(), DispatchError>
    where
        E: Any + Send + Sync,
    {
        self.handle_dialog_event(key, Inbound::Foreign(&event)).await
    }

    /// Switch `key` to another dialog regardless of what the active one wants
    pub async fn force_dialog(&self, key: ConversationKey, switch: Switch) -> Result<(), DispatchError> {
        let (entry, state) = self.load(key).await?;
        tracing::debug!(conv = %key, from = entry.name(), to = switch.target(), "forcing dialog");
        self.switch_dialog(key, entry, state, switch).await
    }

    fn chain<'a>(&'a self, entry: &'a DialogEntry) -> Next<'a> {
        Next::new(entry, &self.interceptors)
    }

    async fn load(&self, key: ConversationKey) -> Result<(&DialogEntry, BoundState), DispatchError> {
        let record = self
            .store
            .get_dialog(key)
            .await
            .map_err(|source| DispatchError::Storage {
                operation: StorageOp::GetDialog,
                source,
            })?;

        let Some(record) = record else {
            // no record: the conversation never left the root dialog
            let root = self.registry.root();
            return Ok((root, root.initial_state()));
        };

        let entry = self.registry.resolve(&record.name)?;
        let state = entry.decode_state(&record.state)?;
        Ok((entry, state))
    }

    async fn save(&self, key: ConversationKey, record: &DialogRecord) -> Result<(), DispatchError> {
        self.store
            .save_dialog(key, record)
            .await
            .map_err(|source| DispatchError::Storage {
                operation: StorageOp::SaveDialog,
                source,
            })
    }

    async fn handle_dialog_event(
        &self,
        key: ConversationKey,
        inbound: Inbound<'_>,
    ) -> Result<(), DispatchError> {
        let (entry, mut state) = self.load(key).await?;
        let before = entry.encode_state(&state)?;

        let next = self.chain(entry);
        let result = match inbound {
            Inbound::Chat(update) => next.handle_chat_update(&mut state, update).await,
            Inbound::Foreign(event) => next.handle_foreign_event(&mut state, key, event).await,
        };
        let switch = result.map_err(|source| DispatchError::Handler {
            dialog: entry.name(),
            operation: inbound.operation(),
            source,
        })?;
        // interceptors see the erased state and may have replaced it
        entry.check_state(&state)?;

        if let Some(switch) = switch {
            return self.switch_dialog(key, entry, state, switch).await;
        }

        let after = entry.encode_state(&state)?;
        if after == before {
            tracing::trace!(conv = %key, dialog = entry.name(), "state unchanged");
            return Ok(());
        }

        self.save(key, &DialogRecord::new(entry.name(), after)).await
    }

    async fn switch_dialog(
        &self,
        key: ConversationKey,
        from: &DialogEntry,
        state: BoundState,
        switch: Switch,
    ) -> Result<(), DispatchError> {
        let (target, next_state) = switch.into_parts();
        let mut finished = false;

        match self
            .run_switch(key, from, state, target, next_state, &mut finished)
            .await
        {
            Ok(()) => {
                tracing::debug!(conv = %key, from = from.name(), to = target, "switched dialog");
                Ok(())
            }
            Err(source) => Err(DispatchError::Transition {
                from: from.name(),
                to: target,
                finished,
                source: Box::new(source),
            }),
        }
    }

    async fn run_switch(
        &self,
        key: ConversationKey,
        from: &DialogEntry,
        mut state: BoundState,
        target: &'static str,
        mut next_state: BoundState,
        finished: &mut bool,
    ) -> Result<(), DispatchError> {
        // resolve before finishing so an unknown target leaves no side effects
        let to = self.registry.resolve(target)?;
        to.check_state(&next_state)?;

        self.chain(from)
            .on_finish(&mut state, key)
            .await
            .map_err(|source| DispatchError::Handler {
                dialog: from.name(),
                operation: Operation::OnFinish,
                source,
            })?;
        *finished = true;

        self.chain(to)
            .on_start(&mut next_state, key)
            .await
            .map_err(|source| DispatchError::Handler {
                dialog: to.name(),
                operation: Operation::OnStart,
                source,
            })?;
        to.check_state(&next_state)?;

        let encoded = to.encode_state(&next_state)?;
        self.save(key, &DialogRecord::new(to.name(), encoded)).await
    }
}
