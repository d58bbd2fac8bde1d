//! Test doubles: a two-dialog signup bot, a recording interceptor and a
//! failure-injecting store

use crate::dialog::{BaseDialog, Dialog, ForeignEvent, HookResult};
use crate::dispatcher::OffChatHandler;
use crate::error::Operation;
use crate::interceptor::{Interceptor, Next};
use crate::state::BoundState;
use crate::storage::{DialogRecord, DialogStore, MemoryStore, StorageError};
use crate::switch::Switch;
use crate::update::{ChatUpdate, ConversationKey, OffChatUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Recorders
// ============================================================================

/// Messages "sent" to chats, in order
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
}

impl Outbox {
    pub fn send(&self, chat_id: i64, text: impl Into<String>) {
        self.sent.lock().unwrap().push((chat_id, text.into()));
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts only, for single-chat tests
    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

/// Shared ordered log of hook and interceptor calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
    states: Arc<Mutex<Vec<Value>>>,
}

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn record_state(&self, state: Value) {
        self.states.lock().unwrap().push(state);
    }

    pub fn states(&self) -> Vec<Value> {
        self.states.lock().unwrap().clone()
    }
}

/// Application event the test dialogs relay to the chat
#[derive(Debug, Clone)]
pub struct Notice(pub String);

fn injected(dialog: &str, fail: Option<Operation>, op: Operation) -> HookResult<()> {
    if fail == Some(op) {
        return Err(format!("{dialog} {op} failed").into());
    }
    Ok(())
}

fn chat_id(update: &ChatUpdate) -> Option<i64> {
    update.message().map(|m| m.chat.id)
}

// ============================================================================
// Root dialog
// ============================================================================

/// Command menu of the signup bot
#[derive(Debug, Clone, Default)]
pub struct RootDialog {
    pub outbox: Outbox,
    pub log: CallLog,
    fail: Option<Operation>,
    base: BaseDialog,
}

impl RootDialog {
    pub fn new(outbox: Outbox, log: CallLog) -> Self {
        Self {
            outbox,
            log,
            ..Self::default()
        }
    }

    pub fn with_log(log: CallLog) -> Self {
        Self::new(Outbox::default(), log)
    }

    /// Make `op` return an error after logging the call
    pub fn failing(mut self, op: Operation) -> Self {
        self.fail = Some(op);
        self
    }

    fn enter(&self, op: Operation) -> HookResult<()> {
        self.log.push(format!("{}:{op}", Self::NAME));
        injected(Self::NAME, self.fail, op)
    }
}

#[async_trait]
impl Dialog for RootDialog {
    const NAME: &'static str = "root";
    type State = ();

    fn initial_state() {}

    async fn handle_chat_update(&self, _state: &mut (), update: &ChatUpdate) -> HookResult<Option<Switch>> {
        self.enter(Operation::HandleChatUpdate)?;
        let Some(chat_id) = chat_id(update) else {
            return self.base.handle_chat_update(update);
        };

        match update.text() {
            Some("/start") => self.outbox.send(chat_id, "Hi! I'm a signup bot"),
            Some("/signup") => return Ok(Some(Switch::to::<SignupDialog>())),
            _ => self.outbox.send(chat_id, "Sorry, I do not know this command"),
        }
        Ok(None)
    }

    async fn handle_foreign_event(
        &self,
        _state: &mut (),
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>> {
        self.enter(Operation::HandleForeignEvent)?;
        match event.downcast_ref::<Notice>() {
            Some(Notice(text)) => {
                self.outbox.send(key.chat_id(), text.clone());
                Ok(None)
            }
            None => self.base.handle_foreign_event(key, event),
        }
    }

    async fn on_start(&self, _state: &mut (), key: ConversationKey) -> HookResult<()> {
        self.enter(Operation::OnStart)?;
        self.base.on_start(key)
    }

    async fn on_finish(&self, _state: &(), key: ConversationKey) -> HookResult<()> {
        self.enter(Operation::OnFinish)?;
        self.base.on_finish(key)
    }
}

// ============================================================================
// Signup dialog
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupState {
    pub step: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl SignupState {
    fn prompt(&self) -> &'static str {
        match self.step {
            0 => "Enter username",
            1 => "Enter a password",
            _ => "Confirm the password",
        }
    }

    fn is_valid(&self, confirmation: &str) -> bool {
        self.user_name.len() > 5 && self.password.len() > 5 && self.password == confirmation
    }
}

/// Three-step username and password form
#[derive(Debug, Clone, Default)]
pub struct SignupDialog {
    pub outbox: Outbox,
    pub log: CallLog,
    fail: Option<Operation>,
    base: BaseDialog,
}

impl SignupDialog {
    pub fn new(outbox: Outbox, log: CallLog) -> Self {
        Self {
            outbox,
            log,
            ..Self::default()
        }
    }

    pub fn with_log(log: CallLog) -> Self {
        Self::new(Outbox::default(), log)
    }

    /// Make `op` return an error after logging the call
    pub fn failing(mut self, op: Operation) -> Self {
        self.fail = Some(op);
        self
    }

    fn enter(&self, op: Operation) -> HookResult<()> {
        self.log.push(format!("{}:{op}", Self::NAME));
        injected(Self::NAME, self.fail, op)
    }
}

#[async_trait]
impl Dialog for SignupDialog {
    const NAME: &'static str = "signup";
    type State = SignupState;

    fn initial_state() -> SignupState {
        SignupState::default()
    }

    async fn handle_chat_update(
        &self,
        state: &mut SignupState,
        update: &ChatUpdate,
    ) -> HookResult<Option<Switch>> {
        self.enter(Operation::HandleChatUpdate)?;
        let (Some(chat_id), Some(text)) = (chat_id(update), update.text()) else {
            return self.base.handle_chat_update(update);
        };

        match state.step {
            0 => state.user_name = text.to_string(),
            1 => state.password = text.to_string(),
            _ => {
                let verdict = if state.is_valid(text) { "Success!" } else { "Fail!" };
                self.outbox.send(chat_id, verdict);
                return Ok(Some(Switch::to::<RootDialog>()));
            }
        }
        state.step += 1;
        self.outbox.send(chat_id, state.prompt());
        Ok(None)
    }

    async fn handle_foreign_event(
        &self,
        state: &mut SignupState,
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>> {
        self.enter(Operation::HandleForeignEvent)?;
        if event.downcast_ref::<Notice>().is_some() {
            // re-prompt so the form stays visible under the notice
            self.outbox.send(key.chat_id(), state.prompt());
            return Ok(None);
        }
        self.base.handle_foreign_event(key, event)
    }

    async fn on_start(&self, state: &mut SignupState, key: ConversationKey) -> HookResult<()> {
        self.enter(Operation::OnStart)?;
        self.outbox.send(key.chat_id(), state.prompt());
        Ok(())
    }

    async fn on_finish(&self, _state: &SignupState, key: ConversationKey) -> HookResult<()> {
        self.enter(Operation::OnFinish)?;
        self.base.on_finish(key)
    }
}

// ============================================================================
// Recording interceptor
// ============================================================================

/// Logs `name:before:op:dialog` and `name:after:op:dialog` around each call
/// and captures the state it was handed
pub struct RecordingInterceptor {
    name: &'static str,
    log: CallLog,
    reject: Option<&'static str>,
}

impl RecordingInterceptor {
    pub fn new(name: &'static str, log: CallLog) -> Self {
        Self {
            name,
            log,
            reject: None,
        }
    }

    /// Fail every call with `message` instead of calling further down the chain
    pub fn rejecting(mut self, message: &'static str) -> Self {
        self.reject = Some(message);
        self
    }

    fn before(&self, op: Operation, dialog: &str, state: &BoundState) -> HookResult<()> {
        self.log.push(format!("{}:before:{op}:{dialog}", self.name));
        if let Some(message) = self.reject {
            return Err(message.into());
        }
        self.log.record_state(state.to_json().unwrap());
        Ok(())
    }

    fn after(&self, op: Operation, dialog: &str) {
        self.log.push(format!("{}:after:{op}:{dialog}", self.name));
    }
}

#[async_trait]
impl Interceptor for RecordingInterceptor {
    async fn handle_chat_update(
        &self,
        dialog: &str,
        state: &mut BoundState,
        update: &ChatUpdate,
        next: Next<'_>,
    ) -> HookResult<Option<Switch>> {
        self.before(Operation::HandleChatUpdate, dialog, state)?;
        let result = next.handle_chat_update(state, update).await;
        self.after(Operation::HandleChatUpdate, dialog);
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
        self.before(Operation::HandleForeignEvent, dialog, state)?;
        let result = next.handle_foreign_event(state, key, event).await;
        self.after(Operation::HandleForeignEvent, dialog);
        result
    }

    async fn on_start(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        next: Next<'_>,
    ) -> HookResult<()> {
        self.before(Operation::OnStart, dialog, state)?;
        let result = next.on_start(state, key).await;
        self.after(Operation::OnStart, dialog);
        result
    }

    async fn on_finish(
        &self,
        dialog: &str,
        state: &mut BoundState,
        key: ConversationKey,
        next: Next<'_>,
    ) -> HookResult<()> {
        self.before(Operation::OnFinish, dialog, state)?;
        let result = next.on_finish(state, key).await;
        self.after(Operation::OnFinish, dialog);
        result
    }
}

// ============================================================================
// Store and off-chat doubles
// ============================================================================

/// Memory store that counts calls and fails on request
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    gets: AtomicUsize,
    saves: AtomicUsize,
    fail_get: AtomicBool,
    fail_save: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    pub fn record(&self, key: ConversationKey) -> Option<DialogRecord> {
        self.inner.snapshot().unwrap().remove(&key)
    }

    pub fn seed(&self, key: ConversationKey, name: &str, state: &[u8]) {
        self.inner.insert(key, DialogRecord::new(name, state.to_vec())).unwrap();
    }
}

#[async_trait]
impl DialogStore for RecordingStore {
    async fn get_dialog(&self, key: ConversationKey) -> Result<Option<DialogRecord>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StorageError::backend("get refused"));
        }
        self.inner.get_dialog(key).await
    }

    async fn save_dialog(&self, key: ConversationKey, record: &DialogRecord) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StorageError::backend("save refused"));
        }
        self.inner.save_dialog(key, record).await
    }
}

/// Off-chat handler that keeps what it receives
#[derive(Debug, Clone, Default)]
pub struct CollectOffChat {
    pub received: Arc<Mutex<Vec<OffChatUpdate>>>,
    pub fail: bool,
}

#[async_trait]
impl OffChatHandler for CollectOffChat {
    async fn handle_off_chat_update(&self, update: OffChatUpdate) -> HookResult<()> {
        self.received.lock().unwrap().push(update);
        if self.fail {
            return Err("off-chat refused".into());
        }
        Ok(())
    }
}
