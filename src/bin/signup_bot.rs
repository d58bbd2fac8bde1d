//! Signup bot driven from the terminal
//!
//! Reads one update per line from stdin and prints the bot's replies:
//!
//! ```text
//! 42 /start           message "/start" in chat 42
//! !notice 42 hello    application notice to chat 42
//! !reset 42           force chat 42 back to the menu
//! ```

use async_trait::async_trait;
use chat_dialogs::{
    BaseDialog, ChatUpdate, Config, ConversationKey, Dialog, Dispatcher, ForeignEvent, HookResult,
    KeyedLocks, KeyedQueue, Switch, TraceInterceptor, Update,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Outgoing messages, printed by a dedicated task
#[derive(Clone)]
struct Replies(mpsc::UnboundedSender<(i64, String)>);

impl Replies {
    fn send(&self, chat_id: i64, text: impl Into<String>) -> HookResult<()> {
        self.0
            .send((chat_id, text.into()))
            .map_err(|_| "reply channel closed".into())
    }
}

/// Application announcement relayed to a chat
struct Notice(String);

fn chat_id(update: &ChatUpdate) -> Option<i64> {
    update.message().map(|m| m.chat.id)
}

// ============================================================================
// Dialogs
// ============================================================================

struct Menu {
    replies: Replies,
    base: BaseDialog,
}

#[async_trait]
impl Dialog for Menu {
    const NAME: &'static str = "menu";
    type State = ();

    fn initial_state() {}

    async fn handle_chat_update(&self, _state: &mut (), update: &ChatUpdate) -> HookResult<Option<Switch>> {
        let Some(chat_id) = chat_id(update) else {
            return self.base.handle_chat_update(update);
        };
        match update.text() {
            Some("/start") => self.replies.send(chat_id, "Hi! I'm a signup bot")?,
            Some("/signup") => return Ok(Some(Switch::to::<Signup>())),
            _ => self.replies.send(chat_id, "Sorry, I do not know this command")?,
        }
        Ok(None)
    }

    async fn handle_foreign_event(
        &self,
        _state: &mut (),
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>> {
        if let Some(Notice(text)) = event.downcast_ref::<Notice>() {
            self.replies.send(key.chat_id(), text.as_str())?;
            return Ok(None);
        }
        self.base.handle_foreign_event(key, event)
    }

    async fn on_start(&self, _state: &mut (), key: ConversationKey) -> HookResult<()> {
        self.base.on_start(key)
    }

    async fn on_finish(&self, _state: &(), key: ConversationKey) -> HookResult<()> {
        self.base.on_finish(key)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SignupForm {
    step: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    user_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    password: String,
}

impl SignupForm {
    fn prompt(&self) -> &'static str {
        match self.step {
            0 => "Enter username",
            1 => "Enter a password",
            _ => "Confirm the password",
        }
    }
}

struct Signup {
    replies: Replies,
    base: BaseDialog,
}

#[async_trait]
impl Dialog for Signup {
    const NAME: &'static str = "signup";
    type State = SignupForm;

    fn initial_state() -> SignupForm {
        SignupForm::default()
    }

    async fn handle_chat_update(
        &self,
        form: &mut SignupForm,
        update: &ChatUpdate,
    ) -> HookResult<Option<Switch>> {
        let (Some(chat_id), Some(text)) = (chat_id(update), update.text()) else {
            return self.base.handle_chat_update(update);
        };
        match form.step {
            0 => form.user_name = text.to_string(),
            1 => form.password = text.to_string(),
            _ => {
                let ok = form.user_name.len() > 5 && form.password.len() > 5 && form.password == text;
                self.replies.send(chat_id, if ok { "Success!" } else { "Fail!" })?;
                return Ok(Some(Switch::to::<Menu>()));
            }
        }
        form.step += 1;
        self.replies.send(chat_id, form.prompt())?;
        Ok(None)
    }

    async fn handle_foreign_event(
        &self,
        form: &mut SignupForm,
        key: ConversationKey,
        event: &ForeignEvent,
    ) -> HookResult<Option<Switch>> {
        if let Some(Notice(text)) = event.downcast_ref::<Notice>() {
            self.replies.send(key.chat_id(), text.as_str())?;
            self.replies.send(key.chat_id(), form.prompt())?;
            return Ok(None);
        }
        self.base.handle_foreign_event(key, event)
    }

    async fn on_start(&self, form: &mut SignupForm, key: ConversationKey) -> HookResult<()> {
        self.replies.send(key.chat_id(), form.prompt())
    }

    async fn on_finish(&self, _form: &SignupForm, key: ConversationKey) -> HookResult<()> {
        self.base.on_finish(key)
    }
}

// ============================================================================
// Input
// ============================================================================

enum Command {
    Text(i64, String),
    Notice(i64, String),
    Reset(i64),
}

impl Command {
    fn chat_id(&self) -> i64 {
        match self {
            Self::Text(chat_id, _) | Self::Notice(chat_id, _) | Self::Reset(chat_id) => *chat_id,
        }
    }
}

fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("!notice ") {
        let (chat, text) = rest.split_once(' ')?;
        return Some(Command::Notice(chat.parse().ok()?, text.to_string()));
    }
    if let Some(rest) = line.strip_prefix("!reset ") {
        return Some(Command::Reset(rest.trim().parse().ok()?));
    }
    let (chat, text) = line.split_once(' ')?;
    Some(Command::Text(chat.parse().ok()?, text.to_string()))
}

fn text_update(update_id: i64, chat_id: i64, text: &str) -> Result<Update, serde_json::Error> {
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": chrono::Utc::now().timestamp(),
            "chat": { "id": chat_id, "type": "private" },
            "text": text,
        }
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // Initialize logging; stdout is reserved for replies
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Some(parent) = config.db_path.as_deref().and_then(std::path::Path::parent) {
        std::fs::create_dir_all(parent)?;
    }
    let store = config.open_store()?;

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let replies = Replies(reply_tx);
    let printer = tokio::spawn(async move {
        while let Some((chat_id, text)) = reply_rx.recv().await {
            println!("[{chat_id}] {text}");
        }
    });

    let dispatcher = Arc::new(
        Dispatcher::builder(
            store,
            Menu {
                replies: replies.clone(),
                base: BaseDialog,
            },
        )
        .dialog(Signup {
            replies,
            base: BaseDialog,
        })?
        .interceptor(TraceInterceptor::default())
        .build(),
    );
    let mut queue = KeyedQueue::new(Arc::new(KeyedLocks::new()));
    tracing::info!(dialogs = ?dispatcher.registry().names(), "signup bot ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut update_id = 0;
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_line(&line) else {
            if !line.trim().is_empty() {
                tracing::warn!(line = %line, "unrecognized input");
            }
            continue;
        };
        update_id += 1;

        let chat_id = command.chat_id();
        let key = ConversationKey::new(chat_id);
        let dispatcher = dispatcher.clone();

        queue.push(key, async move {
            let result = match command {
                Command::Text(_, text) => match text_update(update_id, chat_id, &text) {
                    Ok(update) => dispatcher.handle_bot_update(update).await,
                    Err(e) => {
                        tracing::error!(conv = chat_id, error = %e, "failed to build update");
                        return;
                    }
                },
                Command::Notice(_, text) => dispatcher.handle_foreign_event(key, Notice(text)).await,
                Command::Reset(_) => match dispatcher.switch_to(Menu::NAME) {
                    Ok(switch) => dispatcher.force_dialog(key, switch).await,
                    Err(e) => Err(e),
                },
            };
            if let Err(e) = result {
                tracing::error!(
                    conv = chat_id,
                    error = %e,
                    finished_without_start = e.finished_without_start(),
                    "update failed"
                );
            }
        });

        if update_id % 64 == 0 {
            queue.prune().await;
        }
    }

    queue.join().await?;
    drop(dispatcher);
    printer.await?;
    Ok(())
}
