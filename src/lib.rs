//! Per-conversation dialog state machines for chat bots
//!
//! Each conversation is always in exactly one named [`Dialog`]. The
//! [`Dispatcher`] loads the active dialog and its state from a
//! [`DialogStore`], hands it the incoming update or application event through
//! the [`Interceptor`] chain, and then persists the changed state or performs
//! the [`Switch`] the dialog asked for.

pub mod config;
pub mod dialog;
pub mod dispatcher;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod serial;
pub mod state;
pub mod storage;
pub mod switch;
pub mod update;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use dialog::{BaseDialog, BoxError, Dialog, ForeignEvent, HookResult};
pub use dispatcher::{Dispatcher, DispatcherBuilder, IgnoreOffChat, OffChatHandler};
pub use error::{ConfigError, DispatchError, Operation, StorageOp};
pub use interceptor::{Interceptor, Next, TraceInterceptor};
pub use registry::{DialogEntry, Registry};
pub use serial::{KeyedLocks, KeyedQueue};
pub use state::{BoundState, DialogState};
pub use storage::{DialogRecord, DialogStore, MemoryStore, SqliteStore, StorageError};
pub use switch::Switch;
pub use update::{ChatUpdate, ConversationKey, OffChatUpdate, Routed, Update};
