//! Dispatcher error types

use crate::dialog::BoxError;
use crate::storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Dialog hook being invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    HandleChatUpdate,
    HandleForeignEvent,
    OnStart,
    OnFinish,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HandleChatUpdate => "handle_chat_update",
            Self::HandleForeignEvent => "handle_foreign_event",
            Self::OnStart => "on_start",
            Self::OnFinish => "on_finish",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    GetDialog,
    SaveDialog,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GetDialog => "get_dialog",
            Self::SaveDialog => "save_dialog",
        })
    }
}

/// Misconfiguration detected while building a dispatcher
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate dialog name {0:?}")]
    DuplicateDialog(&'static str),
}

/// Failure to process one update, event or forced switch
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dialog {0:?}: unregistered")]
    Unregistered(String),

    #[error("dialog {dialog:?}: decode state: {source}")]
    DecodeState {
        dialog: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("dialog {dialog:?}: encode state: {source}")]
    EncodeState {
        dialog: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("dialog {dialog:?}: expected state {expected}, got {found}")]
    StateMismatch {
        dialog: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("dialog {dialog:?} {operation}: {source}")]
    Handler {
        dialog: &'static str,
        operation: Operation,
        #[source]
        source: BoxError,
    },

    #[error("storage {operation}: {source}")]
    Storage {
        operation: StorageOp,
        #[source]
        source: StorageError,
    },

    #[error("switch {from:?} to {to:?}: {source}")]
    Transition {
        from: &'static str,
        to: &'static str,
        /// `from` already ran its finish hook
        finished: bool,
        #[source]
        source: Box<DispatchError>,
    },

    #[error("off-chat update handler: {0}")]
    OffChat(#[source] BoxError),
}

impl DispatchError {
    /// True when a switch failed after the old dialog's finish hook ran, so its
    /// side effects happened while the stored record still names that dialog
    pub fn finished_without_start(&self) -> bool {
        matches!(self, Self::Transition { finished: true, .. })
    }

    /// Innermost dispatcher error, skipping transition wrappers
    pub fn root_cause(&self) -> &DispatchError {
        match self {
            Self::Transition { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
