//! Registered dialogs of a dispatcher

use crate::dialog::{Dialog, DialogAdapter, ErasedDialog};
use crate::error::{ConfigError, DispatchError};
use crate::state::BoundState;
use crate::switch::Switch;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registration record of one dialog
#[derive(Clone)]
pub struct DialogEntry {
    dialog: Arc<dyn ErasedDialog>,
}

impl DialogEntry {
    pub fn new<D: Dialog>(dialog: D) -> Self {
        Self {
            dialog: Arc::new(DialogAdapter(dialog)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.dialog.name()
    }

    /// Rust type name of the dialog's declared state
    pub fn state_type(&self) -> &'static str {
        self.dialog.state_type()
    }

    pub fn initial_state(&self) -> BoundState {
        self.dialog.initial_state()
    }

    /// Switch to this dialog starting from its initial state
    pub fn switch(&self) -> Switch {
        Switch::from_parts(self.name(), self.initial_state())
    }

    pub(crate) fn dialog(&self) -> &dyn ErasedDialog {
        self.dialog.as_ref()
    }

    pub(crate) fn decode_state(&self, raw: &[u8]) -> Result<BoundState, DispatchError> {
        self.dialog
            .decode_state(raw)
            .map_err(|source| DispatchError::DecodeState {
                dialog: self.name(),
                source,
            })
    }

    pub(crate) fn encode_state(&self, state: &BoundState) -> Result<Vec<u8>, DispatchError> {
        state.encode().map_err(|source| DispatchError::EncodeState {
            dialog: self.name(),
            source,
        })
    }

    pub(crate) fn check_state(&self, state: &BoundState) -> Result<(), DispatchError> {
        if self.dialog.accepts(state) {
            Ok(())
        } else {
            Err(DispatchError::StateMismatch {
                dialog: self.name(),
                expected: self.state_type(),
                found: state.type_name(),
            })
        }
    }
}

impl fmt::Debug for DialogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogEntry")
            .field("name", &self.name())
            .field("state", &self.state_type())
            .finish()
    }
}

/// Name-indexed dialogs with one root
#[derive(Debug, Clone)]
pub struct Registry {
    root: &'static str,
    dialogs: HashMap<&'static str, DialogEntry>,
}

impl Registry {
    pub fn new<D: Dialog>(root: D) -> Self {
        let entry = DialogEntry::new(root);
        let root = entry.name();
        Self {
            root,
            dialogs: HashMap::from([(root, entry)]),
        }
    }

    /// Add a dialog; names must be unique across the registry
    pub fn register<D: Dialog>(&mut self, dialog: D) -> Result<(), ConfigError> {
        if self.dialogs.contains_key(D::NAME) {
            return Err(ConfigError::DuplicateDialog(D::NAME));
        }
        self.dialogs.insert(D::NAME, DialogEntry::new(dialog));
        Ok(())
    }

    /// Dialog active for conversations without a stored record
    pub fn root(&self) -> &DialogEntry {
        &self.dialogs[self.root]
    }

    pub fn get(&self, name: &str) -> Option<&DialogEntry> {
        self.dialogs.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&DialogEntry, DispatchError> {
        self.get(name)
            .ok_or_else(|| DispatchError::Unregistered(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dialogs.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.dialogs.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }
}
