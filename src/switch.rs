//! Dialog switch requests

use crate::dialog::Dialog;
use crate::state::BoundState;

/// Request to hand the conversation over to another dialog
///
/// Built from the target dialog type, so the name and the state type always
/// belong to the same dialog:
///
/// ```ignore
/// return Ok(Some(Switch::to::<SignupDialog>()));
/// ```
#[derive(Debug)]
pub struct Switch {
    target: &'static str,
    state: BoundState,
}

impl Switch {
    /// Switch to `D` starting from its initial state
    pub fn to<D: Dialog>() -> Self {
        Self::with_state::<D>(D::initial_state())
    }

    /// Switch to `D` starting from `state`
    pub fn with_state<D: Dialog>(state: D::State) -> Self {
        Self {
            target: D::NAME,
            state: BoundState::new(state),
        }
    }

    pub(crate) fn from_parts(target: &'static str, state: BoundState) -> Self {
        Self { target, state }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn state(&self) -> &BoundState {
        &self.state
    }

    pub fn into_parts(self) -> (&'static str, BoundState) {
        (self.target, self.state)
    }
}
