use super::ControllerState;
use crate::theme::ThemeChoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeEvent {
    /// Choice restored from the persisted preference.
    Initialize(ThemeChoice),
    /// Explicit user selection.
    Select(ThemeChoice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ControllerState,
    pub event: ThemeEvent,
    pub to: ControllerState,
}

impl StateTransition {
    pub const fn new(from: ControllerState, event: ThemeEvent, to: ControllerState) -> Self {
        Self { from, event, to }
    }
}
