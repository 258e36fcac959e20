use super::error::{StateError, StateResult};
use super::{event::StateTransition, ControllerState, ThemeEvent};

/// Only the most recent transitions are kept.
const HISTORY_LIMIT: usize = 16;

#[derive(Debug)]
pub struct StateMachine {
    state: ControllerState,
    transition_history: Vec<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: ControllerState::default(),
            transition_history: Vec::new(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn can_transition(&self, event: ThemeEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: ThemeEvent) -> Option<ControllerState> {
        match (self.state, event) {
            (ControllerState::SystemPendingInit, ThemeEvent::Initialize(choice)) => {
                Some(ControllerState::for_choice(choice))
            }
            (state, ThemeEvent::Select(choice)) if state.is_active() => {
                Some(ControllerState::for_choice(choice))
            }
            _ => None,
        }
    }

    pub fn transition(&mut self, event: ThemeEvent) -> StateResult<ControllerState> {
        tracing::debug!(from = ?self.state, event = ?event, "request state transition");
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid state transition requested");
            StateError::InvalidStateTransition { from, event }
        })?;

        let record = StateTransition::new(self.state, event, next);
        self.state = next;
        if self.transition_history.len() == HISTORY_LIMIT {
            self.transition_history.remove(0);
        }
        self.transition_history.push(record);

        Ok(self.state)
    }

    #[cfg(test)]
    pub fn history(&self) -> &[StateTransition] {
        &self.transition_history
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ControllerState::{:?}", self.state)
    }
}
