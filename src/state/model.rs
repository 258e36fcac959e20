use crate::theme::ThemeChoice;

/// Lifecycle states of the color-mode controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerState {
    #[default]
    SystemPendingInit,
    SystemActive,
    LightActive,
    DarkActive,
}

impl ControllerState {
    pub const fn for_choice(choice: ThemeChoice) -> Self {
        match choice {
            ThemeChoice::System => ControllerState::SystemActive,
            ThemeChoice::Light => ControllerState::LightActive,
            ThemeChoice::Dark => ControllerState::DarkActive,
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, ControllerState::SystemPendingInit)
    }
}
