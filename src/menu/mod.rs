use serde::Serialize;

use crate::controller::ThemeModeController;
use crate::state::StateResult;
use crate::storage::PreferenceStore;
use crate::theme::{EffectiveMode, ThemeChoice};

/// Display order of the selector entries.
const MENU_ORDER: [ThemeChoice; 3] = [ThemeChoice::Light, ThemeChoice::Dark, ThemeChoice::System];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub choice: ThemeChoice,
    pub label: &'static str,
    pub icon: &'static str,
    pub active: bool,
}

impl MenuEntry {
    fn for_choice(choice: ThemeChoice, current: ThemeChoice) -> Self {
        Self {
            choice,
            label: choice_label(choice),
            icon: choice_icon(choice),
            active: choice == current,
        }
    }

    /// Text as rendered in the dropdown, icon first.
    pub fn text(&self) -> String {
        format!("{} {}", self.icon, self.label)
    }

    pub fn select<S: PreferenceStore>(
        &self,
        controller: &mut ThemeModeController<S>,
    ) -> StateResult<EffectiveMode> {
        controller.select(self.choice)
    }
}

/// Dropdown contract for the navbar theme selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeMenu {
    pub entries: Vec<MenuEntry>,
    pub trigger_glyph: &'static str,
}

impl ThemeMenu {
    /// A disabled switch keeps the trigger glyph but offers no entries.
    pub fn build(choice: ThemeChoice, effective: EffectiveMode, disabled: bool) -> Self {
        let entries = if disabled {
            Vec::new()
        } else {
            MENU_ORDER
                .iter()
                .map(|candidate| MenuEntry::for_choice(*candidate, choice))
                .collect()
        };
        Self {
            entries,
            trigger_glyph: effective.glyph(),
        }
    }

    pub fn active_entry(&self) -> Option<&MenuEntry> {
        self.entries.iter().find(|entry| entry.active)
    }

    /// `None` when `index` is out of range.
    pub fn activate<S: PreferenceStore>(
        &self,
        index: usize,
        controller: &mut ThemeModeController<S>,
    ) -> Option<StateResult<EffectiveMode>> {
        self.entries
            .get(index)
            .map(|entry| entry.select(controller))
    }
}

fn choice_label(choice: ThemeChoice) -> &'static str {
    match choice {
        ThemeChoice::System => "System",
        ThemeChoice::Light => "Light",
        ThemeChoice::Dark => "Dark",
    }
}

fn choice_icon(choice: ThemeChoice) -> &'static str {
    match choice {
        ThemeChoice::System => "🖥️",
        ThemeChoice::Light => "☀️",
        ThemeChoice::Dark => "🌙",
    }
}
