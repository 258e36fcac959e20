//! Color-mode selection, persistence and system-preference tracking.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::config::ColorModeConfig;
use crate::menu::ThemeMenu;
use crate::signal::{PreferenceSignal, SystemSubscription};
use crate::state::{ControllerState, StateError, StateMachine, StateResult, ThemeEvent};
use crate::storage::{PreferenceStore, StorageError};
use crate::theme::{EffectiveMode, ThemeChoice};

type ModeListener = Rc<dyn Fn(EffectiveMode)>;

/// State reachable from the system-preference handler.
struct SharedMode {
    choice: ThemeChoice,
    effective: EffectiveMode,
    listeners: Vec<ModeListener>,
}

impl SharedMode {
    /// Applies `choice`/`effective` together and returns the listeners to
    /// notify, if the effective mode changed.
    fn update(
        &mut self,
        choice: ThemeChoice,
        effective: EffectiveMode,
    ) -> Option<Vec<ModeListener>> {
        self.choice = choice;
        if self.effective == effective {
            return None;
        }
        self.effective = effective;
        Some(self.listeners.clone())
    }
}

fn apply(shared: &RefCell<SharedMode>, choice: ThemeChoice, effective: EffectiveMode) {
    let listeners = shared.borrow_mut().update(choice, effective);
    if let Some(listeners) = listeners {
        tracing::info!(
            choice = %choice,
            effective = %effective,
            "effective color mode changed"
        );
        for listener in listeners {
            listener(effective);
        }
    }
}

pub struct ThemeModeController<S: PreferenceStore> {
    config: ColorModeConfig,
    store: S,
    signal: Rc<dyn PreferenceSignal>,
    machine: StateMachine,
    shared: Rc<RefCell<SharedMode>>,
    subscription: Option<SystemSubscription>,
}

impl<S: PreferenceStore> ThemeModeController<S> {
    pub fn new(config: ColorModeConfig, store: S, signal: Rc<dyn PreferenceSignal>) -> Self {
        let effective = config.default_mode;
        Self {
            config,
            store,
            signal,
            machine: StateMachine::new(),
            shared: Rc::new(RefCell::new(SharedMode {
                choice: ThemeChoice::System,
                effective,
                listeners: Vec::new(),
            })),
            subscription: None,
        }
    }

    /// Restores the persisted choice and applies the effective mode.
    ///
    /// Runs once; storage failures degrade to [`ThemeChoice::System`].
    pub fn initialize(&mut self) -> StateResult<EffectiveMode> {
        let from = self.machine.state();
        if from != ControllerState::SystemPendingInit {
            tracing::warn!(?from, "color mode controller already initialized");
            return Err(StateError::InvalidStateTransition {
                from,
                event: ThemeEvent::Initialize(self.choice()),
            });
        }

        let choice = self.restore_choice();
        self.machine.transition(ThemeEvent::Initialize(choice))?;
        tracing::info!(choice = %choice, "initialized color mode");
        Ok(self.enter(choice))
    }

    /// Applies an explicit user choice. Selecting the current choice again is a no-op
    /// apart from re-syncing with the OS in system mode.
    pub fn select(&mut self, choice: ThemeChoice) -> StateResult<EffectiveMode> {
        self.machine.transition(ThemeEvent::Select(choice))?;
        tracing::info!(choice = %choice, "color mode selected");

        let key = self.config.storage_key.clone();
        match choice {
            ThemeChoice::System => self.remove_key(&key),
            ThemeChoice::Light | ThemeChoice::Dark => {
                // Unsubscribe first so no OS notification lands on the explicit choice.
                self.subscription = None;
                self.write_key(&key, choice.as_str());
            }
        }
        Ok(self.enter(choice))
    }

    pub fn choice(&self) -> ThemeChoice {
        self.shared.borrow().choice
    }

    pub fn effective_mode(&self) -> EffectiveMode {
        self.shared.borrow().effective
    }

    /// True while subscribed to system preference changes.
    pub fn is_following_system(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn state(&self) -> ControllerState {
        self.machine.state()
    }

    pub fn config(&self) -> &ColorModeConfig {
        &self.config
    }

    /// Registers a listener called synchronously on every effective mode change.
    pub fn on_change(&mut self, listener: impl Fn(EffectiveMode) + 'static) {
        self.shared.borrow_mut().listeners.push(Rc::new(listener));
    }

    pub fn menu(&self) -> ThemeMenu {
        ThemeMenu::build(
            self.choice(),
            self.effective_mode(),
            self.config.disable_switch,
        )
    }

    /// Manages the subscription for `choice` and applies its effective mode.
    fn enter(&mut self, choice: ThemeChoice) -> EffectiveMode {
        let effective = match choice.explicit_mode() {
            Some(mode) => {
                self.subscription = None;
                mode
            }
            None => {
                if self.subscription.is_none() {
                    self.subscription = Some(self.subscribe_to_system());
                }
                self.system_mode()
            }
        };
        apply(&self.shared, choice, effective);
        effective
    }

    fn system_mode(&self) -> EffectiveMode {
        resolve_system_mode(self.signal.prefers_dark(), self.config.default_mode)
    }

    fn subscribe_to_system(&self) -> SystemSubscription {
        let shared: Weak<RefCell<SharedMode>> = Rc::downgrade(&self.shared);
        SystemSubscription::new(
            Rc::clone(&self.signal),
            Box::new(move |prefers_dark: bool| {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                if shared.borrow().choice != ThemeChoice::System {
                    tracing::debug!(
                        prefers_dark,
                        "ignoring system change under explicit choice"
                    );
                    return;
                }
                tracing::debug!(prefers_dark, "system color scheme notification");
                apply(
                    &shared,
                    ThemeChoice::System,
                    EffectiveMode::from_prefers_dark(prefers_dark),
                );
            }),
        )
    }

    fn restore_choice(&mut self) -> ThemeChoice {
        let key = self.config.storage_key.clone();
        let persisted = match self.store.get(&key) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    key = key.as_str(),
                    ?err,
                    "failed to read color mode preference; treating as unset"
                );
                if matches!(err, StorageError::Parse { .. }) {
                    self.remove_key(&key);
                }
                None
            }
        };
        let mut restored = match persisted {
            Some(raw) => {
                let choice = ThemeChoice::from_persisted(&raw);
                if choice.is_none() {
                    tracing::warn!(
                        key = key.as_str(),
                        value = raw.as_str(),
                        "clearing invalid persisted color mode"
                    );
                    self.remove_key(&key);
                }
                choice
            }
            None => None,
        };

        for legacy in self.config.legacy_keys.clone() {
            let Some(raw) = self.read_key(&legacy) else {
                continue;
            };
            if restored.is_none() {
                if let Some(choice) = ThemeChoice::from_persisted(&raw) {
                    tracing::info!(
                        from = legacy.as_str(),
                        to = key.as_str(),
                        choice = %choice,
                        "migrating legacy color mode key"
                    );
                    self.write_key(&key, choice.as_str());
                    restored = Some(choice);
                }
            }
            self.remove_key(&legacy);
        }

        restored.unwrap_or(ThemeChoice::System)
    }

    fn read_key(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap_or_else(|err| {
            tracing::warn!(
                key,
                ?err,
                "failed to read color mode preference; treating as unset"
            );
            None
        })
    }

    fn write_key(&mut self, key: &str, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            tracing::warn!(key, value, ?err, "failed to persist color mode preference");
        }
    }

    fn remove_key(&mut self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            tracing::warn!(key, ?err, "failed to clear color mode preference");
        }
    }
}

pub fn resolve_system_mode(prefers_dark: Option<bool>, fallback: EffectiveMode) -> EffectiveMode {
    prefers_dark.map_or(fallback, EffectiveMode::from_prefers_dark)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{ManualSignal, PreferenceHandler, SubscriptionId};
    use crate::state::StateError;
    use crate::storage::{JsonFileStore, MemoryStore, StorageError, StorageResult};
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "theme";
    const LEGACY_KEY: &str = "docusaurus-theme";

    fn controller(
        store: &MemoryStore,
        signal: &Rc<ManualSignal>,
    ) -> ThemeModeController<MemoryStore> {
        ThemeModeController::new(
            ColorModeConfig::default(),
            store.clone(),
            Rc::clone(signal) as Rc<dyn PreferenceSignal>,
        )
    }

    fn initialized(
        store: &MemoryStore,
        signal: &Rc<ManualSignal>,
    ) -> ThemeModeController<MemoryStore> {
        let mut controller = controller(store, signal);
        controller.initialize().expect("first initialize should succeed");
        controller
    }

    #[test]
    fn persisted_dark_initializes_dark_without_subscription() {
        let store = MemoryStore::with_entry(KEY, "dark");
        let signal = Rc::new(ManualSignal::new(Some(false)));

        let controller = initialized(&store, &signal);

        assert_eq!(controller.effective_mode(), EffectiveMode::Dark);
        assert_eq!(controller.choice(), ThemeChoice::Dark);
        assert_eq!(controller.state(), ControllerState::DarkActive);
        assert!(!controller.is_following_system());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn no_preference_follows_dark_os_with_subscription() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(true)));

        let controller = initialized(&store, &signal);

        assert_eq!(controller.effective_mode(), EffectiveMode::Dark);
        assert_eq!(controller.choice(), ThemeChoice::System);
        assert_eq!(controller.state(), ControllerState::SystemActive);
        assert!(controller.is_following_system());
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn os_flip_updates_mode_while_following_system() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let controller = initialized(&store, &signal);
        assert_eq!(controller.effective_mode(), EffectiveMode::Light);

        signal.set_prefers_dark(Some(true));

        assert_eq!(controller.effective_mode(), EffectiveMode::Dark);
        assert_eq!(controller.choice(), ThemeChoice::System);
    }

    #[test]
    fn selecting_light_stops_os_tracking_and_persists() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let mut controller = initialized(&store, &signal);

        let mode = controller.select(ThemeChoice::Light).unwrap();
        assert_eq!(mode, EffectiveMode::Light);
        assert_eq!(signal.subscriber_count(), 0);
        assert_eq!(store.get(KEY).unwrap().as_deref(), Some("light"));

        signal.set_prefers_dark(Some(true));
        assert_eq!(controller.effective_mode(), EffectiveMode::Light);
    }

    #[test]
    fn selecting_system_after_dark_clears_store_and_resyncs() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let mut controller = initialized(&store, &signal);

        controller.select(ThemeChoice::Dark).unwrap();
        assert_eq!(controller.effective_mode(), EffectiveMode::Dark);

        let mode = controller.select(ThemeChoice::System).unwrap();
        assert_eq!(mode, EffectiveMode::Light);
        assert_eq!(store.get(KEY).unwrap(), None);
        assert!(controller.is_following_system());

        signal.set_prefers_dark(Some(true));
        assert_eq!(controller.effective_mode(), EffectiveMode::Dark);
    }

    #[test]
    fn repeated_select_is_idempotent() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(true)));
        let mut controller = initialized(&store, &signal);

        controller.select(ThemeChoice::System).unwrap();
        controller.select(ThemeChoice::System).unwrap();
        assert_eq!(signal.subscriber_count(), 1);
        assert_eq!(controller.effective_mode(), EffectiveMode::Dark);
        assert!(store.snapshot().is_empty());

        controller.select(ThemeChoice::Dark).unwrap();
        let before = store.snapshot();
        controller.select(ThemeChoice::Dark).unwrap();
        assert_eq!(store.snapshot(), before);
        assert_eq!(signal.subscriber_count(), 0);
        assert_eq!(controller.state(), ControllerState::DarkActive);
    }

    #[test]
    fn choices_survive_a_simulated_reload() {
        for choice in [ThemeChoice::Light, ThemeChoice::Dark] {
            let store = MemoryStore::new();
            let signal = Rc::new(ManualSignal::new(Some(choice != ThemeChoice::Dark)));
            let mut first = initialized(&store, &signal);
            let selected = first.select(choice).unwrap();
            drop(first);

            let reloaded = initialized(&store, &signal);
            assert_eq!(reloaded.choice(), choice);
            assert_eq!(reloaded.effective_mode(), selected);
            assert!(!reloaded.is_following_system());
        }
    }

    #[test]
    fn system_choice_tracks_live_os_after_reload() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let mut first = initialized(&store, &signal);
        first.select(ThemeChoice::Dark).unwrap();
        first.select(ThemeChoice::System).unwrap();
        drop(first);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set_prefers_dark(Some(true));
        let reloaded = initialized(&store, &signal);
        assert_eq!(reloaded.choice(), ThemeChoice::System);
        assert_eq!(reloaded.effective_mode(), EffectiveMode::Dark);

        signal.set_prefers_dark(Some(false));
        assert_eq!(reloaded.effective_mode(), EffectiveMode::Light);
    }

    #[test]
    fn invalid_persisted_value_is_cleared_and_reads_as_system() {
        let store = MemoryStore::with_entry(KEY, "system");
        let signal = Rc::new(ManualSignal::new(Some(true)));

        let controller = initialized(&store, &signal);

        assert_eq!(controller.choice(), ThemeChoice::System);
        assert_eq!(controller.effective_mode(), EffectiveMode::Dark);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn legacy_key_is_migrated_to_canonical_key() {
        let store = MemoryStore::with_entry(LEGACY_KEY, "dark");
        let signal = Rc::new(ManualSignal::new(Some(false)));

        let controller = initialized(&store, &signal);

        assert_eq!(controller.choice(), ThemeChoice::Dark);
        assert_eq!(
            store.snapshot(),
            BTreeMap::from([(KEY.to_string(), "dark".to_string())])
        );
    }

    #[test]
    fn canonical_key_wins_over_legacy_key() {
        let mut store = MemoryStore::with_entry(KEY, "light");
        store.set(LEGACY_KEY, "dark").unwrap();
        let signal = Rc::new(ManualSignal::new(Some(true)));

        let controller = initialized(&store, &signal);

        assert_eq!(controller.choice(), ThemeChoice::Light);
        assert_eq!(store.get(LEGACY_KEY).unwrap(), None);
        assert_eq!(store.get(KEY).unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn unknown_os_preference_uses_default_mode() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(None));
        let config = ColorModeConfig {
            default_mode: EffectiveMode::Dark,
            ..ColorModeConfig::default()
        };
        let mut controller = ThemeModeController::new(
            config,
            store,
            Rc::clone(&signal) as Rc<dyn PreferenceSignal>,
        );

        assert_eq!(controller.initialize().unwrap(), EffectiveMode::Dark);
        assert!(controller.is_following_system());
    }

    struct UnavailableStore;

    impl PreferenceStore for UnavailableStore {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::MissingHomeDirectory)
        }

        fn set(&mut self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::MissingHomeDirectory)
        }

        fn remove(&mut self, _key: &str) -> StorageResult<()> {
            Err(StorageError::MissingHomeDirectory)
        }
    }

    #[test]
    fn unavailable_storage_degrades_to_system() {
        let signal = Rc::new(ManualSignal::new(Some(true)));
        let mut controller = ThemeModeController::new(
            ColorModeConfig::default(),
            UnavailableStore,
            Rc::clone(&signal) as Rc<dyn PreferenceSignal>,
        );

        assert_eq!(controller.initialize().unwrap(), EffectiveMode::Dark);
        assert_eq!(controller.choice(), ThemeChoice::System);

        assert_eq!(
            controller.select(ThemeChoice::Light).unwrap(),
            EffectiveMode::Light
        );
        assert_eq!(controller.state(), ControllerState::LightActive);
    }

    #[test]
    fn listeners_fire_once_per_effective_change() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let mut controller = controller(&store, &signal);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            controller.on_change(move |mode| seen.borrow_mut().push(mode));
        }

        controller.initialize().unwrap();
        controller.select(ThemeChoice::Dark).unwrap();
        controller.select(ThemeChoice::Dark).unwrap();
        signal.set_prefers_dark(Some(true));
        controller.select(ThemeChoice::System).unwrap();
        signal.set_prefers_dark(Some(false));

        assert_eq!(
            *seen.borrow(),
            vec![EffectiveMode::Dark, EffectiveMode::Light]
        );
    }

    /// Keeps handlers registered after `unsubscribe`, like a listener that
    /// fires once more after removal.
    struct LeakySignal(ManualSignal);

    impl PreferenceSignal for LeakySignal {
        fn prefers_dark(&self) -> Option<bool> {
            self.0.prefers_dark()
        }

        fn subscribe(&self, handler: PreferenceHandler) -> SubscriptionId {
            self.0.subscribe(handler)
        }

        fn unsubscribe(&self, _id: SubscriptionId) {}
    }

    #[test]
    fn late_notification_after_explicit_choice_has_no_effect() {
        let signal = Rc::new(LeakySignal(ManualSignal::new(Some(false))));
        let mut controller = ThemeModeController::new(
            ColorModeConfig::default(),
            MemoryStore::new(),
            Rc::clone(&signal) as Rc<dyn PreferenceSignal>,
        );
        controller.initialize().unwrap();
        let calls = Rc::new(Cell::new(0));
        {
            let calls = Rc::clone(&calls);
            controller.on_change(move |_| calls.set(calls.get() + 1));
        }

        controller.select(ThemeChoice::Light).unwrap();
        signal.0.set_prefers_dark(Some(true));

        assert_eq!(signal.0.subscriber_count(), 1);
        assert_eq!(controller.effective_mode(), EffectiveMode::Light);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn select_before_initialize_is_rejected() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let mut controller = controller(&store, &signal);

        let err = controller.select(ThemeChoice::Dark).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidStateTransition {
                from: ControllerState::SystemPendingInit,
                event: ThemeEvent::Select(ThemeChoice::Dark),
            }
        );
        assert!(store.snapshot().is_empty());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn second_initialize_is_rejected_without_side_effects() {
        let mut store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let mut controller = initialized(&store, &signal);

        store.set(KEY, "dark").unwrap();
        assert!(controller.initialize().is_err());
        assert_eq!(controller.effective_mode(), EffectiveMode::Light);
        assert_eq!(controller.state(), ControllerState::SystemActive);
        assert_eq!(controller.machine.history().len(), 1);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn dropping_controller_releases_subscription() {
        let store = MemoryStore::new();
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let controller = initialized(&store, &signal);
        assert_eq!(signal.subscriber_count(), 1);
        drop(controller);
        assert_eq!(signal.subscriber_count(), 0);
    }

    fn with_temp_root<F: FnOnce(&Path)>(f: F) {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let root = std::env::temp_dir().join(format!(
            "colormode-controller-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&root).unwrap();
        f(&root);
        let _ = fs::remove_dir_all(&root);
    }

    fn file_controller(
        store: JsonFileStore,
        signal: &Rc<ManualSignal>,
    ) -> ThemeModeController<JsonFileStore> {
        ThemeModeController::new(
            ColorModeConfig::default(),
            store,
            Rc::clone(signal) as Rc<dyn PreferenceSignal>,
        )
    }

    #[test]
    fn truncated_preference_file_falls_back_to_system_and_is_repaired() {
        with_temp_root(|root| {
            let path = root.join("preferences.json");
            fs::write(&path, r#"{ "theme": "da"#).unwrap();
            let signal = Rc::new(ManualSignal::new(Some(true)));
            let mut controller = file_controller(JsonFileStore::with_path(&path), &signal);

            assert_eq!(controller.initialize().unwrap(), EffectiveMode::Dark);
            assert_eq!(controller.choice(), ThemeChoice::System);

            let repaired: BTreeMap<String, String> =
                serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            assert!(!repaired.contains_key(KEY));
        });
    }

    #[test]
    fn store_without_home_still_initializes_and_selects() {
        let signal = Rc::new(ManualSignal::new(Some(false)));
        let mut controller =
            file_controller(JsonFileStore::with_default_path_from(None, None), &signal);

        assert_eq!(controller.initialize().unwrap(), EffectiveMode::Light);
        assert_eq!(controller.choice(), ThemeChoice::System);
        assert!(controller.is_following_system());

        assert_eq!(
            controller.select(ThemeChoice::Dark).unwrap(),
            EffectiveMode::Dark
        );
        assert_eq!(controller.state(), ControllerState::DarkActive);
    }

    #[test]
    fn resolve_system_mode_prefers_signal_over_fallback() {
        assert_eq!(
            resolve_system_mode(Some(true), EffectiveMode::Light),
            EffectiveMode::Dark
        );
        assert_eq!(
            resolve_system_mode(None, EffectiveMode::Dark),
            EffectiveMode::Dark
        );
    }
}
