use std::cell::RefCell;
use std::rc::Rc;

use gtk4::glib::SignalHandlerId;
use gtk4::prelude::ObjectExt;

use super::{HandlerRegistry, PreferenceHandler, PreferenceSignal, SubscriptionId};

const WATCHED_PROPERTIES: &[&str] = &[
    "gtk-interface-color-scheme",
    "gtk-theme-name",
    "gtk-application-prefer-dark-theme",
];

/// Preference signal backed by `gtk4::Settings` property notifications.
///
/// GTK handlers are connected while at least one subscriber exists.
pub struct GtkPreferenceSignal {
    settings: gtk4::Settings,
    registry: Rc<HandlerRegistry>,
    connections: RefCell<Vec<SignalHandlerId>>,
}

impl GtkPreferenceSignal {
    /// `None` when GTK has no default display.
    pub fn for_default_display() -> Option<Self> {
        gtk4::Settings::default().map(Self::new)
    }

    pub fn new(settings: gtk4::Settings) -> Self {
        Self {
            settings,
            registry: Rc::new(HandlerRegistry::default()),
            connections: RefCell::new(Vec::new()),
        }
    }

    fn connect_settings(&self) {
        let properties = self.settings.list_properties();
        let handler_ids = WATCHED_PROPERTIES
            .iter()
            .copied()
            .filter(|name| properties.iter().any(|prop| prop.name() == *name))
            .map(|name| {
                let registry = Rc::clone(&self.registry);
                self.settings
                    .connect_notify_local(Some(name), move |settings, _| {
                        if let Some(prefers_dark) = prefers_dark_from_settings(settings) {
                            registry.dispatch(prefers_dark);
                        }
                    })
            })
            .collect();
        *self.connections.borrow_mut() = handler_ids;
    }
}

impl PreferenceSignal for GtkPreferenceSignal {
    fn prefers_dark(&self) -> Option<bool> {
        prefers_dark_from_settings(&self.settings)
    }

    fn subscribe(&self, handler: PreferenceHandler) -> SubscriptionId {
        let id = self.registry.insert(handler);
        if self.connections.borrow().is_empty() {
            self.connect_settings();
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.remove(id);
        if self.registry.len() == 0 {
            for handler_id in self.connections.borrow_mut().drain(..) {
                self.settings.disconnect(handler_id);
            }
        }
    }
}

fn prefers_dark_from_settings(settings: &gtk4::Settings) -> Option<bool> {
    if settings
        .list_properties()
        .iter()
        .any(|prop| prop.name() == "gtk-interface-color-scheme")
    {
        let color_scheme = settings.property_value("gtk-interface-color-scheme");
        if let Ok(raw_scheme) = color_scheme.get::<i32>() {
            match raw_scheme {
                // GTK_INTERFACE_COLOR_SCHEME_DARK
                2 => return Some(true),
                // GTK_INTERFACE_COLOR_SCHEME_LIGHT
                3 => return Some(false),
                _ => {}
            }
        }
    }

    if let Some(theme_name) = settings.gtk_theme_name() {
        let normalized = theme_name.trim().to_ascii_lowercase();
        if normalized.contains("dark") {
            return Some(true);
        }
    }

    #[allow(deprecated)]
    {
        Some(settings.is_gtk_application_prefer_dark_theme())
    }
}
