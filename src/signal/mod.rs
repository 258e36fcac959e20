//! OS color-scheme preference sources.

mod command;
#[cfg(feature = "gtk")]
mod gtk;
mod manual;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use command::{
    parse_gsettings_color_scheme, parse_gsettings_gtk_theme, parse_macos_interface_style,
    parse_windows_apps_use_light_theme, CommandPreferenceSignal,
};
#[cfg(feature = "gtk")]
pub use gtk::GtkPreferenceSignal;
pub use manual::ManualSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type PreferenceHandler = Box<dyn Fn(bool)>;

/// A synchronously queryable, subscribable "prefers dark" signal.
pub trait PreferenceSignal {
    /// `None` when the platform cannot report a preference.
    fn prefers_dark(&self) -> Option<bool>;
    fn subscribe(&self, handler: PreferenceHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Unsubscribes from the signal when dropped.
pub struct SystemSubscription {
    signal: Rc<dyn PreferenceSignal>,
    id: SubscriptionId,
}

impl SystemSubscription {
    pub fn new(signal: Rc<dyn PreferenceSignal>, handler: PreferenceHandler) -> Self {
        let id = signal.subscribe(handler);
        tracing::debug!(?id, "subscribed to system color-scheme changes");
        Self { signal, id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for SystemSubscription {
    fn drop(&mut self) {
        self.signal.unsubscribe(self.id);
        tracing::debug!(id = ?self.id, "unsubscribed from system color-scheme changes");
    }
}

impl std::fmt::Debug for SystemSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Handler bookkeeping shared by the signal implementations.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(bool)>)>>,
}

impl HandlerRegistry {
    pub(crate) fn insert(&self, handler: PreferenceHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.handlers.borrow_mut().push((id, Rc::from(handler)));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Handlers may subscribe or unsubscribe while being notified.
    pub(crate) fn dispatch(&self, prefers_dark: bool) {
        let snapshot: Vec<Rc<dyn Fn(bool)>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(prefers_dark);
        }
    }
}
