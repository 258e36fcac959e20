use std::cell::Cell;

use super::{HandlerRegistry, PreferenceHandler, PreferenceSignal, SubscriptionId};

/// Signal whose value is set by the caller. Notifies on every change.
#[derive(Default)]
pub struct ManualSignal {
    prefers_dark: Cell<Option<bool>>,
    registry: HandlerRegistry,
}

impl ManualSignal {
    pub fn new(prefers_dark: Option<bool>) -> Self {
        Self {
            prefers_dark: Cell::new(prefers_dark),
            registry: HandlerRegistry::default(),
        }
    }

    pub fn set_prefers_dark(&self, prefers_dark: Option<bool>) {
        let previous = self.prefers_dark.replace(prefers_dark);
        if previous == prefers_dark {
            return;
        }
        if let Some(value) = prefers_dark {
            self.registry.dispatch(value);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

impl PreferenceSignal for ManualSignal {
    fn prefers_dark(&self) -> Option<bool> {
        self.prefers_dark.get()
    }

    fn subscribe(&self, handler: PreferenceHandler) -> SubscriptionId {
        self.registry.insert(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.remove(id);
    }
}
