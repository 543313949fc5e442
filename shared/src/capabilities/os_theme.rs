use std::sync::{Mutex, PoisonError};

use super::subscription::{Listener, ListenerSet, Subscription};
use crate::model::Theme;

/// Live OS color-scheme signal.
pub trait OsThemeSource: Send + Sync {
    fn current(&self) -> Theme;

    fn subscribe(&self, listener: Listener<Theme>) -> Subscription;
}

/// Source driven by the shell (or a test) calling [`ManualOsTheme::set`].
#[derive(Default)]
pub struct ManualOsTheme {
    current: Mutex<Theme>,
    listeners: ListenerSet<Theme>,
}

impl ManualOsTheme {
    #[must_use]
    pub fn new(initial: Theme) -> Self {
        Self {
            current: Mutex::new(initial),
            listeners: ListenerSet::default(),
        }
    }

    /// Notifies listeners only when the value actually changes.
    pub fn set(&self, theme: Theme) {
        let changed = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *current != theme;
            *current = theme;
            changed
        };
        if changed {
            self.listeners.emit(&theme);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl OsThemeSource for ManualOsTheme {
    fn current(&self) -> Theme {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribe(&self, listener: Listener<Theme>) -> Subscription {
        self.listeners.subscribe(listener)
    }
}
