//! Observer registry: per-key callback lists, delivered in registration order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{ChangeEvent, StateKey, SubscriptionId};

/// Callback invoked synchronously on the thread performing a transition.
pub type Observer = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    key: StateKey,
    observer: Observer,
}

/// Ordered observer lists for one operation.
///
/// Notification never happens while the registry lock is held, so an
/// observer may register or unregister from inside its callback.
#[derive(Default)]
pub struct ObserverRegistry {
    entries: Mutex<Vec<Registration>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, id: SubscriptionId, key: StateKey, observer: Observer) {
        self.lock().push(Registration { id, key, observer });
    }

    /// Returns false if `id` was not registered.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|r| r.id != id);
        entries.len() != before
    }

    /// Observers currently registered for `key`, in registration order.
    pub fn snapshot(&self, key: StateKey) -> Vec<Observer> {
        self.lock()
            .iter()
            .filter(|r| r.key == key)
            .map(|r| Arc::clone(&r.observer))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Deliver `event` to every observer in `observers`, in order.
pub(crate) fn deliver(observers: &[Observer], event: &ChangeEvent) {
    for observer in observers {
        observer(event);
    }
}
