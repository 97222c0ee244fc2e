//! Per-component observer registries.
//!
//! Each stateful component owns its own `ObserverSet`; nothing here is
//! process-wide. Observers are held weakly so a dropped observer never keeps
//! a component alive, and dead entries are pruned on the next notification.

use crate::lock::lock_or_recover;
use std::sync::{Arc, Mutex, Weak};

pub struct ObserverSet<T: ?Sized> {
    observers: Mutex<Vec<Weak<T>>>,
}

impl<T: ?Sized> ObserverSet<T> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, observer: &Arc<T>) {
        let mut observers = lock_or_recover(&self.observers, "observer_set");
        observers.push(Arc::downgrade(observer));
    }

    pub fn remove(&self, observer: &Arc<T>) {
        let mut observers = lock_or_recover(&self.observers, "observer_set");
        observers.retain(|candidate| match candidate.upgrade() {
            Some(live) => !Arc::ptr_eq(&live, observer),
            None => false,
        });
    }

    /// Notify every live observer. Called after the triggering mutation has
    /// committed; the registry lock is not held while `f` runs.
    pub fn notify(&self, f: impl Fn(&T)) {
        let live: Vec<Arc<T>> = {
            let mut observers = lock_or_recover(&self.observers, "observer_set");
            observers.retain(|candidate| candidate.strong_count() > 0);
            observers
                .iter()
                .filter_map(|candidate| candidate.upgrade())
                .collect()
        };
        for observer in live {
            f(&observer);
        }
    }

    pub fn len(&self) -> usize {
        let observers = lock_or_recover(&self.observers, "observer_set");
        observers
            .iter()
            .filter(|candidate| candidate.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for ObserverSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
