//! Session lifecycle: which capability categories keep a dialog turn alive,
//! and expiry once none do.
//!
//! All state lives behind one lock, so `set`/`activate`/`deactivate` and
//! timer fires for a turn observe a single total order. Observers are
//! notified after the triggering mutation has committed, outside the lock.

#[cfg(test)]
mod tests;

use crate::config::SessionConfig;
use crate::lock::lock_or_recover;
use crate::observer::ObserverSet;
use crate::turn::{CapabilityCategory, Session, TurnId};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::debug;

/// Notified when sessions enter and leave the manager's table.
pub trait SessionObserver: Send + Sync {
    fn session_set(&self, session: &Session);
    fn session_unset(&self, session: &Session);
}

/// Pending expiry for one turn. Dropping the handle wakes and cancels the
/// timer thread; the generation id rejects fires that lost a race with
/// `activate`.
struct ExpiryTimer {
    generation: u64,
    _cancel: Sender<()>,
}

#[derive(Default)]
struct State {
    sessions: HashMap<TurnId, Session>,
    active_list: HashMap<TurnId, HashSet<CapabilityCategory>>,
    timers: HashMap<TurnId, ExpiryTimer>,
}

struct Inner {
    config: SessionConfig,
    state: Mutex<State>,
    observers: ObserverSet<dyn SessionObserver>,
    next_generation: AtomicU64,
}

/// Tracks one `Session` per dialog turn and expires it after inactivity.
/// Cloning shares the instance.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                observers: ObserverSet::new(),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn add_observer(&self, observer: &Arc<dyn SessionObserver>) {
        self.inner.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn SessionObserver>) {
        self.inner.observers.remove(observer);
    }

    /// Register `session`, replacing any prior session under the same turn
    /// id, and arm its expiry timer.
    pub fn set(&self, session: Session) {
        {
            let mut state = lock_or_recover(&self.inner.state, "session_state");
            debug!(turn_id = %session.turn_id, "session set");
            state.sessions.insert(session.turn_id.clone(), session.clone());
            Inner::arm_timer(&self.inner, &mut state, &session);
        }
        self.inner.observers.notify(|o| o.session_set(&session));
    }

    /// Mark `category` as holding the turn active; cancels any pending
    /// expiry. Idempotent.
    pub fn activate(&self, turn_id: &TurnId, category: CapabilityCategory) {
        let mut state = lock_or_recover(&self.inner.state, "session_state");
        debug!(%turn_id, category = category.name(), "session activate");
        state.timers.remove(turn_id);
        state
            .active_list
            .entry(turn_id.clone())
            .or_default()
            .insert(category);
    }

    /// Release `category`'s hold. When the last holder leaves, the active
    /// entry is removed and, if a session still exists, a fresh expiry timer
    /// is armed. Unknown turn ids and categories are silent no-ops.
    pub fn deactivate(&self, turn_id: &TurnId, category: CapabilityCategory) {
        let mut state = lock_or_recover(&self.inner.state, "session_state");
        debug!(%turn_id, category = category.name(), "session deactivate");
        let Some(holders) = state.active_list.get_mut(turn_id) else {
            return;
        };
        holders.remove(&category);
        if holders.is_empty() {
            // Never store an empty set; absence means "not held".
            state.active_list.remove(turn_id);
            if let Some(session) = state.sessions.get(turn_id).cloned() {
                Inner::arm_timer(&self.inner, &mut state, &session);
            }
        }
    }

    /// Snapshot of sessions currently held by at least one category.
    pub fn active_sessions(&self) -> Vec<Session> {
        let state = lock_or_recover(&self.inner.state, "session_state");
        state
            .active_list
            .iter()
            .filter(|(_, holders)| !holders.is_empty())
            .filter_map(|(turn_id, _)| state.sessions.get(turn_id).cloned())
            .collect()
    }

    /// The stored session for `turn_id`, if it has not expired.
    pub fn session(&self, turn_id: &TurnId) -> Option<Session> {
        let state = lock_or_recover(&self.inner.state, "session_state");
        state.sessions.get(turn_id).cloned()
    }

    #[cfg(test)]
    pub(crate) fn debug_has_timer(&self, turn_id: &TurnId) -> bool {
        let state = lock_or_recover(&self.inner.state, "session_state");
        state.timers.contains_key(turn_id)
    }

    #[cfg(test)]
    pub(crate) fn debug_active_categories(
        &self,
        turn_id: &TurnId,
    ) -> Option<HashSet<CapabilityCategory>> {
        let state = lock_or_recover(&self.inner.state, "session_state");
        state.active_list.get(turn_id).cloned()
    }
}

impl Inner {
    /// Arm (or re-arm) the expiry timer for `session`. Overwriting the map
    /// entry drops the previous handle, cancelling it, so at most one timer
    /// is pending per turn.
    fn arm_timer(inner: &Arc<Inner>, state: &mut State, session: &Session) {
        let generation = inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let weak = Arc::downgrade(inner);
        let timeout = inner.config.timeout();
        let turn_id = session.turn_id.clone();
        thread::spawn(move || {
            if matches!(cancel_rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
                if let Some(inner) = weak.upgrade() {
                    inner.expire(generation, &turn_id);
                }
            }
        });
        state.timers.insert(
            session.turn_id.clone(),
            ExpiryTimer {
                generation,
                _cancel: cancel_tx,
            },
        );
    }

    fn expire(self: &Arc<Self>, generation: u64, turn_id: &TurnId) {
        let expired = {
            let mut state = lock_or_recover(&self.state, "session_state");
            match state.timers.get(turn_id) {
                Some(timer) if timer.generation == generation => {
                    state.timers.remove(turn_id);
                    state.sessions.remove(turn_id)
                }
                // A newer timer or an activation superseded this fire.
                _ => None,
            }
        };
        if let Some(session) = expired {
            debug!(turn_id = %session.turn_id, "session expired");
            self.observers.notify(|o| o.session_unset(&session));
        }
    }
}
