use super::{SessionManager, SessionObserver};
use crate::config::SessionConfig;
use crate::turn::{CapabilityCategory, Session, TurnId};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const ASR: CapabilityCategory = CapabilityCategory::AutomaticSpeechRecognition;
const TEXT: CapabilityCategory = CapabilityCategory::Text;

fn manager(timeout_ms: u64) -> SessionManager {
    SessionManager::new(SessionConfig {
        session_timeout_ms: timeout_ms,
    })
}

#[derive(Default)]
struct RecordingObserver {
    set: Mutex<Vec<TurnId>>,
    unset: Mutex<Vec<TurnId>>,
}

impl RecordingObserver {
    fn unset_turns(&self) -> Vec<TurnId> {
        self.unset.lock().unwrap().clone()
    }

    fn set_turns(&self) -> Vec<TurnId> {
        self.set.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn session_set(&self, session: &Session) {
        self.set.lock().unwrap().push(session.turn_id.clone());
    }

    fn session_unset(&self, session: &Session) {
        self.unset.lock().unwrap().push(session.turn_id.clone());
    }
}

fn observed(timeout_ms: u64) -> (SessionManager, Arc<RecordingObserver>) {
    let manager = manager(timeout_ms);
    let recorder = Arc::new(RecordingObserver::default());
    let as_dyn: Arc<dyn SessionObserver> = recorder.clone();
    manager.add_observer(&as_dyn);
    (manager, recorder)
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn set_arms_exactly_one_timer() {
    let manager = manager(60_000);
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));
    assert!(manager.debug_has_timer(&turn));
}

#[test]
fn activate_cancels_the_timer_and_repeated_activation_arms_none() {
    let manager = manager(60_000);
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));

    manager.activate(&turn, ASR);
    assert!(!manager.debug_has_timer(&turn));
    manager.activate(&turn, ASR);
    assert!(!manager.debug_has_timer(&turn));

    manager.deactivate(&turn, ASR);
    assert!(manager.debug_has_timer(&turn));
}

#[test]
fn deactivating_the_last_category_removes_the_entry() {
    let manager = manager(60_000);
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));

    manager.activate(&turn, ASR);
    manager.activate(&turn, TEXT);
    manager.deactivate(&turn, ASR);
    let holders = manager
        .debug_active_categories(&turn)
        .expect("entry survives while TEXT holds");
    assert_eq!(holders.len(), 1);
    assert!(!manager.debug_has_timer(&turn));

    manager.deactivate(&turn, TEXT);
    assert!(manager.debug_active_categories(&turn).is_none());
    assert!(manager.debug_has_timer(&turn));
}

#[test]
fn unactivated_session_expires_and_notifies_once() {
    let (manager, recorder) = observed(40);
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));
    assert_eq!(recorder.set_turns(), vec![turn.clone()]);

    wait_until("expiry", || manager.session(&turn).is_none());
    thread::sleep(Duration::from_millis(80));
    assert_eq!(recorder.unset_turns(), vec![turn.clone()]);
    assert!(manager.active_sessions().is_empty());
}

#[test]
fn activation_suppresses_expiry() {
    let (manager, recorder) = observed(40);
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));
    manager.activate(&turn, ASR);

    thread::sleep(Duration::from_millis(120));
    assert!(manager.session(&turn).is_some());
    assert!(recorder.unset_turns().is_empty());
}

#[test]
fn deactivate_on_unknown_ids_is_a_noop() {
    let manager = manager(60_000);
    let unknown = TurnId::generate();
    manager.deactivate(&unknown, ASR);
    assert!(manager.debug_active_categories(&unknown).is_none());
    assert!(!manager.debug_has_timer(&unknown));

    // Unknown category on a known turn is equally silent.
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));
    manager.activate(&turn, ASR);
    manager.deactivate(&turn, TEXT);
    assert!(manager.debug_active_categories(&turn).is_some());
}

#[test]
fn active_sessions_is_a_snapshot_of_held_turns() {
    let manager = manager(60_000);
    let held = TurnId::generate();
    let idle = TurnId::generate();
    manager.set(Session::new(held.clone()));
    manager.set(Session::new(idle.clone()));
    manager.activate(&held, ASR);

    let active = manager.active_sessions();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].turn_id, held);
}

#[test]
fn set_replaces_the_previous_session_for_a_turn() {
    let (manager, recorder) = observed(40);
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));
    manager.set(Session::new(turn.clone()));

    wait_until("expiry", || manager.session(&turn).is_none());
    thread::sleep(Duration::from_millis(80));
    // The superseded timer never fires; one session, one unset.
    assert_eq!(recorder.unset_turns(), vec![turn.clone()]);
}

#[test]
fn full_lifecycle_set_activate_deactivate_expire() {
    let (manager, recorder) = observed(50);
    let turn = TurnId::generate();
    manager.set(Session::new(turn.clone()));
    manager.activate(&turn, ASR);
    assert_eq!(manager.active_sessions().len(), 1);

    manager.deactivate(&turn, ASR);
    assert!(manager.active_sessions().is_empty());
    assert!(manager.session(&turn).is_some());

    wait_until("expiry after deactivate", || {
        manager.session(&turn).is_none()
    });
    thread::sleep(Duration::from_millis(80));
    assert_eq!(recorder.unset_turns(), vec![turn]);
}
