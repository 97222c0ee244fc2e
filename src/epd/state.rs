//! Pure endpoint-detection state machine.
//!
//! `transition` decides the next state and the cleanup effects for one
//! event; the driver in `detector.rs` executes the effects after committing
//! the state and notifies observers last. Keeping the decision pure keeps
//! the table testable without threads or I/O.

/// Phase of a listening run. Created in `Idle`; terminal states stay put
/// until the next `start()`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndpointState {
    Idle,
    Listening,
    SpeechStart,
    SpeechEnd,
    Timeout,
    Error,
}

impl EndpointState {
    /// States in which the pull loop may keep feeding the codec.
    pub fn keeps_pipeline(self) -> bool {
        matches!(
            self,
            EndpointState::Idle | EndpointState::Listening | EndpointState::SpeechStart
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EndpointState::SpeechEnd | EndpointState::Timeout | EndpointState::Error
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            EndpointState::Idle => "idle",
            EndpointState::Listening => "listening",
            EndpointState::SpeechStart => "speech_start",
            EndpointState::SpeechEnd => "speech_end",
            EndpointState::Timeout => "timeout",
            EndpointState::Error => "error",
        }
    }
}

/// Recognition-phase notification reported by the remote service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RemoteNotification {
    StartOfSpeech,
    EndOfSpeech,
    Error,
    /// Reported by some recognizers when a wake word was accepted in error.
    /// Intentionally a no-op until product behavior is defined.
    FalseAcceptance,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum EpdEvent {
    Started,
    Remote(RemoteNotification),
    ListeningTimedOut,
    StreamEnded,
    Stopped,
}

/// Cleanup work a transition requires, in execution order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    ArmListeningTimer,
    CancelListeningTimer,
    StopPipeline,
}

/// Decide the next state for `event`, or `None` when the event does not
/// apply in `state` (stale timers, notifications for finished runs,
/// redundant stops).
pub(crate) fn transition(
    state: EndpointState,
    event: EpdEvent,
) -> Option<(EndpointState, &'static [Effect])> {
    use EndpointState as S;
    use EpdEvent as E;

    const TEARDOWN: &[Effect] = &[Effect::CancelListeningTimer, Effect::StopPipeline];

    match (state, event) {
        (S::Idle, E::Started) => Some((S::Listening, &[Effect::ArmListeningTimer])),
        (S::Listening, E::Remote(RemoteNotification::StartOfSpeech)) => {
            Some((S::SpeechStart, &[]))
        }
        (S::Listening | S::SpeechStart, E::Remote(RemoteNotification::EndOfSpeech)) => {
            Some((S::SpeechEnd, TEARDOWN))
        }
        (S::Listening | S::SpeechStart, E::Remote(RemoteNotification::Error)) => {
            Some((S::Error, TEARDOWN))
        }
        (S::Listening, E::ListeningTimedOut) => Some((S::Timeout, TEARDOWN)),
        (S::Listening | S::SpeechStart, E::StreamEnded) => Some((S::Idle, TEARDOWN)),
        (S::Idle, E::Stopped) => None,
        (_, E::Stopped) => Some((S::Idle, TEARDOWN)),
        (_, E::Remote(RemoteNotification::FalseAcceptance)) => None,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_arms_the_listening_timer() {
        let (next, effects) = transition(EndpointState::Idle, EpdEvent::Started).expect("start");
        assert_eq!(next, EndpointState::Listening);
        assert_eq!(effects, &[Effect::ArmListeningTimer]);
    }

    #[test]
    fn start_of_speech_has_no_side_effects() {
        let (next, effects) = transition(
            EndpointState::Listening,
            EpdEvent::Remote(RemoteNotification::StartOfSpeech),
        )
        .expect("sos");
        assert_eq!(next, EndpointState::SpeechStart);
        assert!(effects.is_empty());
    }

    #[test]
    fn end_of_speech_tears_down_from_both_active_states() {
        for state in [EndpointState::Listening, EndpointState::SpeechStart] {
            let (next, effects) =
                transition(state, EpdEvent::Remote(RemoteNotification::EndOfSpeech))
                    .expect("eos");
            assert_eq!(next, EndpointState::SpeechEnd);
            assert!(effects.contains(&Effect::StopPipeline));
            assert!(effects.contains(&Effect::CancelListeningTimer));
        }
    }

    #[test]
    fn listening_timeout_is_terminal() {
        let (next, effects) =
            transition(EndpointState::Listening, EpdEvent::ListeningTimedOut).expect("timeout");
        assert_eq!(next, EndpointState::Timeout);
        assert!(effects.contains(&Effect::StopPipeline));
        assert!(next.is_terminal());
    }

    #[test]
    fn stale_timeout_after_speech_start_is_rejected() {
        assert!(transition(EndpointState::SpeechStart, EpdEvent::ListeningTimedOut).is_none());
        assert!(transition(EndpointState::SpeechEnd, EpdEvent::ListeningTimedOut).is_none());
    }

    #[test]
    fn stream_end_returns_to_idle_from_non_terminal_states() {
        for state in [EndpointState::Listening, EndpointState::SpeechStart] {
            let (next, _) = transition(state, EpdEvent::StreamEnded).expect("stream end");
            assert_eq!(next, EndpointState::Idle);
        }
        assert!(transition(EndpointState::Timeout, EpdEvent::StreamEnded).is_none());
    }

    #[test]
    fn stop_is_a_noop_from_idle() {
        assert!(transition(EndpointState::Idle, EpdEvent::Stopped).is_none());
    }

    #[test]
    fn stop_resets_terminal_states() {
        for state in [
            EndpointState::SpeechEnd,
            EndpointState::Timeout,
            EndpointState::Error,
        ] {
            let (next, _) = transition(state, EpdEvent::Stopped).expect("stop");
            assert_eq!(next, EndpointState::Idle);
        }
    }

    #[test]
    fn false_acceptance_never_transitions() {
        for state in [
            EndpointState::Idle,
            EndpointState::Listening,
            EndpointState::SpeechStart,
            EndpointState::SpeechEnd,
        ] {
            assert!(transition(
                state,
                EpdEvent::Remote(RemoteNotification::FalseAcceptance)
            )
            .is_none());
        }
    }

    #[test]
    fn terminal_states_ignore_remote_notifications() {
        for state in [
            EndpointState::SpeechEnd,
            EndpointState::Timeout,
            EndpointState::Error,
        ] {
            for kind in [
                RemoteNotification::StartOfSpeech,
                RemoteNotification::EndOfSpeech,
                RemoteNotification::Error,
            ] {
                assert!(transition(state, EpdEvent::Remote(kind)).is_none());
            }
        }
    }
}
