use crate::audio::AudioSource;
use crate::codec::EncodedFrame;
use crate::context::{ContextAggregator, ContextInfo, ContextProvider};
use crate::epd::{EndpointDetector, EndpointObserver, EndpointState, RemoteNotification};
use crate::error::Error;
use crate::lock::lock_or_recover;
use crate::observer::ObserverSet;
use crate::session::SessionManager;
use crate::transport::{
    AttachmentMessage, DeliveryOutcome, Directive, DirectiveRouter, DirectiveStatus, EventMessage,
    EventSender,
};
use crate::turn::{CapabilityCategory, Session, TurnId};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

pub const ASR_NAMESPACE: &str = "ASR";
pub const ASR_VERSION: &str = "1.0";
pub const ASR_ENGINE: &str = "server";

const DIRECTIVE_EXPECT_SPEECH: &str = "ExpectSpeech";
const DIRECTIVE_NOTIFY_RESULT: &str = "NotifyResult";

const EVENT_RECOGNIZE: &str = "Recognize";
const EVENT_LISTEN_TIMEOUT: &str = "ListenTimeout";
const EVENT_LISTEN_FAILED: &str = "ListenFailed";

/// Supplies a fresh pull source for each listening run.
pub trait AudioProvider: Send + Sync {
    fn open_source(&self) -> anyhow::Result<Box<dyn AudioSource>>;
}

/// Terminal outcome of one spoken turn, distinguishable by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    ListenTimeout,
    RecognitionFailed,
}

/// Notified when a spoken turn reaches a terminal outcome.
pub trait DialogObserver: Send + Sync {
    fn turn_finished(&self, turn_id: &TurnId, outcome: TurnOutcome);
}

struct CurrentTurn {
    turn_id: TurnId,
    attachment_seq: u32,
}

struct Inner {
    sessions: SessionManager,
    detector: EndpointDetector,
    events: Arc<dyn EventSender>,
    audio: Arc<dyn AudioProvider>,
    contexts: Arc<ContextAggregator>,
    current: Mutex<Option<CurrentTurn>>,
    observers: ObserverSet<dyn DialogObserver>,
}

/// Binds one spoken turn to a session and an endpoint-detector run, and
/// translates detector phases into outbound events.
#[derive(Clone)]
pub struct AsrAgent {
    inner: Arc<Inner>,
}

impl AsrAgent {
    pub fn new(
        sessions: SessionManager,
        detector: EndpointDetector,
        events: Arc<dyn EventSender>,
        audio: Arc<dyn AudioProvider>,
        contexts: Arc<ContextAggregator>,
    ) -> Self {
        let inner = Arc::new(Inner {
            sessions,
            detector: detector.clone(),
            events,
            audio,
            contexts: contexts.clone(),
            current: Mutex::new(None),
            observers: ObserverSet::new(),
        });
        let as_endpoint: Arc<dyn EndpointObserver> = inner.clone();
        detector.add_observer(&as_endpoint);
        let as_context: Arc<dyn ContextProvider> = inner.clone();
        contexts.add(&as_context);
        Self { inner }
    }

    /// Open a new spoken turn: session, activation, audio binding, and the
    /// announcing `Recognize` event. Returns the turn id immediately; the
    /// remote exchange completes asynchronously.
    pub fn begin_turn(&self) -> Result<TurnId, Error> {
        let turn_id = TurnId::generate();
        self.inner.sessions.set(Session::new(turn_id.clone()));
        self.inner.start_listening(turn_id.clone(), None)?;
        Ok(turn_id)
    }

    /// Wire this agent's directives into `router`.
    pub fn register_directives(&self, router: &DirectiveRouter) {
        let weak = Arc::downgrade(&self.inner);
        router.register(
            ASR_NAMESPACE,
            DIRECTIVE_EXPECT_SPEECH,
            Arc::new(move |directive| Inner::handle_expect_speech(&weak, directive)),
        );
        let weak = Arc::downgrade(&self.inner);
        router.register(
            ASR_NAMESPACE,
            DIRECTIVE_NOTIFY_RESULT,
            Arc::new(move |directive| Inner::handle_notify_result(&weak, directive)),
        );
    }

    /// Direct entry point for recognition-phase notifications, for
    /// transports that deliver them outside the directive channel.
    pub fn handle_notification(&self, kind: RemoteNotification) {
        self.inner.detector.handle_notification(kind);
    }

    pub fn add_observer(&self, observer: &Arc<dyn DialogObserver>) {
        self.inner.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn DialogObserver>) {
        self.inner.observers.remove(observer);
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        lock_or_recover(&self.inner.current, "asr_current")
            .as_ref()
            .map(|turn| turn.turn_id.clone())
    }

    pub fn detector(&self) -> &EndpointDetector {
        &self.inner.detector
    }

    /// Abort the in-flight turn, if any, without sending a failure event.
    pub fn cancel(&self) {
        let turn = lock_or_recover(&self.inner.current, "asr_current").take();
        self.inner.detector.stop();
        if let Some(turn) = turn {
            self.inner
                .sessions
                .deactivate(&turn.turn_id, CapabilityCategory::AutomaticSpeechRecognition);
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpectSpeechPayload {
    #[serde(default)]
    #[allow(dead_code)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotifyResultPayload {
    state: String,
}

impl Inner {
    /// Activate this category for `turn_id`, bind audio, start the detector,
    /// and announce the turn upstream. On failure every step is unwound.
    fn start_listening(
        self: &Arc<Self>,
        turn_id: TurnId,
        referrer_id: Option<TurnId>,
    ) -> Result<(), Error> {
        // Retire any in-flight turn first so its frames cannot be attributed
        // to the new one.
        let previous = lock_or_recover(&self.current, "asr_current").take();
        self.detector.stop();
        if let Some(previous) = previous {
            if previous.turn_id != turn_id {
                self.sessions.deactivate(
                    &previous.turn_id,
                    CapabilityCategory::AutomaticSpeechRecognition,
                );
            }
        }

        self.sessions
            .activate(&turn_id, CapabilityCategory::AutomaticSpeechRecognition);

        let bind = || -> Result<(), Error> {
            let source = self
                .audio
                .open_source()
                .map_err(|err| Error::AudioBinding(format!("{err:#}")))?;
            *lock_or_recover(&self.current, "asr_current") = Some(CurrentTurn {
                turn_id: turn_id.clone(),
                attachment_seq: 0,
            });
            self.detector.start(source)
        };
        if let Err(err) = bind() {
            lock_or_recover(&self.current, "asr_current").take();
            self.sessions
                .deactivate(&turn_id, CapabilityCategory::AutomaticSpeechRecognition);
            return Err(err);
        }

        let message = EventMessage {
            namespace: ASR_NAMESPACE.to_string(),
            name: EVENT_RECOGNIZE.to_string(),
            turn_id: turn_id.clone(),
            referrer_id,
            payload: json!({ "engine": ASR_ENGINE }),
            context: self.contexts.collect(),
        };
        let event_id = self.events.send_event(
            message,
            Box::new(move |outcome| {
                if let DeliveryOutcome::Failed(reason) = outcome {
                    warn!(%turn_id, reason, "recognize event delivery failed");
                }
            }),
        );
        debug!(event_id = event_id.as_str(), "recognize event queued");
        Ok(())
    }

    /// Close out the current turn with `outcome`: release the session hold,
    /// emit the matching terminal event or end-of-stream marker, then tell
    /// dialog observers.
    fn finish_turn(&self, outcome: TurnOutcome) {
        let Some(turn) = lock_or_recover(&self.current, "asr_current").take() else {
            return;
        };
        self.sessions
            .deactivate(&turn.turn_id, CapabilityCategory::AutomaticSpeechRecognition);

        match outcome {
            TurnOutcome::Completed => {
                self.events.send_attachment(AttachmentMessage::end_marker(
                    turn.turn_id.clone(),
                    turn.attachment_seq,
                ));
            }
            TurnOutcome::ListenTimeout => {
                self.send_terminal_event(&turn.turn_id, EVENT_LISTEN_TIMEOUT);
            }
            TurnOutcome::RecognitionFailed => {
                self.send_terminal_event(&turn.turn_id, EVENT_LISTEN_FAILED);
            }
        }

        debug!(turn_id = %turn.turn_id, ?outcome, "turn finished");
        self.observers
            .notify(|o| o.turn_finished(&turn.turn_id, outcome));
    }

    fn send_terminal_event(&self, turn_id: &TurnId, name: &str) {
        let turn_id_for_log = turn_id.clone();
        let name_for_log = name.to_string();
        self.events.send_event(
            EventMessage {
                namespace: ASR_NAMESPACE.to_string(),
                name: name.to_string(),
                turn_id: turn_id.clone(),
                referrer_id: None,
                payload: json!({}),
                context: self.contexts.collect(),
            },
            Box::new(move |outcome| {
                if let DeliveryOutcome::Failed(reason) = outcome {
                    warn!(turn_id = %turn_id_for_log, event = name_for_log, reason, "terminal event delivery failed");
                }
            }),
        );
    }

    fn handle_expect_speech(weak: &Weak<Inner>, directive: Directive) -> DirectiveStatus {
        let Some(inner) = weak.upgrade() else {
            return DirectiveStatus::Dropped;
        };
        if let Err(err) = serde_json::from_value::<ExpectSpeechPayload>(directive.payload.clone())
        {
            warn!(error = %err, "invalid ExpectSpeech payload; dropping directive");
            return DirectiveStatus::Dropped;
        }
        // Same turn id keeps listening; no new turn is minted.
        match inner.start_listening(directive.turn_id.clone(), Some(directive.turn_id)) {
            Ok(()) => DirectiveStatus::Handled,
            Err(err) => {
                warn!(error = %err, "could not resume listening");
                DirectiveStatus::Dropped
            }
        }
    }

    fn handle_notify_result(weak: &Weak<Inner>, directive: Directive) -> DirectiveStatus {
        let Some(inner) = weak.upgrade() else {
            return DirectiveStatus::Dropped;
        };
        let payload = match serde_json::from_value::<NotifyResultPayload>(directive.payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "invalid NotifyResult payload; dropping directive");
                return DirectiveStatus::Dropped;
            }
        };
        let kind = match payload.state.as_str() {
            "SOS" => RemoteNotification::StartOfSpeech,
            "EOS" => RemoteNotification::EndOfSpeech,
            "ERROR" => RemoteNotification::Error,
            "FA" => RemoteNotification::FalseAcceptance,
            other => {
                warn!(state = other, "unknown NotifyResult state; dropping directive");
                return DirectiveStatus::Dropped;
            }
        };
        inner.detector.handle_notification(kind);
        DirectiveStatus::Handled
    }
}

impl EndpointObserver for Inner {
    fn state_changed(&self, state: EndpointState) {
        match state {
            EndpointState::Idle | EndpointState::Listening => {}
            EndpointState::SpeechStart => {
                debug!("remote recognizer reported start of speech");
            }
            EndpointState::SpeechEnd => self.finish_turn(TurnOutcome::Completed),
            EndpointState::Timeout => self.finish_turn(TurnOutcome::ListenTimeout),
            EndpointState::Error => self.finish_turn(TurnOutcome::RecognitionFailed),
        }
    }

    fn frame_extracted(&self, frame: EncodedFrame) {
        let mut current = lock_or_recover(&self.current, "asr_current");
        let Some(turn) = current.as_mut() else {
            return;
        };
        let seq = turn.attachment_seq;
        turn.attachment_seq += 1;
        let attachment = AttachmentMessage {
            turn_id: turn.turn_id.clone(),
            seq,
            is_end: false,
            bytes: frame.into_bytes(),
        };
        drop(current);
        self.events.send_attachment(attachment);
    }
}

impl ContextProvider for Inner {
    fn context_info(&self) -> ContextInfo {
        ContextInfo {
            name: ASR_NAMESPACE.to_string(),
            payload: json!({
                "version": ASR_VERSION,
                "engine": ASR_ENGINE,
            }),
        }
    }
}
