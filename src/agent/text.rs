use crate::context::{ContextAggregator, ContextInfo, ContextProvider};
use crate::transport::{
    DeliveryOutcome, Directive, DirectiveRouter, DirectiveStatus, EventCompletion, EventMessage,
    EventSender,
};
use crate::turn::TurnId;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Weak};
use tracing::warn;

pub const TEXT_NAMESPACE: &str = "Text";
pub const TEXT_VERSION: &str = "1.1";

const DIRECTIVE_TEXT_SOURCE: &str = "TextSource";
const EVENT_TEXT_INPUT: &str = "TextInput";

struct Inner {
    events: Arc<dyn EventSender>,
    contexts: Arc<ContextAggregator>,
}

/// Minimal typed-input capability: shows how an agent attaches to the
/// turn/event protocol without any audio involvement.
#[derive(Clone)]
pub struct TextAgent {
    inner: Arc<Inner>,
}

impl TextAgent {
    pub fn new(events: Arc<dyn EventSender>, contexts: Arc<ContextAggregator>) -> Self {
        let inner = Arc::new(Inner {
            events,
            contexts: contexts.clone(),
        });
        let as_context: Arc<dyn ContextProvider> = inner.clone();
        contexts.add(&as_context);
        Self { inner }
    }

    /// Send typed user input upstream under a freshly minted turn id, which
    /// is returned immediately. Delivery completes asynchronously.
    pub fn request_text_input(&self, text: &str, completion: EventCompletion) -> TurnId {
        self.inner
            .send_text_input(text, None, None, Some(completion))
    }

    pub fn register_directives(&self, router: &DirectiveRouter) {
        let weak = Arc::downgrade(&self.inner);
        router.register(
            TEXT_NAMESPACE,
            DIRECTIVE_TEXT_SOURCE,
            Arc::new(move |directive| Inner::handle_text_source(&weak, directive)),
        );
    }
}

#[derive(Debug, Deserialize)]
struct TextSourcePayload {
    text: String,
    #[serde(default)]
    token: Option<String>,
}

impl Inner {
    fn send_text_input(
        &self,
        text: &str,
        token: Option<String>,
        referrer_id: Option<TurnId>,
        completion: Option<EventCompletion>,
    ) -> TurnId {
        let turn_id = TurnId::generate();
        let message = EventMessage {
            namespace: TEXT_NAMESPACE.to_string(),
            name: EVENT_TEXT_INPUT.to_string(),
            turn_id: turn_id.clone(),
            referrer_id,
            payload: json!({ "text": text, "token": token }),
            context: self.contexts.collect(),
        };
        let completion = completion.unwrap_or_else(|| {
            let turn_id = turn_id.clone();
            Box::new(move |outcome| {
                if let DeliveryOutcome::Failed(reason) = outcome {
                    warn!(%turn_id, reason, "text input delivery failed");
                }
            })
        });
        self.events.send_event(message, completion);
        turn_id
    }

    fn handle_text_source(weak: &Weak<Inner>, directive: Directive) -> DirectiveStatus {
        let Some(inner) = weak.upgrade() else {
            return DirectiveStatus::Dropped;
        };
        match serde_json::from_value::<TextSourcePayload>(directive.payload) {
            Ok(payload) => {
                inner.send_text_input(
                    &payload.text,
                    payload.token,
                    Some(directive.turn_id),
                    None,
                );
                DirectiveStatus::Handled
            }
            Err(err) => {
                warn!(error = %err, "invalid TextSource payload; dropping directive");
                DirectiveStatus::Dropped
            }
        }
    }
}

impl ContextProvider for Inner {
    fn context_info(&self) -> ContextInfo {
        ContextInfo {
            name: TEXT_NAMESPACE.to_string(),
            payload: json!({ "version": TEXT_VERSION }),
        }
    }
}
