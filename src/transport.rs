//! Seam to the directive/event message layer.
//!
//! The control plane publishes events (with streamed audio attachments) and
//! receives named directives; the concrete transport lives outside this
//! crate. Event sending hands back a correlation id synchronously and
//! reports the delivery outcome through a completion callback; directive
//! handlers always yield a terminal status so the transport can release
//! related resources.

use crate::context::ContextInfo;
use crate::lock::lock_or_recover;
use crate::turn::TurnId;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

/// Correlation id for one outbound event.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

/// Terminal outcome of delivering one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

pub type EventCompletion = Box<dyn FnOnce(DeliveryOutcome) + Send>;

/// Outbound message reporting a client-side occurrence, correlated to a
/// dialog turn.
#[derive(Debug, Clone)]
pub struct EventMessage {
    pub namespace: String,
    pub name: String,
    pub turn_id: TurnId,
    pub referrer_id: Option<TurnId>,
    pub payload: Value,
    pub context: Vec<ContextInfo>,
}

/// One streamed audio frame (or the end-of-stream marker) for a turn.
#[derive(Debug, Clone)]
pub struct AttachmentMessage {
    pub turn_id: TurnId,
    pub seq: u32,
    pub is_end: bool,
    pub bytes: Vec<u8>,
}

impl AttachmentMessage {
    pub fn end_marker(turn_id: TurnId, seq: u32) -> Self {
        Self {
            turn_id,
            seq,
            is_end: true,
            bytes: Vec::new(),
        }
    }
}

/// Outbound side of the transport.
pub trait EventSender: Send + Sync {
    /// Queue `message` for delivery. Returns the correlation id immediately;
    /// `completion` fires later with the delivery outcome and must be called
    /// exactly once.
    fn send_event(&self, message: EventMessage, completion: EventCompletion) -> EventId;

    /// Fire-and-forget streamed audio for an in-flight event.
    fn send_attachment(&self, attachment: AttachmentMessage);
}

/// Inbound instruction from the remote service.
#[derive(Debug, Clone)]
pub struct Directive {
    pub namespace: String,
    pub name: String,
    pub turn_id: TurnId,
    pub payload: Value,
}

/// Terminal signal for one directive delivery.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DirectiveStatus {
    Handled,
    /// The directive was discarded (unknown name, invalid payload) with no
    /// side effects.
    Dropped,
}

pub type DirectiveHandler = Arc<dyn Fn(Directive) -> DirectiveStatus + Send + Sync>;

/// Routes inbound directives to the handler registered for their
/// namespace and name.
#[derive(Default)]
pub struct DirectiveRouter {
    handlers: Mutex<HashMap<(String, String), DirectiveHandler>>,
}

impl DirectiveRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, namespace: &str, name: &str, handler: DirectiveHandler) {
        let mut handlers = lock_or_recover(&self.handlers, "directive_router");
        handlers.insert((namespace.to_string(), name.to_string()), handler);
    }

    pub fn unregister(&self, namespace: &str, name: &str) {
        let mut handlers = lock_or_recover(&self.handlers, "directive_router");
        handlers.remove(&(namespace.to_string(), name.to_string()));
    }

    /// Deliver `directive` to its handler. Always yields a terminal status;
    /// unroutable directives are dropped with a log line.
    pub fn deliver(&self, directive: Directive) -> DirectiveStatus {
        let handler = {
            let handlers = lock_or_recover(&self.handlers, "directive_router");
            handlers
                .get(&(directive.namespace.clone(), directive.name.clone()))
                .cloned()
        };
        match handler {
            Some(handler) => handler(directive),
            None => {
                warn!(
                    namespace = %directive.namespace,
                    name = %directive.name,
                    "no handler registered; dropping directive"
                );
                DirectiveStatus::Dropped
            }
        }
    }
}
