//! Client-side control plane for a voice-interaction SDK.
//!
//! Tracks the lifecycle of spoken and typed dialog turns and drives the
//! audio-capture-to-network pipeline that feeds a remote speech recognizer.
//! The two stateful cores are the [`session::SessionManager`] (which
//! capability categories keep a turn alive, and expiry once none do) and the
//! [`epd::EndpointDetector`] (capturing, encoding, streaming, and timing out
//! one utterance). Everything else adapts those cores to the host's audio
//! capture, codec, and message transport.

pub mod agent;
pub mod audio;
pub mod codec;
pub mod config;
pub mod context;
pub mod epd;
pub mod error;
mod lock;
pub mod logging;
pub mod observer;
pub mod session;
pub mod transport;
pub mod turn;

pub use agent::{AsrAgent, AudioProvider, DialogObserver, TextAgent, TurnOutcome};
pub use audio::{AudioBridge, AudioSource, ReadOutcome, StreamWriter};
pub use codec::{EncodedFrame, LinearPcmCodec, SpeechCodec};
pub use config::{ListenConfig, LogConfig, SessionConfig};
pub use epd::{EndpointDetector, EndpointObserver, EndpointState, RemoteNotification};
pub use error::{Error, Result};
pub use session::{SessionManager, SessionObserver};
pub use transport::{
    AttachmentMessage, DeliveryOutcome, Directive, DirectiveRouter, DirectiveStatus, EventMessage,
    EventSender,
};
pub use turn::{CapabilityCategory, Session, TurnId};
