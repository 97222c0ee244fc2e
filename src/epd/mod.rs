//! Endpoint detection: capture, encode, stream, and time out one utterance.
//!
//! The state machine is a pure transition table (`state`); the driver
//! (`detector`) binds an audio source, runs the pull loop on its own thread,
//! and arms a one-shot listening timer. Start/end-of-speech verdicts come
//! from the remote recognizer, not from local signal analysis.

mod detector;
mod state;

pub use detector::{EndpointDetector, EndpointObserver};
pub use state::{EndpointState, RemoteNotification};
