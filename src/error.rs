//! Error kinds of the dialog control plane.
//!
//! Per-chunk codec failures and malformed directives are absorbed and logged
//! where they happen; only failures that break the capture or transport
//! contract surface through this enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The audio source could not be bound. Fatal to the current `start()`
    /// attempt only; the endpoint detector stays idle.
    #[error("audio binding failed: {0}")]
    AudioBinding(String),

    /// The speech codec rejected a chunk.
    #[error("codec failure: {0}")]
    Codec(String),

    /// An inbound directive carried a payload that did not decode.
    #[error("invalid directive payload: {0}")]
    DirectivePayload(String),

    /// The event transport reported a delivery failure.
    #[error("event transport failure: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
