//! Pull-style audio sources and the bridge from push-style capture streams.
//!
//! The capture layer (microphone, file replay, test harness) pushes PCM
//! chunks; the endpoint detector pulls bounded reads. `AudioBridge` adapts
//! one into the other over a bounded channel so a slow consumer drops
//! chunks instead of blocking the capture callback.

mod bridge;

pub use bridge::{AudioBridge, BridgeSource, StreamWriter};

/// Result of one bounded read from an audio source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Up to `max_bytes` of PCM.
    Data(Vec<u8>),
    /// Nothing buffered yet; the stream is still open.
    Idle,
    /// End of data. No further reads will produce audio.
    End,
}

/// Open/close-able sequential byte source consumed by the endpoint detector.
///
/// Reads are bounded and may signal end-of-data at any time. `Idle` lets the
/// pull loop observe its stop flag while no audio is flowing.
pub trait AudioSource: Send {
    fn open(&mut self) -> anyhow::Result<()>;
    fn read(&mut self, max_bytes: usize) -> ReadOutcome;
    fn close(&mut self);
}
