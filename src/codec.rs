//! Speech codec seam between raw capture audio and the upstream recognizer.
//!
//! The codec is a streaming transform owned by one endpoint-detector run:
//! it is reset whenever a run restarts, and a failure on one chunk drops
//! that chunk without stopping the pipeline.

use thiserror::Error;

/// Per-chunk encoding failure. Recoverable by contract.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(pub String);

/// Immutable encoded audio produced from one raw chunk. Ownership transfers
/// to the delegate on emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: Vec<u8>,
}

impl EncodedFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Streaming encoder fed by the endpoint detector's pull loop.
///
/// # Chunk Contract
/// Chunks arrive in capture order with a bounded size chosen by the caller.
/// Implementations may keep cross-chunk state; `reset` clears it when a
/// listening run restarts.
pub trait SpeechCodec: Send {
    fn encode(&mut self, chunk: &[u8]) -> Result<EncodedFrame, CodecError>;
    fn reset(&mut self);
    fn name(&self) -> &'static str {
        "unknown_codec"
    }
}

/// Pass-through codec for recognizers that accept linear PCM as-is.
#[derive(Debug, Default, Clone)]
pub struct LinearPcmCodec;

impl SpeechCodec for LinearPcmCodec {
    fn encode(&mut self, chunk: &[u8]) -> Result<EncodedFrame, CodecError> {
        Ok(EncodedFrame::new(chunk.to_vec()))
    }

    fn reset(&mut self) {}

    fn name(&self) -> &'static str {
        "linear_pcm"
    }
}
