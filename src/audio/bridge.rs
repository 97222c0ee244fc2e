use super::{AudioSource, ReadOutcome};
use crate::config::DEFAULT_BRIDGE_CAPACITY;
use anyhow::anyhow;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Push side of the bridge, handed to the capture layer.
///
/// Cloneable so a capture callback and its owner can both hold it; the
/// consumer sees end-of-data once every clone is dropped or `finish` is
/// called on the last one.
#[derive(Clone)]
pub struct StreamWriter {
    sender: Sender<Vec<u8>>,
    dropped: Arc<AtomicUsize>,
}

impl StreamWriter {
    /// Queue one PCM chunk. A full buffer drops the chunk and counts it
    /// rather than blocking the capture thread.
    pub fn push(&self, pcm: &[u8]) {
        if pcm.is_empty() {
            return;
        }
        match self.sender.try_send(pcm.to_vec()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Signal end-of-data for this handle.
    pub fn finish(self) {}

    /// Chunks discarded because the consumer fell behind.
    pub fn dropped_chunks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Builder for the push-to-pull adaptation.
pub struct AudioBridge;

impl AudioBridge {
    /// Create a bridge buffering at most `capacity` pending chunks.
    pub fn new(capacity: usize) -> (StreamWriter, BridgeSource) {
        let (sender, receiver) = bounded::<Vec<u8>>(capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let writer = StreamWriter {
            sender,
            dropped: dropped.clone(),
        };
        let source = BridgeSource {
            receiver,
            pending: Vec::new(),
            open: false,
        };
        (writer, source)
    }

    pub fn with_default_capacity() -> (StreamWriter, BridgeSource) {
        Self::new(DEFAULT_BRIDGE_CAPACITY)
    }
}

/// Pull side of the bridge; implements [`AudioSource`].
///
/// Reads never block; an empty buffer reports [`ReadOutcome::Idle`] and
/// leaves the pacing to the consumer.
pub struct BridgeSource {
    receiver: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    open: bool,
}

impl BridgeSource {
    fn take_pending(&mut self, max_bytes: usize) -> Vec<u8> {
        if self.pending.len() <= max_bytes {
            std::mem::take(&mut self.pending)
        } else {
            let rest = self.pending.split_off(max_bytes);
            std::mem::replace(&mut self.pending, rest)
        }
    }
}

impl AudioSource for BridgeSource {
    fn open(&mut self) -> anyhow::Result<()> {
        if self.open {
            return Err(anyhow!("bridge source already open"));
        }
        self.open = true;
        Ok(())
    }

    fn read(&mut self, max_bytes: usize) -> ReadOutcome {
        if !self.open {
            return ReadOutcome::End;
        }
        let max_bytes = max_bytes.max(1);
        if !self.pending.is_empty() {
            return ReadOutcome::Data(self.take_pending(max_bytes));
        }
        match self.receiver.try_recv() {
            Ok(chunk) => {
                self.pending = chunk;
                ReadOutcome::Data(self.take_pending(max_bytes))
            }
            Err(TryRecvError::Empty) => ReadOutcome::Idle,
            Err(TryRecvError::Disconnected) => ReadOutcome::End,
        }
    }

    fn close(&mut self) {
        self.open = false;
        self.pending.clear();
    }
}
