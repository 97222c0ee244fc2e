use super::state::{transition, Effect, EndpointState, EpdEvent, RemoteNotification};
use crate::audio::{AudioSource, ReadOutcome};
use crate::codec::{EncodedFrame, SpeechCodec};
use crate::config::ListenConfig;
use crate::error::Error;
use crate::lock::lock_or_recover;
use crate::observer::ObserverSet;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Receives state changes and encoded frames from one detector instance.
///
/// Notifications are synchronous, delivered after the transition's cleanup
/// has run; implementations must not block significantly and must not call
/// back into the detector from `frame_extracted`.
pub trait EndpointObserver: Send + Sync {
    fn state_changed(&self, state: EndpointState);
    fn frame_extracted(&self, frame: EncodedFrame) {
        let _ = frame;
    }
}

/// Dropping the sender wakes the timer thread, which then exits without
/// firing.
struct ListenTimer {
    _cancel: Sender<()>,
}

struct Run {
    seq: u64,
    stop: Arc<AtomicBool>,
    timer: Option<ListenTimer>,
    pull: Option<JoinHandle<()>>,
}

struct Core {
    state: EndpointState,
    run: Option<Run>,
    next_seq: u64,
}

struct Inner {
    config: ListenConfig,
    codec: Mutex<Box<dyn SpeechCodec>>,
    core: Mutex<Core>,
    observers: ObserverSet<dyn EndpointObserver>,
}

/// Drives one capture-to-codec pipeline per listening run.
///
/// One instance serves one dialog turn at a time; `start` is single-flight
/// and tears down any previous audio binding first. Cloning shares the
/// instance.
#[derive(Clone)]
pub struct EndpointDetector {
    inner: Arc<Inner>,
}

impl EndpointDetector {
    pub fn new(config: ListenConfig, codec: Box<dyn SpeechCodec>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                codec: Mutex::new(codec),
                core: Mutex::new(Core {
                    state: EndpointState::Idle,
                    run: None,
                    next_seq: 0,
                }),
                observers: ObserverSet::new(),
            }),
        }
    }

    pub fn add_observer(&self, observer: &Arc<dyn EndpointObserver>) {
        self.inner.observers.add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn EndpointObserver>) {
        self.inner.observers.remove(observer);
    }

    pub fn state(&self) -> EndpointState {
        lock_or_recover(&self.inner.core, "epd_core").state
    }

    /// Bind `source` and enter `Listening`.
    ///
    /// Any prior run is stopped first; a binding failure leaves the detector
    /// idle and changes nothing else.
    pub fn start(&self, mut source: Box<dyn AudioSource>) -> Result<(), Error> {
        self.inner
            .apply_event(EpdEvent::Stopped, JoinPipeline::Yes, None);

        source
            .open()
            .map_err(|err| Error::AudioBinding(format!("{err:#}")))?;
        lock_or_recover(&self.inner.codec, "epd_codec").reset();

        let new_state = {
            let mut core = lock_or_recover(&self.inner.core, "epd_core");
            let Some((next, _effects)) = transition(core.state, EpdEvent::Started) else {
                // Lost a race with a concurrent start; release our binding.
                drop(core);
                source.close();
                return Err(Error::AudioBinding("detector already listening".into()));
            };
            let seq = core.next_seq;
            core.next_seq += 1;
            let stop = Arc::new(AtomicBool::new(false));
            let timer = Inner::arm_listening_timer(&self.inner, seq);
            let pull = Inner::spawn_pull_loop(&self.inner, seq, stop.clone(), source);
            core.run = Some(Run {
                seq,
                stop,
                timer: Some(timer),
                pull: Some(pull),
            });
            core.state = next;
            next
        };

        debug!(state = new_state.label(), "endpoint detector started");
        self.inner.observers.notify(|o| o.state_changed(new_state));
        Ok(())
    }

    /// Stop the current run, if any, and return to idle. Idempotent.
    pub fn stop(&self) {
        self.inner
            .apply_event(EpdEvent::Stopped, JoinPipeline::Yes, None);
    }

    /// Entry point for recognition-phase notifications from the transport.
    ///
    /// Must not be called from within an observer callback.
    pub fn handle_notification(&self, kind: RemoteNotification) {
        self.inner
            .apply_event(EpdEvent::Remote(kind), JoinPipeline::Yes, None);
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum JoinPipeline {
    Yes,
    /// For events raised on the pull thread itself, which cannot join itself.
    No,
}

impl Inner {
    /// Serialized transition entry point. Commits the new state, executes
    /// cleanup effects, then notifies observers outside the lock.
    ///
    /// `guard_seq` rejects events from a run that is no longer current
    /// (stale timers, a previous run's stream end).
    fn apply_event(self: &Arc<Self>, event: EpdEvent, join: JoinPipeline, guard_seq: Option<u64>) {
        let (new_state, pull_handle) = {
            let mut core = lock_or_recover(&self.core, "epd_core");
            if let Some(seq) = guard_seq {
                if core.run.as_ref().map(|run| run.seq) != Some(seq) {
                    return;
                }
            }
            let Some((next, effects)) = transition(core.state, event) else {
                return;
            };
            core.state = next;
            let mut pull_handle = None;
            for effect in effects {
                match effect {
                    Effect::CancelListeningTimer => {
                        if let Some(run) = core.run.as_mut() {
                            run.timer = None;
                        }
                    }
                    Effect::StopPipeline => {
                        if let Some(mut run) = core.run.take() {
                            run.stop.store(true, Ordering::Relaxed);
                            run.timer = None;
                            pull_handle = run.pull.take();
                        }
                    }
                    // Arming happens inside start(), the only caller that
                    // feeds Started into the table.
                    Effect::ArmListeningTimer => {}
                }
            }
            (next, pull_handle)
        };

        if let Some(handle) = pull_handle {
            match join {
                JoinPipeline::Yes => {
                    let _ = handle.join();
                }
                JoinPipeline::No => drop(handle),
            }
        }

        debug!(state = new_state.label(), ?event, "endpoint state changed");
        self.observers.notify(|o| o.state_changed(new_state));
    }

    fn state_snapshot(&self) -> EndpointState {
        lock_or_recover(&self.core, "epd_core").state
    }

    /// One-shot timer. Fires at most once; canceled by dropping the handle.
    fn arm_listening_timer(inner: &Arc<Inner>, seq: u64) -> ListenTimer {
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let weak = Arc::downgrade(inner);
        let timeout = inner.config.listen_timeout();
        thread::spawn(move || {
            if matches!(cancel_rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
                if let Some(inner) = weak.upgrade() {
                    debug!(seq, "listening timer fired");
                    inner.apply_event(EpdEvent::ListeningTimedOut, JoinPipeline::Yes, Some(seq));
                }
            }
        });
        ListenTimer { _cancel: cancel_tx }
    }

    /// Pull loop: bounded reads, encode, emit, defensive state check. Owns
    /// the source and always closes it on the way out. Stops at chunk
    /// boundaries, never mid-chunk.
    fn spawn_pull_loop(
        inner: &Arc<Inner>,
        seq: u64,
        stop: Arc<AtomicBool>,
        mut source: Box<dyn AudioSource>,
    ) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(inner);
        let chunk_bytes = inner.config.chunk_bytes;
        let poll_interval = inner.config.poll_interval();
        thread::spawn(move || {
            let mut stream_ended = false;
            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match source.read(chunk_bytes) {
                    ReadOutcome::Data(chunk) => {
                        let encoded = {
                            let mut codec = lock_or_recover(&inner.codec, "epd_codec");
                            codec.encode(&chunk)
                        };
                        match encoded {
                            Ok(frame) => {
                                inner.observers.notify(|o| o.frame_extracted(frame.clone()));
                            }
                            Err(err) => {
                                warn!(error = %err, bytes = chunk.len(), "dropping chunk after codec failure");
                            }
                        }
                        // A notification may have landed while this chunk was
                        // in flight; shut down if the run is over.
                        if !inner.state_snapshot().keeps_pipeline() {
                            break;
                        }
                    }
                    ReadOutcome::Idle => thread::sleep(poll_interval),
                    ReadOutcome::End => {
                        stream_ended = true;
                        break;
                    }
                }
            }
            source.close();
            if stream_ended {
                if let Some(inner) = weak.upgrade() {
                    debug!(seq, "audio stream ended");
                    inner.apply_event(EpdEvent::StreamEnded, JoinPipeline::No, Some(seq));
                }
            }
        })
    }
}
