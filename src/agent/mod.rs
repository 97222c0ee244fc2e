//! Capability agents: the stateful ASR orchestrator and the thin text-input
//! agent that shows the minimal attachment pattern.

mod asr;
mod text;

pub use asr::{
    AsrAgent, AudioProvider, DialogObserver, TurnOutcome, ASR_ENGINE, ASR_NAMESPACE, ASR_VERSION,
};
pub use text::{TextAgent, TEXT_NAMESPACE, TEXT_VERSION};
