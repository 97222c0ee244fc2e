//! Runtime tuning knobs for the dialog control plane.
//!
//! Plain structs with defaults; hosts may deserialize them from their own
//! configuration files.

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_LISTEN_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CHUNK_BYTES: usize = 4_096;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;
pub const DEFAULT_BRIDGE_CAPACITY: usize = 64;

/// Session lifecycle tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a session with no active category survives before expiry.
    pub session_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

/// Endpoint detector tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// How long a listening run may wait for a remote verdict before timing out.
    pub listen_timeout_ms: u64,
    /// Upper bound for a single pull from the audio source.
    pub chunk_bytes: usize,
    /// How long the pull loop sleeps when no audio is buffered before
    /// re-checking its stop flag.
    pub poll_interval_ms: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen_timeout_ms: DEFAULT_LISTEN_TIMEOUT_MS,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ListenConfig {
    pub fn listen_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// File logging switches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Enable the JSONL trace writer.
    pub enabled: bool,
}
