use crate::config::LogConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

pub fn trace_log_path() -> PathBuf {
    env::var("VOICELINK_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("voicelink_trace.jsonl"))
}

/// Install the JSONL trace writer once. Later calls are no-ops, as is the
/// whole function when logging is disabled or another subscriber already won.
pub fn init_tracing(config: &LogConfig) {
    if !config.enabled {
        return;
    }

    let _ = TRACING_INIT.get_or_init(|| {
        let path = trace_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(Arc::new(file))
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_config_skips_initialization() {
        init_tracing(&LogConfig { enabled: false });
        assert!(TRACING_INIT.get().is_none());
    }

    #[test]
    fn trace_path_falls_back_to_temp_dir() {
        let path = trace_log_path();
        assert!(path.to_string_lossy().ends_with(".jsonl"));
    }
}
