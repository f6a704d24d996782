//! Purpose: Route diagnostic lines from the core to a host-chosen sink.
//! Exports: `Sink`, `install_sink`, `emit`, `init_tracing`.
//! Role: Shared contract for fault and panic reporting; transport stays external.
//! Invariants: Every trapped failure maps to exactly one emitted line.
//! Invariants: The default backend forwards to `tracing`; a host install replaces it.

use std::sync::{Arc, RwLock};
use tracing_subscriber::EnvFilter;

/// Receives one formatted line per diagnostic event. The plugin points
/// this at the host's message window at load time; the default forwards
/// to `tracing`.
pub trait Sink: Send + Sync {
    fn emit(&self, line: &str);
}

struct TracingSink;

impl Sink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::error!(target: "stanchion", "{line}");
    }
}

static SINK: RwLock<Option<Arc<dyn Sink>>> = RwLock::new(None);

/// Replaces the process-wide sink. Later installs win.
pub fn install_sink(sink: Arc<dyn Sink>) {
    if let Ok(mut slot) = SINK.write() {
        *slot = Some(sink);
    }
}

pub fn emit(line: &str) {
    let installed = SINK.read().ok().and_then(|slot| slot.clone());
    match installed {
        Some(sink) => sink.emit(line),
        None => TracingSink.emit(line),
    }
}

/// Opt-in subscriber setup for hosts that do not install their own:
/// env-filtered, defaulting to `info`. A subscriber installed earlier
/// wins.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::{Sink, emit, install_sink};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CaptureSink {
        lines: Mutex<Vec<String>>,
    }

    impl Sink for CaptureSink {
        fn emit(&self, line: &str) {
            self.lines.lock().expect("lines").push(line.to_string());
        }
    }

    #[test]
    fn installed_sink_receives_each_line_once() {
        let capture = Arc::new(CaptureSink::default());
        install_sink(capture.clone());
        emit("boundary: hardware fault SIGSEGV at 0x0");
        emit("boundary: panic: bad operand");
        let lines = capture.lines.lock().expect("lines").clone();
        assert_eq!(
            lines,
            vec![
                "boundary: hardware fault SIGSEGV at 0x0".to_string(),
                "boundary: panic: bad operand".to_string(),
            ]
        );
    }
}
