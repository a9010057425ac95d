//! Internal diagnostics sidecar (§9, [AMBIENT]): traces the engine's own
//! behavior — rotation fired, compression queued, recovery invoked — to its
//! own file, gated behind `Config::internal_debug`. Never routes through
//! the public dispatcher pipeline; that would be circular.
//!
//! Grounded in the teacher's `utils/debug.rs` sidecar module: a process-wide
//! `Lazy<RwLock<...>>` holding whether debugging is on and where it writes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::utils::timestamp::format_local;

struct DebugState {
    enabled: bool,
    path: Option<PathBuf>,
}

static DEBUG_STATE: Lazy<RwLock<DebugState>> =
    Lazy::new(|| RwLock::new(DebugState { enabled: false, path: None }));

pub fn configure(enabled: bool, path: Option<PathBuf>) {
    let mut state = DEBUG_STATE.write();
    state.enabled = enabled;
    state.path = path;
}

pub fn is_enabled() -> bool {
    DEBUG_STATE.read().enabled
}

/// Appends one line to the sidecar file, or to stderr if no path was
/// configured. Failures are swallowed — diagnostics must never be able to
/// break the pipeline they're diagnosing.
pub fn trace(component: &str, message: &str) {
    let state = DEBUG_STATE.read();
    if !state.enabled {
        return;
    }
    let line = format!("[{}] {component}: {message}\n", format_local(chrono::Utc::now()));
    match &state.path {
        Some(path) => {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = file.write_all(line.as_bytes());
            }
        }
        None => {
            let _ = std::io::stderr().write_all(line.as_bytes());
        }
    }
}

/// Convenience wrapper so call sites read like `debug::rotation(dest, "...")`
/// rather than repeating the component string everywhere.
pub fn rotation(destination: &str, message: &str) {
    trace(&format!("rotation[{destination}]"), message);
}

pub fn compression(destination: &str, message: &str) {
    trace(&format!("compression[{destination}]"), message);
}

pub fn recovery(destination: &str, message: &str) {
    trace(&format!("recovery[{destination}]"), message);
}

/// Test-only reset hook, mirroring `backend::plugin::clear_registered_plugins`.
pub fn reset_for_tests() {
    let mut state = DEBUG_STATE.write();
    state.enabled = false;
    state.path = None;
}

pub type DebugSink = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disabled_by_default_and_trace_is_a_no_op() {
        reset_for_tests();
        assert!(!is_enabled());
        trace("test", "should not panic");
    }

    #[test]
    fn enabling_writes_to_configured_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("debug.log");
        configure(true, Some(path.clone()));
        trace("test", "hello");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("test: hello"));
        reset_for_tests();
    }
}
