//! Plugin backend contract (§4.4, §9 "global defaults"): user code can
//! register a constructor for a URI scheme; the engine never discovers
//! plugins on its own (plugin *discovery* is explicitly out of scope per
//! §1), it only holds a process-wide registry of constructors the host
//! application populates.
//!
//! Registry pattern grounded in the teacher's `config/state.rs` global
//! `Lazy<RwLock<...>>` singleton.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::backend::{Backend, BackendUri};
use crate::error::{Error, ErrorCode, Result};

pub type PluginConstructor =
    Arc<dyn Fn(&BackendUri) -> Result<Box<dyn Backend>> + Send + Sync>;

static PLUGIN_REGISTRY: Lazy<RwLock<HashMap<String, PluginConstructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a constructor for `plugin:<name>` URIs. A later call with the
/// same name replaces the earlier one.
pub fn register_plugin(name: impl Into<String>, constructor: PluginConstructor) {
    PLUGIN_REGISTRY.write().insert(name.into(), constructor);
}

/// Construct a backend for a `plugin:<name>?...` URI using whatever
/// constructor is currently registered for `<name>`.
pub fn construct(uri: &BackendUri) -> Result<Box<dyn Backend>> {
    let registry = PLUGIN_REGISTRY.read();
    let constructor = registry.get(&uri.path).ok_or_else(|| {
        Error::new(ErrorCode::InvalidConfig, "plugin_lookup")
            .with_context(format!("no plugin registered for '{}'", uri.path))
    })?;
    constructor(uri)
}

/// Test-only reset hook (§9 Design Notes): clears every registered
/// constructor so test suites don't leak registrations across cases.
pub fn clear_registered_plugins() {
    PLUGIN_REGISTRY.write().clear();
}
