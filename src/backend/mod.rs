//! Backend abstraction (§4.4, §6): the contract a `Destination` writes
//! through. File-backed destinations get rotation/retention for free via
//! `destination.rs`; syslog and plugin backends opt out of that (§4.4
//! "syslog/plugin bypass").

pub mod file;
pub mod plugin;
pub mod syslog;

use crate::error::Result;

/// A sink for already-formatted bytes. Implementors are not responsible for
/// formatting, redaction, or filtering — those happen upstream in the
/// ingest-dispatch core (§4.5).
pub trait Backend: Send + Sync {
    /// Write one already-formatted record. Must not partially write on
    /// error (§4.4 "write protocol" atomicity requirement at the backend
    /// boundary).
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Whether this backend's writes are already fsync-durable once
    /// `write` returns, so the destination manager can skip an extra flush
    /// (syslog sockets are, rotating files are not until `flush`).
    fn supports_atomic(&self) -> bool {
        false
    }
}

/// Parsed form of a destination URI, e.g. `file:///var/log/app.log`,
/// `syslog://localhost:514`, `plugin:webhook?url=...`.
#[derive(Debug, Clone)]
pub struct BackendUri {
    pub scheme: String,
    pub authority: Option<String>,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl BackendUri {
    pub fn parse(uri: &str) -> Option<BackendUri> {
        let (head, query_str) = match uri.split_once('?') {
            Some((h, q)) => (h, Some(q)),
            None => (uri, None),
        };

        let has_authority = head.contains("://");
        let (scheme, rest) = if has_authority {
            head.split_once("://")?
        } else {
            head.split_once(':')?
        };

        let (authority, path) = if has_authority {
            match rest.split_once('/') {
                Some((auth, path)) => (
                    if auth.is_empty() { None } else { Some(auth.to_string()) },
                    format!("/{path}"),
                ),
                None => (
                    if rest.is_empty() { None } else { Some(rest.to_string()) },
                    String::new(),
                ),
            }
        } else {
            (None, rest.to_string())
        };

        let query = query_str
            .map(|q| {
                q.split('&')
                    .filter_map(|pair| pair.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Some(BackendUri {
            scheme: scheme.to_string(),
            authority,
            path,
            query,
        })
    }
}
