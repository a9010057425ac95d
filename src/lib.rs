//! `omnilog` — a process-safe, multi-destination structured logging engine
//! core: bounded ingest queue, background dispatch, per-destination file
//! rotation with retention, a gzip compression pool, sampling/filter
//! chains, field redaction, and pluggable recovery on write failure.
//!
//! This crate is the engine, not a CLI or a `tracing` integration — see
//! `Logger` for the entry point and `Config` for everything that's tunable.

pub mod backend;
pub mod compress;
pub mod config;
pub mod debug;
pub mod destination;
pub mod error;
pub mod filter;
pub mod format;
pub mod logger;
pub mod metrics;
pub mod queue;
pub mod record;
pub mod recovery;
pub mod redact;
pub mod retention;
pub mod rotation;
pub mod utils;
pub mod value;

pub use config::{Config, FormatKind, SizeLimit};
pub use destination::{BatchConfig, Destination, RotationConfig};
pub use error::{Error, ErrorCode, ErrorHandler, Result};
pub use filter::{FilterChain, PatternRule, SamplingStrategy};
pub use logger::{Logger, LoggerState};
pub use record::{Level, Record};
pub use redact::{RedactionConfig, Redactor};
pub use value::{FieldMap, Value};

#[cfg(test)]
mod tests;
