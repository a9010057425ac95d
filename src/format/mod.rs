//! Formatter contract (§4.1): turn a `Record` into bytes, deterministically,
//! without holding any lock and without panicking on malformed input.

pub mod json;
pub mod text;

use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `chrono` strftime-style pattern, e.g. `"%Y-%m-%d %H:%M:%S%.3f"`.
    Pattern(&'static str),
    Rfc3339,
}

/// How a record's level renders in text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelCase {
    Upper,
    Lower,
    /// Single-character glyph: `T`/`D`/`I`/`W`/`E`.
    Symbol,
}

#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub timestamp_format: TimestampFormat,
    pub include_call_site: bool,
    pub include_time: bool,
    pub include_level: bool,
    pub level_case: LevelCase,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            timestamp_format: TimestampFormat::Pattern("%Y-%m-%d %H:%M:%S%.3f"),
            include_call_site: true,
            include_time: true,
            include_level: true,
            level_case: LevelCase::Upper,
        }
    }
}

/// Shared contract for the two built-in formatters plus any future one.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &Record, opts: &FormatOptions) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy)]
pub enum Format {
    Text,
    Json,
}

pub fn formatter(format: Format) -> Box<dyn Formatter> {
    match format {
        Format::Text => Box::new(text::TextFormatter),
        Format::Json => Box::new(json::JsonFormatter),
    }
}

/// Best-effort, panic-free string conversion for a value that failed to
/// serialize normally — formatters never propagate a panic out of
/// `format()` (§4.1 "never panics").
pub fn unserializable_placeholder(reason: &str) -> String {
    format!("<unserializable: {reason}>")
}
