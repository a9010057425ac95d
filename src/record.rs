//! The log record model (§3 "Record", §4.1).
//!
//! A `Record` is the unit that flows from submission through the filter
//! chain, redaction, and formatting to a `Destination`. It is deliberately
//! payload-flexible: a caller can hand over a pre-formatted message with
//! positional args, a structured message plus a field map, or a raw byte
//! blob that bypasses formatting entirely (mirrors the teacher's three
//! logging entry points: `log()`, the structured macros, and `write_raw`).

use std::time::SystemTime;

use crate::value::FieldMap;

/// Severity, ordered `Trace < Debug < Info < Warn < Error` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Single-character glyph used by the `Symbol` level-rendering mode.
    pub fn symbol(self) -> &'static str {
        match self {
            Level::Trace => "T",
            Level::Debug => "D",
            Level::Info => "I",
            Level::Warn => "W",
            Level::Error => "E",
        }
    }

    pub fn parse(s: &str) -> Option<Level> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Some(Level::Trace),
            "DEBUG" => Some(Level::Debug),
            "INFO" => Some(Level::Info),
            "WARN" | "WARNING" => Some(Level::Warn),
            "ERROR" => Some(Level::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record's payload — exactly one of a formatted message, a structured
/// message with fields, or a raw byte blob (§3).
#[derive(Debug, Clone)]
pub enum Payload {
    Formatted(String),
    Structured { message: String, fields: FieldMap },
    Raw(Vec<u8>),
}

/// An optional captured call site, attached when the caller opts in
/// (`file`/`line`); cheap enough to always carry as `Option`.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct Record {
    pub timestamp: SystemTime,
    pub level: Level,
    pub payload: Payload,
    pub call_site: Option<CallSite>,
    pub stack_trace: Option<String>,
}

impl Record {
    pub fn formatted(level: Level, message: impl Into<String>) -> Self {
        Record {
            timestamp: SystemTime::now(),
            level,
            payload: Payload::Formatted(message.into()),
            call_site: None,
            stack_trace: None,
        }
    }

    pub fn structured(level: Level, message: impl Into<String>, fields: FieldMap) -> Self {
        Record {
            timestamp: SystemTime::now(),
            level,
            payload: Payload::Structured {
                message: message.into(),
                fields,
            },
            call_site: None,
            stack_trace: None,
        }
    }

    pub fn raw(level: Level, bytes: Vec<u8>) -> Self {
        Record {
            timestamp: SystemTime::now(),
            level,
            payload: Payload::Raw(bytes),
            call_site: None,
            stack_trace: None,
        }
    }

    pub fn with_call_site(mut self, file: &'static str, line: u32) -> Self {
        self.call_site = Some(CallSite { file, line });
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    /// The plain-text message, ignoring structured fields — used by
    /// sampling/filter predicates and the Text formatter's first segment.
    pub fn message(&self) -> &str {
        match &self.payload {
            Payload::Formatted(s) => s.as_str(),
            Payload::Structured { message, .. } => message.as_str(),
            Payload::Raw(_) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_matches_severity() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn level_parse_is_case_insensitive_and_accepts_warning_alias() {
        assert_eq!(Level::parse("info"), Some(Level::Info));
        assert_eq!(Level::parse("WARNING"), Some(Level::Warn));
        assert_eq!(Level::parse("bogus"), None);
    }

    #[test]
    fn structured_record_exposes_message_not_fields() {
        let mut fields = FieldMap::new();
        fields.insert("user_id", 42i64);
        let record = Record::structured(Level::Info, "login", fields);
        assert_eq!(record.message(), "login");
    }
}
