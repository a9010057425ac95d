//! Human-readable line formatter: `[<ts>] [<LEVEL>] <message> k=v k=v` (§4.1).
//!
//! Grounded in the teacher's `format/template.rs` token-substitution style,
//! simplified to a fixed layout since the spec does not ask for a
//! user-configurable template language.

use chrono::{DateTime, Utc};

use crate::format::{FormatOptions, Formatter, LevelCase, TimestampFormat};
use crate::record::{Payload, Record};
use crate::value::{Value, MAX_DEPTH};

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format(&self, record: &Record, opts: &FormatOptions) -> Vec<u8> {
        let mut line = String::new();

        if opts.include_time {
            let ts: DateTime<Utc> = record.timestamp.into();
            let ts_str = match opts.timestamp_format {
                TimestampFormat::Pattern(p) => ts.format(p).to_string(),
                TimestampFormat::Rfc3339 => ts.to_rfc3339(),
            };
            line.push_str(&format!("[{ts_str}] "));
        }

        if opts.include_level {
            let level_str = match opts.level_case {
                LevelCase::Upper => record.level.as_str().to_string(),
                LevelCase::Lower => record.level.as_str().to_ascii_lowercase(),
                LevelCase::Symbol => record.level.symbol().to_string(),
            };
            line.push_str(&format!("[{level_str}] "));
        }

        match &record.payload {
            Payload::Formatted(msg) => line.push_str(msg),
            Payload::Structured { message, fields } => {
                line.push_str(message);
                for (key, value) in fields.iter() {
                    line.push(' ');
                    line.push_str(key);
                    line.push('=');
                    line.push_str(&render_value(value, 0));
                }
            }
            Payload::Raw(bytes) => {
                let mut bytes = bytes.clone();
                if !bytes.ends_with(b"\n") {
                    bytes.push(b'\n');
                }
                return bytes;
            }
        }

        if opts.include_call_site {
            if let Some(site) = record.call_site {
                line.push_str(&format!(" ({}:{})", site.file, site.line));
            }
        }

        line.push('\n');
        line.into_bytes()
    }
}

fn render_value(value: &Value, depth: usize) -> String {
    if depth >= MAX_DEPTH {
        return crate::format::unserializable_placeholder("max depth exceeded");
    }
    match value {
        Value::String(s) if s.contains(' ') || s.is_empty() => format!("{s:?}"),
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}={}", render_value(v, depth + 1)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(|v| render_value(v, depth + 1)).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.as_str_lossy(),
    }
}
