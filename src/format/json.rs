//! JSON line formatter (§4.1): reserved top-level keys `timestamp`, `level`,
//! `message`, `fields`, `file`, `line`, `stack_trace`.
//!
//! Grounded in the teacher's `format/json.rs`, which builds a
//! `serde_json::Map` by hand rather than deriving `Serialize` on the record
//! struct directly, since the field map's contents aren't known at compile
//! time.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value as Json};

use crate::format::{FormatOptions, Formatter};
use crate::record::{Payload, Record};
use crate::value::{FieldMap, Value, MAX_DEPTH};

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record, _opts: &FormatOptions) -> Vec<u8> {
        if let Payload::Raw(bytes) = &record.payload {
            let mut bytes = bytes.clone();
            if !bytes.ends_with(b"\n") {
                bytes.push(b'\n');
            }
            return bytes;
        }

        let ts: DateTime<Utc> = record.timestamp.into();
        let mut obj = Map::new();
        obj.insert("timestamp".into(), json!(ts.to_rfc3339()));
        obj.insert("level".into(), json!(record.level.as_str()));

        match &record.payload {
            Payload::Formatted(msg) => {
                obj.insert("message".into(), json!(msg));
            }
            Payload::Structured { message, fields } => {
                obj.insert("message".into(), json!(message));
                obj.insert("fields".into(), field_map_to_json(fields, 0));
            }
            Payload::Raw(_) => unreachable!("handled above"),
        }

        if let Some(site) = record.call_site {
            obj.insert("file".into(), json!(site.file));
            obj.insert("line".into(), json!(site.line));
        }

        if let Some(trace) = &record.stack_trace {
            obj.insert("stack_trace".into(), json!(trace));
        }

        let mut bytes = match serde_json::to_vec(&Json::Object(obj)) {
            Ok(b) => b,
            Err(e) => {
                // Never panic: fall back to a minimal, always-serializable record.
                let fallback = json!({
                    "timestamp": ts.to_rfc3339(),
                    "level": record.level.as_str(),
                    "message": crate::format::unserializable_placeholder(&e.to_string()),
                });
                serde_json::to_vec(&fallback).unwrap_or_default()
            }
        };
        bytes.push(b'\n');
        bytes
    }
}

fn field_map_to_json(map: &FieldMap, depth: usize) -> Json {
    if depth >= MAX_DEPTH {
        return json!(crate::format::unserializable_placeholder("max depth exceeded"));
    }
    let mut obj = Map::new();
    for (key, value) in map.iter() {
        obj.insert(key.to_string(), value_to_json(value, depth + 1));
    }
    Json::Object(obj)
}

fn value_to_json(value: &Value, depth: usize) -> Json {
    if depth >= MAX_DEPTH {
        return json!(crate::format::unserializable_placeholder("max depth exceeded"));
    }
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::String(s) => json!(s),
        Value::Bytes(b) => json!(base64_encode(b)),
        Value::Time(t) => json!(t.to_rfc3339()),
        Value::Duration(d) => json!(d.as_secs_f64()),
        Value::Error(e) => json!(e),
        Value::Array(items) => {
            Json::Array(items.iter().map(|v| value_to_json(v, depth + 1)).collect())
        }
        Value::Object(map) => field_map_to_json(map, depth),
    }
}

/// Minimal base64 (standard alphabet, padded) so `Bytes` fields round-trip
/// through JSON without pulling in a dedicated dependency the teacher's
/// stack doesn't already carry.
fn base64_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;

    #[test]
    fn structured_record_produces_valid_json_with_reserved_keys() {
        let mut fields = FieldMap::new();
        fields.insert("user_id", 7i64);
        let record = Record::structured(Level::Info, "login", fields);
        let bytes = JsonFormatter.format(&record, &FormatOptions::default());
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["message"], "login");
        assert_eq!(parsed["fields"]["user_id"], 7);
    }

    #[test]
    fn bytes_field_round_trips_as_base64() {
        let mut fields = FieldMap::new();
        fields.insert("blob", Value::Bytes(vec![1, 2, 3]));
        let record = Record::structured(Level::Debug, "payload", fields);
        let bytes = JsonFormatter.format(&record, &FormatOptions::default());
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["fields"]["blob"], base64_encode(&[1, 2, 3]));
    }

    #[test]
    fn raw_payload_bypasses_json_wrapping() {
        let record = Record::raw(Level::Error, b"{\"already\":\"json\"}".to_vec());
        let bytes = JsonFormatter.format(&record, &FormatOptions::default());
        assert_eq!(bytes, b"{\"already\":\"json\"}\n".to_vec());
    }

    #[test]
    fn raw_payload_with_trailing_newline_is_not_doubled() {
        let record = Record::raw(Level::Error, b"{\"already\":\"json\"}\n".to_vec());
        let bytes = JsonFormatter.format(&record, &FormatOptions::default());
        assert_eq!(bytes, b"{\"already\":\"json\"}\n".to_vec());
    }
}
