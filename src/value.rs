//! Dynamically typed field values and the ordered field map (§3 "Field map",
//! §9 "Dynamic values", §9 "Cyclic field graphs").
//!
//! Mirrors the teacher's `serde_json::Value` construction in
//! `backend/logging.rs`/`format/json.rs`, generalized into our own tagged
//! sum type so text and JSON formatting can share one classifier instead of
//! each hand-rolling string conversion.

use chrono::{DateTime, Utc};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::time::Duration;

/// Most records carry a handful of fields; inlining up to this many avoids
/// a heap allocation for the common case.
const INLINE_FIELDS: usize = 8;

/// Depth bound for nested maps/arrays during formatting (§3, §9).
pub const MAX_DEPTH: usize = 32;

/// A dynamically typed field value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Duration(Duration),
    Error(String),
    Array(Vec<Value>),
    Object(FieldMap),
}

impl Value {
    pub fn as_str_lossy(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::Time(t) => t.to_rfc3339(),
            Value::Duration(d) => format!("{:?}", d),
            Value::Error(e) => e.clone(),
            Value::Array(_) | Value::Object(_) => "<nested>".to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// An insertion-ordered string-keyed map of `Value`s.
///
/// Insertion order is preserved for stable text and JSON serialization
/// (§3). Backed by a `Vec` of pairs plus an index for O(1) lookup, since
/// ordinary hash maps (even `ahash`'s) don't preserve insertion order.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: SmallVec<[(String, Value); INLINE_FIELDS]>,
    index: HashMap<String, usize, ahash::RandomState>,
}

impl FieldMap {
    pub fn new() -> Self {
        FieldMap::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(&idx) = self.index.get(&key) {
            self.entries[idx].1 = value;
        } else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.index.remove(key)?;
        let (_, value) = self.entries.remove(idx);
        for v in self.index.values_mut() {
            if *v > idx {
                *v -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Walk a value depth-first, replacing anything beyond `MAX_DEPTH` with a
/// placeholder. Cyclic `Object`/`Array` structures cannot literally occur in
/// an owned tree like ours (no shared mutable references), but a
/// pathologically deep tree built programmatically still needs the same
/// bound, so callers (formatters, redaction) route through this helper
/// rather than recursing unbounded.
pub fn walk_bounded<F: FnMut(&str, &Value, usize)>(map: &FieldMap, mut visit: F) {
    fn go<F: FnMut(&str, &Value, usize)>(map: &FieldMap, depth: usize, visit: &mut F) {
        for (k, v) in map.iter() {
            visit(k, v, depth);
            if depth >= MAX_DEPTH {
                continue;
            }
            match v {
                Value::Object(nested) => go(nested, depth + 1, visit),
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(nested) = item {
                            go(nested, depth + 1, visit);
                        }
                    }
                }
                _ => {}
            }
        }
    }
    go(map, 0, &mut visit);
}
