//! Redaction engine (§4.2): strip or mask sensitive fields before a record
//! reaches a formatter.
//!
//! Three independent rule kinds combine: an exact field-name set (built-in
//! plus user additions), dotted field-path rules with `*` wildcard segments
//! (`"auth.*"`, `"user.password"`), and a regex sweep applied to string
//! values regardless of key. A small bounded cache (grounded in the
//! teacher's `ahash`-backed `AHashMap` usage in `config/state.rs`) remembers
//! per-path redaction decisions so a hot path doesn't re-walk the rule sets
//! on every record.

use std::collections::VecDeque;

use ahash::{AHasher, RandomState};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::record::{Level, Payload, Record};
use crate::value::{FieldMap, Value, MAX_DEPTH};

const DEFAULT_REPLACEMENT: &str = "[REDACTED]";
const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Field names redacted unless explicitly disabled.
const BUILT_IN_NAMES: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "auth",
    "access_token",
    "refresh_token",
    "private_key",
    "ssn",
    "credit_card",
];

#[derive(Debug, Clone)]
enum PathSegment {
    Exact(String),
    Wildcard,
}

#[derive(Debug, Clone)]
struct PathRule(Vec<PathSegment>);

impl PathRule {
    fn parse(pattern: &str) -> Self {
        PathRule(
            pattern
                .split('.')
                .map(|seg| {
                    if seg == "*" {
                        PathSegment::Wildcard
                    } else {
                        PathSegment::Exact(seg.to_string())
                    }
                })
                .collect(),
        )
    }

    /// Matches if `path` is at least as long as the rule and every rule
    /// segment matches the corresponding path segment; a rule shorter than
    /// the path is still a match (so `"auth.*"` also covers `"auth.nested.token"`).
    fn matches(&self, path: &[&str]) -> bool {
        if path.len() < self.0.len() {
            return false;
        }
        self.0.iter().zip(path.iter()).all(|(seg, p)| match seg {
            PathSegment::Exact(name) => name == p,
            PathSegment::Wildcard => true,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub use_built_in_names: bool,
    pub extra_field_names: Vec<String>,
    pub path_rules: Vec<String>,
    pub regex_patterns: Vec<String>,
    pub skip_levels: Vec<Level>,
    pub replacement: String,
    pub cache_capacity: usize,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        RedactionConfig {
            use_built_in_names: true,
            extra_field_names: Vec::new(),
            path_rules: Vec::new(),
            regex_patterns: Vec::new(),
            skip_levels: Vec::new(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Small bounded LRU keyed by a u64 hash of `(rule_set_version, field key)`.
struct LruCache {
    capacity: usize,
    order: VecDeque<u64>,
    map: HashMap<u64, bool, RandomState>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        LruCache {
            capacity,
            order: VecDeque::new(),
            map: HashMap::with_hasher(RandomState::new()),
        }
    }

    fn get(&mut self, key: u64) -> Option<bool> {
        self.map.get(&key).copied()
    }

    fn insert(&mut self, key: u64, value: bool) {
        if !self.map.contains_key(&key) {
            if self.order.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.map.remove(&oldest);
                }
            }
            self.order.push_back(key);
        }
        self.map.insert(key, value);
    }
}

pub struct Redactor {
    field_names: std::collections::HashSet<String, RandomState>,
    path_rules: Vec<PathRule>,
    regexes: Vec<Regex>,
    skip_levels: std::collections::HashSet<Level>,
    replacement: String,
    rule_set_version: u64,
    cache: Mutex<LruCache>,
}

impl Redactor {
    pub fn new(config: &RedactionConfig) -> Self {
        let mut field_names = std::collections::HashSet::with_hasher(RandomState::new());
        if config.use_built_in_names {
            field_names.extend(BUILT_IN_NAMES.iter().map(|s| s.to_string()));
        }
        field_names.extend(config.extra_field_names.iter().cloned());

        let path_rules = config.path_rules.iter().map(|p| PathRule::parse(p)).collect();
        let regexes = config
            .regex_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let mut version_hasher = AHasher::default();
        config.extra_field_names.hash(&mut version_hasher);
        config.path_rules.hash(&mut version_hasher);
        config.regex_patterns.hash(&mut version_hasher);

        Redactor {
            field_names,
            path_rules,
            regexes,
            skip_levels: config.skip_levels.iter().copied().collect(),
            replacement: config.replacement.clone(),
            rule_set_version: version_hasher.finish(),
            cache: Mutex::new(LruCache::new(config.cache_capacity.max(1))),
        }
    }

    pub fn redact(&self, record: &mut Record) {
        if self.skip_levels.contains(&record.level) {
            return;
        }
        if let Payload::Structured { fields, .. } = &mut record.payload {
            let mut path: Vec<String> = Vec::new();
            self.redact_map(fields, &mut path);
        }
    }

    fn redact_map(&self, map: &mut FieldMap, path: &mut Vec<String>) {
        if path.len() >= MAX_DEPTH {
            return;
        }
        let keys: Vec<String> = map.iter().map(|(k, _)| k.to_string()).collect();
        for key in keys {
            if self.should_redact(&key, path) {
                map.insert(key.clone(), Value::String(self.replacement.clone()));
                continue;
            }
            let Some(value) = map.get(&key).cloned() else {
                continue;
            };
            match value {
                Value::Object(mut nested) => {
                    path.push(key.clone());
                    self.redact_map(&mut nested, path);
                    path.pop();
                    map.insert(key, Value::Object(nested));
                }
                Value::Array(items) => {
                    path.push(key.clone());
                    let out = items
                        .into_iter()
                        .enumerate()
                        .map(|(i, item)| match item {
                            Value::Object(mut nested) => {
                                path.push(i.to_string());
                                self.redact_map(&mut nested, path);
                                path.pop();
                                Value::Object(nested)
                            }
                            other => other,
                        })
                        .collect();
                    path.pop();
                    map.insert(key, Value::Array(out));
                }
                Value::String(s) => {
                    if let Some(swept) = self.sweep_string(&s) {
                        map.insert(key, Value::String(swept));
                    }
                }
                _ => {}
            }
        }
    }

    fn should_redact(&self, key: &str, path: &[String]) -> bool {
        let mut full_path: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
        full_path.push(key);

        let mut hasher = AHasher::default();
        self.rule_set_version.hash(&mut hasher);
        full_path.hash(&mut hasher);
        let cache_key = hasher.finish();

        if let Some(cached) = self.cache.lock().get(cache_key) {
            return cached;
        }

        let decision = self.field_names.contains(&key.to_ascii_lowercase())
            || self.path_rules.iter().any(|rule| rule.matches(&full_path));

        self.cache.lock().insert(cache_key, decision);
        decision
    }

    fn sweep_string(&self, s: &str) -> Option<String> {
        for re in &self.regexes {
            if re.is_match(s) {
                return Some(re.replace_all(s, self.replacement.as_str()).into_owned());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_name_is_redacted() {
        let redactor = Redactor::new(&RedactionConfig::default());
        let mut fields = FieldMap::new();
        fields.insert("password", "hunter2");
        fields.insert("username", "ada");
        let mut record = Record::structured(Level::Info, "login", fields);
        redactor.redact(&mut record);
        if let Payload::Structured { fields, .. } = &record.payload {
            assert!(matches!(fields.get("password"), Some(Value::String(s)) if s == "[REDACTED]"));
            assert!(matches!(fields.get("username"), Some(Value::String(s)) if s == "ada"));
        } else {
            panic!("expected structured payload");
        }
    }

    #[test]
    fn path_wildcard_matches_nested_field() {
        let config = RedactionConfig {
            path_rules: vec!["auth.*".to_string()],
            ..RedactionConfig::default()
        };
        let redactor = Redactor::new(&config);
        let mut nested = FieldMap::new();
        nested.insert("session_id", "abc123");
        let mut fields = FieldMap::new();
        fields.insert("auth", Value::Object(nested));
        let mut record = Record::structured(Level::Info, "event", fields);
        redactor.redact(&mut record);
        if let Payload::Structured { fields, .. } = &record.payload {
            if let Some(Value::Object(nested)) = fields.get("auth") {
                assert!(matches!(nested.get("session_id"), Some(Value::String(s)) if s == "[REDACTED]"));
            } else {
                panic!("expected nested object");
            }
        }
    }

    #[test]
    fn path_rule_targets_an_array_index_position() {
        let config = RedactionConfig {
            path_rules: vec!["sessions.1.token".to_string()],
            ..RedactionConfig::default()
        };
        let redactor = Redactor::new(&config);

        let mut first = FieldMap::new();
        first.insert("token", "keep-me");
        let mut second = FieldMap::new();
        second.insert("token", "redact-me");

        let mut fields = FieldMap::new();
        fields.insert("sessions", Value::Array(vec![Value::Object(first), Value::Object(second)]));
        let mut record = Record::structured(Level::Info, "event", fields);
        redactor.redact(&mut record);

        if let Payload::Structured { fields, .. } = &record.payload {
            if let Some(Value::Array(items)) = fields.get("sessions") {
                let Value::Object(first) = &items[0] else { panic!("expected object") };
                let Value::Object(second) = &items[1] else { panic!("expected object") };
                assert!(matches!(first.get("token"), Some(Value::String(s)) if s == "keep-me"));
                assert!(matches!(second.get("token"), Some(Value::String(s)) if s == "[REDACTED]"));
            } else {
                panic!("expected array");
            }
        }
    }

    #[test]
    fn skip_levels_bypasses_redaction() {
        let config = RedactionConfig {
            skip_levels: vec![Level::Trace],
            ..RedactionConfig::default()
        };
        let redactor = Redactor::new(&config);
        let mut fields = FieldMap::new();
        fields.insert("password", "hunter2");
        let mut record = Record::structured(Level::Trace, "debug event", fields);
        redactor.redact(&mut record);
        if let Payload::Structured { fields, .. } = &record.payload {
            assert!(matches!(fields.get("password"), Some(Value::String(s)) if s == "hunter2"));
        }
    }

    #[test]
    fn regex_sweep_redacts_matching_substring() {
        let config = RedactionConfig {
            regex_patterns: vec![r"\d{3}-\d{2}-\d{4}".to_string()],
            use_built_in_names: false,
            ..RedactionConfig::default()
        };
        let redactor = Redactor::new(&config);
        let mut fields = FieldMap::new();
        fields.insert("note", "ssn is 123-45-6789 on file");
        let mut record = Record::structured(Level::Info, "event", fields);
        redactor.redact(&mut record);
        if let Payload::Structured { fields, .. } = &record.payload {
            assert!(matches!(fields.get("note"), Some(Value::String(s)) if s.contains("[REDACTED]")));
        }
    }
}
