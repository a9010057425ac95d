//! Configuration surface (§6) plus the ambient fields every complete
//! logging engine needs (error handler, internal debug sidecar, a human
//! destination label) that the distilled field list omitted.
//!
//! Grounded in the teacher's `config/state.rs` `LoggerState`/`SinkConfig`
//! shape; `byte-unit` (already a teacher dependency, previously unused
//! since the teacher hand-rolled its own parser) handles the human size
//! strings here instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use byte_unit::Byte;

use crate::error::{Error, ErrorCode, ErrorHandler, Result};
use crate::filter::{PatternRule, SamplingStrategy};
use crate::format::{Format, LevelCase};
use crate::record::Level;
use crate::recovery::RecoveryPolicy;
use crate::redact::RedactionConfig;
use crate::rotation::RotationTrigger;

/// `OMNI_CHANNEL_SIZE` overrides `Config::channel_capacity` when set (§6).
pub const CHANNEL_SIZE_ENV_VAR: &str = "OMNI_CHANNEL_SIZE";

#[derive(Debug, Clone, Copy)]
pub enum SizeLimit {
    Bytes(u64),
    Unlimited,
}

impl SizeLimit {
    /// Parses a human string (`"10MB"`, `"512KiB"`) via `byte-unit`.
    pub fn parse(s: &str) -> Result<SizeLimit> {
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(SizeLimit::Unlimited);
        }
        let byte = Byte::parse_str(s, true).map_err(|e| {
            Error::new(ErrorCode::InvalidConfig, "size_limit_parse").with_context(e.to_string())
        })?;
        Ok(SizeLimit::Bytes(byte.as_u64()))
    }

    pub fn as_bytes(self) -> Option<u64> {
        match self {
            SizeLimit::Bytes(n) => Some(n),
            SizeLimit::Unlimited => None,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub format: FormatKind,
    pub min_level: Level,
    pub channel_capacity: usize,
    pub max_size: SizeLimit,
    pub batch_max_size: SizeLimit,
    /// [AMBIENT] maximum buffered record count before a batch is flushed,
    /// independent of `batch_max_size` (§6 "batch_max_count").
    pub batch_max_count: Option<usize>,
    /// [AMBIENT] a pending batch flushes once this much time has elapsed
    /// since its first buffered record, even below the size/count threshold
    /// (§6 "batch_flush_interval").
    pub batch_flush_interval: Option<Duration>,
    /// [AMBIENT] when false, every write flushes immediately and the batch
    /// thresholds above are ignored (§6 "enable_batching").
    pub enable_batching: bool,
    pub max_age: Option<Duration>,
    pub max_files: Option<usize>,
    pub compress_on_rotate: bool,
    pub compression_workers: usize,
    pub compression_queue_capacity: usize,
    pub sampling: SamplingStrategy,
    pub pattern_rules: Vec<PatternRule>,
    pub redaction: RedactionConfig,
    pub recovery: RecoveryPolicy,
    pub lock_timeout: Duration,
    pub shutdown_timeout: Duration,

    /// [AMBIENT] user-settable error handler (§4.7).
    pub error_handler: Option<ErrorHandler>,
    /// [AMBIENT] internal diagnostics sidecar (§9, teacher's `utils::debug`).
    pub internal_debug: bool,
    pub debug_log_path: Option<PathBuf>,
    /// [AMBIENT] human label used in error context and metrics keys.
    pub name: Option<String>,

    /// [AMBIENT] whether the text formatter renders a timestamp column.
    pub include_time: bool,
    /// [AMBIENT] whether the text formatter renders a level column.
    pub include_level: bool,
    /// [AMBIENT] case/glyph used to render the level column.
    pub level_case: LevelCase,
}

#[derive(Debug, Clone, Copy)]
pub enum FormatKind {
    Text,
    Json,
}

impl From<FormatKind> for Format {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Text => Format::Text,
            FormatKind::Json => Format::Json,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            format: FormatKind::Text,
            min_level: Level::Info,
            channel_capacity: default_channel_capacity(),
            max_size: SizeLimit::Bytes(10 * 1024 * 1024),
            batch_max_size: SizeLimit::Unlimited,
            batch_max_count: None,
            batch_flush_interval: None,
            enable_batching: false,
            max_age: None,
            max_files: Some(10),
            compress_on_rotate: false,
            compression_workers: 2,
            compression_queue_capacity: 64,
            sampling: SamplingStrategy::None,
            pattern_rules: Vec::new(),
            redaction: RedactionConfig::default(),
            recovery: RecoveryPolicy::Drop,
            lock_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
            error_handler: None,
            internal_debug: false,
            debug_log_path: None,
            name: None,
            include_time: true,
            include_level: true,
            level_case: LevelCase::Upper,
        }
    }
}

impl Config {
    pub fn rotation_trigger(&self) -> RotationTrigger {
        match (self.max_size.as_bytes(), self.max_age) {
            (Some(bytes), Some(age)) => RotationTrigger::Both { max_bytes: bytes, max_duration: age },
            (Some(bytes), None) => RotationTrigger::Size { max_bytes: bytes },
            (None, Some(age)) => RotationTrigger::Age { max_duration: age },
            (None, None) => RotationTrigger::Never,
        }
    }

    pub fn error_handler(&self) -> ErrorHandler {
        self.error_handler
            .clone()
            .unwrap_or_else(|| Arc::new(|_err: &Error| {}))
    }
}

fn default_channel_capacity() -> usize {
    std::env::var(CHANNEL_SIZE_ENV_VAR)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1024)
}
