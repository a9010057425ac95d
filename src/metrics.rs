//! Metrics & error substrate (§4.7).
//!
//! All counters are plain atomics behind a small façade, in the spirit of
//! the teacher's `LoggerMetrics` struct, generalized to be genuinely
//! concurrent-safe since the ingest-dispatch core is multi-producer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ErrorCode;
use crate::record::Level;

const LEVEL_COUNT: usize = 5;
const ERROR_CODE_COUNT: usize = 19;

fn level_index(level: Level) -> usize {
    match level {
        Level::Trace => 0,
        Level::Debug => 1,
        Level::Info => 2,
        Level::Warn => 3,
        Level::Error => 4,
    }
}

fn code_index(code: ErrorCode) -> usize {
    match code {
        ErrorCode::FileOpen => 0,
        ErrorCode::FileWrite => 1,
        ErrorCode::FileFlush => 2,
        ErrorCode::FileLock => 3,
        ErrorCode::FileRotate => 4,
        ErrorCode::ChannelFull => 5,
        ErrorCode::ChannelClosed => 6,
        ErrorCode::DestinationNotFound => 7,
        ErrorCode::DestinationDisabled => 8,
        ErrorCode::DestinationNil => 9,
        ErrorCode::CompressionFailed => 10,
        ErrorCode::CompressionQueueFull => 11,
        ErrorCode::SyslogConnection => 12,
        ErrorCode::SyslogWrite => 13,
        ErrorCode::ShutdownTimeout => 14,
        ErrorCode::AlreadyClosed => 15,
        ErrorCode::InvalidConfig => 16,
        ErrorCode::InvalidLevel => 17,
        ErrorCode::InvalidFormat => 18,
    }
}

const ALL_ERROR_CODES: [ErrorCode; ERROR_CODE_COUNT] = [
    ErrorCode::FileOpen,
    ErrorCode::FileWrite,
    ErrorCode::FileFlush,
    ErrorCode::FileLock,
    ErrorCode::FileRotate,
    ErrorCode::ChannelFull,
    ErrorCode::ChannelClosed,
    ErrorCode::DestinationNotFound,
    ErrorCode::DestinationDisabled,
    ErrorCode::DestinationNil,
    ErrorCode::CompressionFailed,
    ErrorCode::CompressionQueueFull,
    ErrorCode::SyslogConnection,
    ErrorCode::SyslogWrite,
    ErrorCode::ShutdownTimeout,
    ErrorCode::AlreadyClosed,
    ErrorCode::InvalidConfig,
    ErrorCode::InvalidLevel,
    ErrorCode::InvalidFormat,
];

/// Process-wide (per-logger) counters.
#[derive(Debug, Default)]
pub struct Metrics {
    messages_logged: [AtomicU64; LEVEL_COUNT],
    messages_dropped: AtomicU64,
    queue_capacity: AtomicUsize,
    rotation_count: AtomicU64,
    compression_count: AtomicU64,
    bytes_written: AtomicU64,
    error_count: AtomicU64,
    errors_by_source: [AtomicU64; ERROR_CODE_COUNT],
    queue_depth: AtomicUsize,
    total_write_nanos: AtomicU64,
    write_count: AtomicU64,
    max_write_nanos: AtomicU64,
}

impl Metrics {
    pub fn new(queue_capacity: usize) -> Self {
        let m = Metrics::default();
        m.queue_capacity.store(queue_capacity, Ordering::Relaxed);
        m
    }

    pub fn record_logged(&self, level: Level) {
        self.messages_logged[level_index(level)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rotation(&self) {
        self.rotation_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compression(&self) {
        self.compression_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes_written(&self, n: u64) {
        self.bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_error(&self, code: ErrorCode) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
        self.errors_by_source[code_index(code)].fetch_add(1, Ordering::Relaxed);
    }

    /// Count of errors recorded under a specific `ErrorCode` (§4.7
    /// "errors_by_source").
    pub fn errors_by_source(&self, code: ErrorCode) -> u64 {
        self.errors_by_source[code_index(code)].load(Ordering::Relaxed)
    }

    /// A full breakdown of error counts, one entry per known `ErrorCode`.
    pub fn errors_by_source_breakdown(&self) -> Vec<(ErrorCode, u64)> {
        ALL_ERROR_CODES
            .iter()
            .map(|&code| (code, self.errors_by_source(code)))
            .collect()
    }

    /// Updates the current ingest-queue occupancy (§4.7 "queue_depth");
    /// called from the submit/dispatch path, not computed lazily, since the
    /// bounded channel doesn't expose its own depth cheaply.
    pub fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// `queue_depth / queue_capacity`, or `0.0` when capacity is unset.
    pub fn queue_utilization(&self) -> f64 {
        let capacity = self.queue_capacity();
        if capacity == 0 {
            return 0.0;
        }
        self.queue_depth() as f64 / capacity as f64
    }

    pub fn record_write_latency(&self, d: Duration) {
        let nanos = d.as_nanos().min(u64::MAX as u128) as u64;
        self.total_write_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.max_write_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    pub fn messages_logged(&self, level: Level) -> u64 {
        self.messages_logged[level_index(level)].load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.load(Ordering::Relaxed)
    }

    pub fn rotation_count(&self) -> u64 {
        self.rotation_count.load(Ordering::Relaxed)
    }

    pub fn compression_count(&self) -> u64 {
        self.compression_count.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn average_write_time(&self) -> Duration {
        let count = self.write_count.load(Ordering::Relaxed);
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_write_nanos.load(Ordering::Relaxed) / count)
    }

    pub fn max_write_time(&self) -> Duration {
        Duration::from_nanos(self.max_write_nanos.load(Ordering::Relaxed))
    }
}

/// Per-destination counters (§3 Destination).
#[derive(Debug, Default)]
pub struct DestinationMetrics {
    bytes_written: AtomicU64,
    current_size: AtomicU64,
    writes: AtomicU64,
    rotations: AtomicU64,
    errors: AtomicU64,
    last_write_unix_nanos: AtomicU64,
    total_latency_nanos: AtomicU64,
}

impl DestinationMetrics {
    pub fn record_write(&self, bytes: u64, latency: Duration) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.total_latency_nanos
            .fetch_add(latency.as_nanos().min(u64::MAX as u128) as u64, Ordering::Relaxed);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        self.last_write_unix_nanos.store(now, Ordering::Relaxed);
    }

    pub fn set_current_size(&self, size: u64) {
        self.current_size.store(size, Ordering::Relaxed);
    }

    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn average_latency(&self) -> Duration {
        let writes = self.writes.load(Ordering::Relaxed);
        if writes == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_latency_nanos.load(Ordering::Relaxed) / writes)
    }
}
