//! Ingest-dispatch core (§4.5): the `Logger` owns the destination list, the
//! bounded ingest queue, and a dispatcher thread that pulls records off the
//! queue, runs them through the filter chain and redaction, formats them,
//! and writes them to every enabled destination.
//!
//! Grounded in the teacher's `backend/async.rs` writer-thread pattern
//! (`crossbeam_channel` + dedicated `thread::spawn` loop with
//! `recv_timeout` ticks). The destination list, active level, and active
//! format live behind `logger_rwlock` (§5's lock order:
//! `logger_rwlock -> destination_mutex -> advisory_file_lock` — the
//! dispatcher only ever takes a read guard here before touching a
//! `Destination`'s own mutex, never the reverse), so `Add`/`Remove`/
//! `Enable`/`Disable`/`SetLevel`/`SetFormat` can mutate live state without
//! ever taking the same lock a concurrent destination write already holds.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::RecvTimeoutError;
use parking_lot::RwLock;

use crate::compress::CompressionPool;
use crate::config::{Config, FormatKind};
use crate::destination::Destination;
use crate::error::{Error, ErrorCode, Result};
use crate::filter::FilterChain;
use crate::format::{self, Format, FormatOptions, Formatter};
use crate::metrics::Metrics;
use crate::queue::IngestQueue;
use crate::record::{Level, Record};
use crate::recovery::{RecoveryPolicy, RetryState, SideBuffer};
use crate::redact::Redactor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    Initializing,
    Running,
    Draining,
    Closed,
}

/// Everything `Add`/`Remove`/`Enable`/`Disable`/`SetLevel`/`SetFormat` can
/// change at runtime, guarded by one `logger_rwlock` (§5).
struct MutableState {
    destinations: Vec<Arc<Destination>>,
    min_level: Level,
    formatter: Box<dyn Formatter>,
}

pub struct Logger {
    config: Config,
    state_lock: RwLock<MutableState>,
    queue: Arc<IngestQueue>,
    filter_chain: Arc<FilterChain>,
    redactor: Arc<Redactor>,
    format_opts: FormatOptions,
    metrics: Arc<Metrics>,
    compression: Option<Arc<CompressionPool>>,
    side_buffer: Arc<SideBuffer>,
    retry_state: RetryState,
    next_retry_at_nanos: AtomicU64,
    state: parking_lot::Mutex<LoggerState>,
    running: Arc<AtomicBool>,
    dispatcher: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Logger {
    pub fn new(config: Config, filter_chain: FilterChain, destinations: Vec<Arc<Destination>>) -> Arc<Self> {
        if config.internal_debug {
            crate::debug::configure(true, config.debug_log_path.clone());
        }

        let metrics = Arc::new(Metrics::new(config.channel_capacity));
        let queue = Arc::new(IngestQueue::new(config.channel_capacity));
        let redactor = Arc::new(Redactor::new(&config.redaction));
        let formatter = format::formatter(config.format.into());
        let format_opts = FormatOptions {
            include_time: config.include_time,
            include_level: config.include_level,
            level_case: config.level_case,
            ..FormatOptions::default()
        };

        let compression = if config.compress_on_rotate {
            Some(Arc::new(CompressionPool::start(
                config.compression_workers,
                config.compression_queue_capacity,
                metrics.clone(),
                config.error_handler(),
            )))
        } else {
            None
        };

        let side_buffer_capacity = match &config.recovery {
            RecoveryPolicy::Buffer { capacity } => *capacity,
            _ => 0,
        };

        let min_level = config.min_level;

        let logger = Arc::new(Logger {
            state_lock: RwLock::new(MutableState { destinations, min_level, formatter }),
            config,
            queue,
            filter_chain: Arc::new(filter_chain),
            redactor,
            format_opts,
            metrics,
            compression,
            side_buffer: Arc::new(SideBuffer::new(side_buffer_capacity.max(1))),
            retry_state: RetryState::new(),
            next_retry_at_nanos: AtomicU64::new(0),
            state: parking_lot::Mutex::new(LoggerState::Initializing),
            running: Arc::new(AtomicBool::new(true)),
            dispatcher: parking_lot::Mutex::new(None),
        });

        logger.start_dispatcher();
        *logger.state.lock() = LoggerState::Running;
        logger
    }

    fn start_dispatcher(self: &Arc<Self>) {
        let logger = self.clone();
        let handle = std::thread::spawn(move || logger.dispatch_loop());
        *self.dispatcher.lock() = Some(handle);
    }

    fn dispatch_loop(self: Arc<Self>) {
        while self.running.load(Ordering::Relaxed) {
            match self.queue.recv_timeout(Duration::from_millis(200)) {
                Ok(record) => self.dispatch_one(record),
                Err(RecvTimeoutError::Timeout) => {
                    self.retry_buffered();
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // Drain whatever is left in the queue before the thread exits.
        while let Ok(record) = self.queue.recv_timeout(Duration::from_millis(0)) {
            self.dispatch_one(record);
        }
    }

    fn dispatch_one(&self, mut record: Record) {
        self.redactor.redact(&mut record);
        self.metrics.set_queue_depth(self.queue.depth());

        let (destinations, bytes) = {
            let state = self.state_lock.read();
            let bytes = state.formatter.format(&record, &self.format_opts);
            (state.destinations.clone(), bytes)
        };

        for destination in &destinations {
            if !destination.is_enabled() {
                continue;
            }
            if let Err(err) = destination.write(&bytes) {
                self.handle_write_error(destination, err, &record);
            }
        }
    }

    fn handle_write_error(&self, destination: &Arc<Destination>, err: Error, record: &Record) {
        self.metrics.record_error(err.code);
        (self.config.error_handler())(&err);
        crate::debug::recovery(&destination.name, &err.to_string());

        match &self.config.recovery {
            RecoveryPolicy::Drop => {
                self.metrics.record_dropped();
            }
            RecoveryPolicy::Buffer { .. } => {
                self.side_buffer.push(record.clone());
            }
            RecoveryPolicy::Fallback { destination_name } => {
                let state = self.state_lock.read();
                if let Some(fallback) = state.destinations.iter().find(|d| &d.name == destination_name) {
                    let bytes = state.formatter.format(record, &self.format_opts);
                    let _ = fallback.write(&bytes);
                }
            }
            RecoveryPolicy::Retry { .. } => {
                // A single synchronous write has already failed; full
                // backoff scheduling is driven by the dispatcher's periodic
                // tick via `retry_buffered`, not inline on the hot write
                // path.
                self.side_buffer.push(record.clone());
            }
        }
    }

    /// Drains the side buffer and attempts redelivery to any enabled
    /// destination, driven from the dispatcher's ~200ms tick (§4.5, §7).
    /// `RecoveryPolicy::Buffer` retries every tick; `RecoveryPolicy::Retry`
    /// is paced by `RetryState`'s exponential backoff and gives up — leaving
    /// already-buffered records parked rather than discarding them — once
    /// `max_retries` is exhausted.
    fn retry_buffered(&self) {
        if self.side_buffer.is_empty() {
            return;
        }

        if let RecoveryPolicy::Retry { base_delay, multiplier, max_delay, max_retries } = &self.config.recovery {
            let (base_delay, multiplier, max_delay, max_retries) = (*base_delay, *multiplier, *max_delay, *max_retries);
            let now = now_unix_nanos();
            if now < self.next_retry_at_nanos.load(Ordering::Relaxed) {
                return;
            }
            let mut any_failed = false;
            for record in self.side_buffer.drain() {
                if !self.deliver_to_any_destination(&record) {
                    any_failed = true;
                    self.side_buffer.push(record);
                }
            }
            if any_failed {
                match self.retry_state.next_delay(base_delay, multiplier, max_delay, max_retries) {
                    Some(delay) => {
                        self.next_retry_at_nanos
                            .store(now.saturating_add(delay.as_nanos() as u64), Ordering::Relaxed);
                    }
                    None => {
                        self.next_retry_at_nanos.store(u64::MAX, Ordering::Relaxed);
                    }
                }
            } else {
                self.retry_state.reset();
            }
            return;
        }

        // `RecoveryPolicy::Buffer`: best-effort redelivery every tick, no backoff.
        for record in self.side_buffer.drain() {
            if !self.deliver_to_any_destination(&record) {
                self.side_buffer.push(record);
            }
        }
    }

    fn deliver_to_any_destination(&self, record: &Record) -> bool {
        let state = self.state_lock.read();
        let bytes = state.formatter.format(record, &self.format_opts);
        state
            .destinations
            .iter()
            .any(|destination| destination.is_enabled() && destination.write(&bytes).is_ok())
    }

    /// Submission API (§4.5): fast level check, filter chain, redaction
    /// happens later in the dispatcher (not here, to keep this call cheap),
    /// non-blocking enqueue, emergency fallback on a full queue.
    pub fn submit(&self, record: Record) {
        let min_level = self.state_lock.read().min_level;
        if record.level < min_level {
            self.metrics.record_dropped();
            return;
        }
        if !self.filter_chain.should_keep(&record) {
            self.metrics.record_dropped();
            return;
        }

        self.metrics.record_logged(record.level);

        if let Err(rejected) = self.queue.try_submit(record) {
            self.metrics.record_dropped();
            self.emergency_fallback(&rejected);
        }
        self.metrics.set_queue_depth(self.queue.depth());
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.submit(Record::formatted(level, message));
    }

    /// Queue was full: write directly to stderr rather than silently
    /// discarding, matching the teacher's "never lose a record silently if
    /// avoidable" intent for the async writer's own overflow case.
    fn emergency_fallback(&self, record: &Record) {
        let bytes = self.state_lock.read().formatter.format(record, &self.format_opts);
        let _ = std::io::Write::write_all(&mut std::io::stderr(), &bytes);
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn set_destinations(&self, destinations: Vec<Arc<Destination>>) {
        self.state_lock.write().destinations = destinations;
    }

    /// Adds a destination to the live list (§4.7 Admin operation "Add").
    pub fn add_destination(&self, destination: Arc<Destination>) {
        self.state_lock.write().destinations.push(destination);
    }

    /// Removes a destination by name (§4.7 Admin operation "Remove"); a
    /// no-op if no destination carries that name.
    pub fn remove_destination(&self, name: &str) {
        self.state_lock.write().destinations.retain(|d| d.name != name);
    }

    /// Enables a destination by name without touching the destination list
    /// itself (§4.7 Admin operation "Enable"); a read guard suffices since
    /// `Destination::set_enabled` is interior-mutable.
    pub fn enable_destination(&self, name: &str) {
        if let Some(destination) = self.state_lock.read().destinations.iter().find(|d| d.name == name) {
            destination.set_enabled(true);
        }
    }

    /// Disables a destination by name (§4.7 Admin operation "Disable").
    pub fn disable_destination(&self, name: &str) {
        if let Some(destination) = self.state_lock.read().destinations.iter().find(|d| d.name == name) {
            destination.set_enabled(false);
        }
    }

    /// Changes the live minimum level (§4.7 Admin operation "SetLevel").
    pub fn set_level(&self, level: Level) {
        self.state_lock.write().min_level = level;
    }

    /// Swaps the active formatter (§4.7 Admin operation "SetFormat").
    pub fn set_format(&self, format: FormatKind) {
        self.state_lock.write().formatter = format::formatter(Format::from(format));
    }

    /// Blocks until the queue drains or `deadline` elapses, then stops the
    /// dispatcher thread, joins the compression pool's workers to
    /// completion (not itself bounded by `deadline`), and closes every
    /// destination (§4.5 lifecycle, §9 Open Question (a)).
    pub fn shutdown(&self, deadline: Duration) -> Result<()> {
        *self.state.lock() = LoggerState::Draining;
        let start = Instant::now();

        while self.queue.depth() > 0 && start.elapsed() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }

        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.dispatcher.lock().take() {
            let _ = handle.join();
        }

        if let Some(pool) = &self.compression {
            pool.shutdown();
        }

        for destination in &self.state_lock.read().destinations {
            let _ = destination.close();
        }

        *self.state.lock() = LoggerState::Closed;

        if self.queue.depth() > 0 {
            return Err(Error::new(ErrorCode::ShutdownTimeout, "logger_shutdown")
                .with_context(format!("{} records still queued", self.queue.depth())));
        }
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.shutdown(self.config.shutdown_timeout)
    }

    pub fn state(&self) -> LoggerState {
        *self.state.lock()
    }
}

fn now_unix_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::RotationConfig;
    use crate::filter::SamplingStrategy;
    use tempfile::TempDir;

    fn make_logger(dir: &TempDir) -> Arc<Logger> {
        let path = dir.path().join("app.log");
        let destination = Arc::new(
            Destination::file("primary", &path, RotationConfig::default(), None).unwrap(),
        );
        let filter_chain = FilterChain::new(Level::Trace, SamplingStrategy::None, Vec::new());
        Logger::new(Config::default(), filter_chain, vec![destination])
    }

    #[test]
    fn submit_writes_through_to_destination_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let logger = make_logger(&dir);
        logger.log(Level::Info, "hello world");
        logger.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("hello world"));
    }

    #[test]
    fn records_below_min_level_are_dropped_before_queueing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut config = Config::default();
        config.min_level = Level::Error;
        let destination = Arc::new(
            Destination::file("primary", &path, RotationConfig::default(), None).unwrap(),
        );
        let filter_chain = FilterChain::new(Level::Trace, SamplingStrategy::None, Vec::new());
        let logger = Logger::new(config, filter_chain, vec![destination]);

        logger.log(Level::Info, "should be dropped");
        logger.close().unwrap();

        assert_eq!(logger.metrics().messages_dropped(), 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("should be dropped"));
    }

    #[test]
    fn shutdown_closes_destinations_and_drains_queue() {
        let dir = TempDir::new().unwrap();
        let logger = make_logger(&dir);
        for i in 0..20 {
            logger.log(Level::Info, format!("line {i}"));
        }
        assert!(logger.close().is_ok());
        assert_eq!(logger.state(), LoggerState::Closed);
    }

    #[test]
    fn set_level_changes_the_live_gate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let logger = make_logger(&dir);

        logger.set_level(Level::Error);
        logger.log(Level::Info, "dropped by the new gate");
        logger.set_level(Level::Trace);
        logger.log(Level::Info, "kept after the gate is lowered");
        logger.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("dropped by the new gate"));
        assert!(contents.contains("kept after the gate is lowered"));
    }

    #[test]
    fn disable_and_enable_destination_toggle_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let logger = make_logger(&dir);

        logger.disable_destination("primary");
        logger.log(Level::Info, "while disabled");
        logger.enable_destination("primary");
        logger.log(Level::Info, "while enabled");
        logger.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("while disabled"));
        assert!(contents.contains("while enabled"));
    }

    #[test]
    fn add_and_remove_destination_update_the_live_list() {
        let dir = TempDir::new().unwrap();
        let logger = make_logger(&dir);
        let extra_path = dir.path().join("extra.log");
        let extra = Arc::new(
            Destination::file("extra", &extra_path, RotationConfig::default(), None).unwrap(),
        );

        logger.add_destination(extra);
        logger.log(Level::Info, "goes to both");
        logger.remove_destination("extra");
        logger.log(Level::Info, "primary only");
        logger.close().unwrap();

        let extra_contents = std::fs::read_to_string(&extra_path).unwrap();
        assert!(extra_contents.contains("goes to both"));
        assert!(!extra_contents.contains("primary only"));
    }
}
