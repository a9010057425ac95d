//! Destination & rotation manager (§4.4, §3): owns one backend, its
//! rotation/retention policy, and the write protocol: lock, format (done by
//! the caller before reaching here), rotate-if-needed, append, flush,
//! unlock.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::backend::file::FileBackend;
use crate::backend::Backend;
use crate::compress::CompressionPool;
use crate::error::{Error, ErrorCode, Result};
use crate::metrics::DestinationMetrics;
use crate::retention::{enforce, RetentionPolicy};
use crate::rotation::{rotate, AdvisoryLock, RotationTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    Open,
    Writing,
    Rotating,
    Closing,
    Closed,
}

/// Optional per-destination batch buffer (§4.4 "Batching (optional)"): a
/// write below both thresholds is held in memory and the call returns
/// immediately; crossing either threshold, or the flush timer elapsing,
/// triggers a full flush under the same lock that guards the writer.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub enabled: bool,
    pub max_bytes: u64,
    pub max_count: usize,
    pub flush_interval: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig { enabled: false, max_bytes: u64::MAX, max_count: usize::MAX, flush_interval: None }
    }
}

/// File-backed rotation/retention policy. Syslog and plugin destinations
/// bypass all of this (§4.4 "syslog/plugin bypass") and are represented by
/// `Destination::passthrough`, which never rotates.
#[derive(Debug, Clone, Copy)]
pub struct RotationConfig {
    pub trigger: RotationTrigger,
    pub retention: RetentionPolicy,
    pub compress_on_rotate: bool,
    pub lock_timeout: Duration,
    pub batching: BatchConfig,
}

impl Default for RotationConfig {
    fn default() -> Self {
        RotationConfig {
            trigger: RotationTrigger::Never,
            retention: RetentionPolicy::default(),
            compress_on_rotate: false,
            lock_timeout: Duration::from_secs(5),
            batching: BatchConfig::default(),
        }
    }
}

enum BackendKind {
    File {
        base: PathBuf,
        backend: FileBackend,
        rotation: RotationConfig,
        opened_at: Instant,
        batch_buffer: Vec<u8>,
        batch_count: usize,
        batch_opened_at: Instant,
    },
    Passthrough(Box<dyn Backend>),
}

pub struct Destination {
    pub name: String,
    kind: Mutex<BackendKind>,
    state: Mutex<DestinationState>,
    enabled: AtomicBool,
    current_size: AtomicU64,
    pub metrics: Arc<DestinationMetrics>,
    compression: Option<Arc<CompressionPool>>,
}

impl Destination {
    pub fn file(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        rotation: RotationConfig,
        compression: Option<Arc<CompressionPool>>,
    ) -> Result<Self> {
        let base = path.into();
        let backend = FileBackend::open(&base)?;
        let current_size = std::fs::metadata(&base).map(|m| m.len()).unwrap_or(0);

        Ok(Destination {
            name: name.into(),
            kind: Mutex::new(BackendKind::File {
                base,
                backend,
                rotation,
                opened_at: Instant::now(),
                batch_buffer: Vec::new(),
                batch_count: 0,
                batch_opened_at: Instant::now(),
            }),
            state: Mutex::new(DestinationState::Open),
            enabled: AtomicBool::new(true),
            current_size: AtomicU64::new(current_size),
            metrics: Arc::new(DestinationMetrics::default()),
            compression,
        })
    }

    pub fn passthrough(name: impl Into<String>, backend: Box<dyn Backend>) -> Self {
        Destination {
            name: name.into(),
            kind: Mutex::new(BackendKind::Passthrough(backend)),
            state: Mutex::new(DestinationState::Open),
            enabled: AtomicBool::new(true),
            current_size: AtomicU64::new(0),
            metrics: Arc::new(DestinationMetrics::default()),
            compression: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Write protocol: lock -> rotate-if-needed -> append -> flush -> unlock
    /// (§4.4). Formatting has already happened by the time `bytes` reaches
    /// here. When batching is enabled a write below both thresholds is
    /// folded into the in-memory batch buffer and returns immediately
    /// without touching the backend; crossing a threshold flushes the whole
    /// buffer through the same rotate-then-write path a single record would
    /// have taken.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_enabled() {
            return Err(Error::new(ErrorCode::DestinationDisabled, "destination_write")
                .with_destination(self.name.clone()));
        }

        *self.state.lock() = DestinationState::Writing;
        let start = Instant::now();
        let mut kind = self.kind.lock();

        let result = match &mut *kind {
            BackendKind::Passthrough(backend) => {
                backend.write(bytes).and_then(|_| backend.flush()).map(|_| bytes.len() as u64)
            }
            BackendKind::File { base, backend, rotation, opened_at, batch_buffer, batch_count, batch_opened_at } => {
                if rotation.batching.enabled {
                    batch_buffer.extend_from_slice(bytes);
                    *batch_count += 1;
                    let over_bytes = batch_buffer.len() as u64 >= rotation.batching.max_bytes;
                    let over_count = *batch_count >= rotation.batching.max_count;
                    let timer_elapsed = rotation
                        .batching
                        .flush_interval
                        .is_some_and(|interval| batch_opened_at.elapsed() >= interval);

                    if !(over_bytes || over_count || timer_elapsed) {
                        drop(kind);
                        *self.state.lock() = DestinationState::Open;
                        return Ok(());
                    }

                    let pending = std::mem::take(batch_buffer);
                    *batch_count = 0;
                    *batch_opened_at = Instant::now();
                    let written = pending.len() as u64;
                    self.rotate_then_write(base, backend, rotation, opened_at, &pending)
                        .map(|_| written)
                } else {
                    let written = bytes.len() as u64;
                    self.rotate_then_write(base, backend, rotation, opened_at, bytes)
                        .map(|_| written)
                }
            }
        };

        drop(kind);
        *self.state.lock() = DestinationState::Open;

        match result {
            Ok(written) => {
                self.current_size.fetch_add(written, Ordering::Relaxed);
                self.metrics.set_current_size(self.current_size.load(Ordering::Relaxed));
                self.metrics.record_write(written, start.elapsed());
                Ok(())
            }
            Err(e) => {
                self.metrics.record_error();
                Err(e)
            }
        }
    }

    /// Rotates the backend if `bytes` would push it over threshold, then
    /// appends and flushes. Shared by the unbatched path and a batch flush,
    /// where `bytes` is the whole accumulated buffer rather than one record.
    fn rotate_then_write(
        &self,
        base: &PathBuf,
        backend: &mut FileBackend,
        rotation: &RotationConfig,
        opened_at: &mut Instant,
        bytes: &[u8],
    ) -> Result<()> {
        let size_now = self.current_size.load(Ordering::Relaxed);
        let age = opened_at.elapsed();
        if rotation.trigger.should_rotate(size_now, bytes.len() as u64, age) {
            *self.state.lock() = DestinationState::Rotating;
            self.rotate_locked(base, backend, rotation, opened_at)?;
            *self.state.lock() = DestinationState::Writing;
        }
        backend.write(bytes).and_then(|_| backend.flush())
    }

    fn rotate_locked(
        &self,
        base: &PathBuf,
        backend: &mut FileBackend,
        rotation: &RotationConfig,
        opened_at: &mut Instant,
    ) -> Result<()> {
        let _lock = AdvisoryLock::acquire(base, rotation.lock_timeout)?;

        backend.flush()?;
        backend.close()?;

        let outcome = rotate(base)?;

        *backend = FileBackend::open(base.clone())?;
        *opened_at = Instant::now();
        self.current_size.store(0, Ordering::Relaxed);
        self.metrics.record_rotation();

        if outcome.rotated_path.exists() {
            if rotation.compress_on_rotate {
                if let Some(pool) = &self.compression {
                    pool.submit(outcome.rotated_path.clone());
                }
            }
            enforce(base, rotation.retention);
        }

        Ok(())
    }

    /// Closing forces a final flush of any pending batch buffer before the
    /// backend itself is closed (§4.4 "Closing the destination forces a
    /// final flush").
    pub fn close(&self) -> Result<()> {
        *self.state.lock() = DestinationState::Closing;
        let mut kind = self.kind.lock();
        let result = match &mut *kind {
            BackendKind::File { base, backend, rotation, opened_at, batch_buffer, batch_count, .. } => {
                let flush_result = if !batch_buffer.is_empty() {
                    let pending = std::mem::take(batch_buffer);
                    *batch_count = 0;
                    let written = pending.len() as u64;
                    let result = self.rotate_then_write(base, backend, rotation, opened_at, &pending);
                    if result.is_ok() {
                        self.current_size.fetch_add(written, Ordering::Relaxed);
                        self.metrics.set_current_size(self.current_size.load(Ordering::Relaxed));
                    }
                    result
                } else {
                    Ok(())
                };
                flush_result.and_then(|_| backend.close())
            }
            BackendKind::Passthrough(backend) => backend.close(),
        };
        *self.state.lock() = DestinationState::Closed;
        result
    }

    pub fn state(&self) -> DestinationState {
        *self.state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_appends_and_tracks_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let dest = Destination::file("primary", &path, RotationConfig::default(), None).unwrap();
        dest.write(b"hello\n").unwrap();
        assert_eq!(dest.current_size(), 6);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn disabled_destination_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let dest = Destination::file("primary", &path, RotationConfig::default(), None).unwrap();
        dest.set_enabled(false);
        assert!(dest.write(b"x").is_err());
    }

    #[test]
    fn size_trigger_rotates_before_the_write_that_exceeds_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let rotation = RotationConfig {
            trigger: RotationTrigger::Size { max_bytes: 10 },
            ..RotationConfig::default()
        };
        let dest = Destination::file("primary", &path, rotation, None).unwrap();
        // 7 bytes fits under the 10-byte threshold on its own, but the next
        // 9-byte write would push the file to 16 bytes, over the threshold
        // -- rotation must fire before that second write lands, not after.
        dest.write(b"1234567").unwrap();
        dest.write(b"overflowed").unwrap();

        let rotated_count = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_str()
                    .unwrap()
                    .starts_with("app.log.")
            })
            .count();
        assert_eq!(rotated_count, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "overflowed");
    }

    #[test]
    fn size_trigger_does_not_rotate_a_write_that_fits_exactly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let rotation = RotationConfig {
            trigger: RotationTrigger::Size { max_bytes: 10 },
            ..RotationConfig::default()
        };
        let dest = Destination::file("primary", &path, rotation, None).unwrap();
        dest.write(b"1234567890").unwrap();

        let rotated_count = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_str()
                    .unwrap()
                    .starts_with("app.log.")
            })
            .count();
        assert_eq!(rotated_count, 0);
    }

    #[test]
    fn batched_write_below_thresholds_stays_in_memory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let rotation = RotationConfig {
            batching: BatchConfig { enabled: true, max_bytes: 1_000, max_count: 10, flush_interval: None },
            ..RotationConfig::default()
        };
        let dest = Destination::file("primary", &path, rotation, None).unwrap();
        dest.write(b"one\n").unwrap();
        dest.write(b"two\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        assert_eq!(dest.current_size(), 0);
    }

    #[test]
    fn batch_flushes_once_count_threshold_is_crossed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let rotation = RotationConfig {
            batching: BatchConfig { enabled: true, max_bytes: u64::MAX, max_count: 3, flush_interval: None },
            ..RotationConfig::default()
        };
        let dest = Destination::file("primary", &path, rotation, None).unwrap();
        dest.write(b"a\n").unwrap();
        dest.write(b"b\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        dest.write(b"c\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
        assert_eq!(dest.current_size(), 6);
    }

    #[test]
    fn closing_a_destination_flushes_a_pending_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let rotation = RotationConfig {
            batching: BatchConfig { enabled: true, max_bytes: u64::MAX, max_count: usize::MAX, flush_interval: None },
            ..RotationConfig::default()
        };
        let dest = Destination::file("primary", &path, rotation, None).unwrap();
        dest.write(b"buffered\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        dest.close().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "buffered\n");
    }
}
