//! Compression worker pool (§4.6): a fixed number of threads drain a
//! bounded job queue, gzip each rotated file, and delete the source on
//! success. Never blocks rotation — `submit` is non-blocking and simply
//! drops the job (counted) if the queue is full, since a missed
//! compression just leaves a plain rotated file behind, which is harmless.
//!
//! Grounded in the teacher's `backend/async.rs` worker-thread pattern
//! (`crossbeam_channel` + `thread::spawn` + graceful join on shutdown).

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;

use crate::error::ErrorHandler;
use crate::error::{Error, ErrorCode};
use crate::metrics::Metrics;

enum Job {
    Compress(PathBuf),
    Shutdown,
}

pub struct CompressionPool {
    sender: Sender<Job>,
    workers: parking_lot::Mutex<Vec<std::thread::JoinHandle<()>>>,
    queued: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl CompressionPool {
    pub fn start(
        worker_count: usize,
        queue_capacity: usize,
        metrics: Arc<Metrics>,
        error_handler: ErrorHandler,
    ) -> Self {
        let (sender, receiver): (Sender<Job>, Receiver<Job>) = bounded(queue_capacity);
        let queued = Arc::new(AtomicU64::new(0));
        let dropped = Arc::new(AtomicU64::new(0));

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let receiver = receiver.clone();
                let metrics = metrics.clone();
                let error_handler = error_handler.clone();
                let queued = queued.clone();
                std::thread::spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        match job {
                            Job::Compress(path) => {
                                queued.fetch_sub(1, Ordering::Relaxed);
                                if let Err(e) = compress_file(&path) {
                                    error_handler(&e);
                                } else {
                                    metrics.record_compression();
                                }
                            }
                            Job::Shutdown => break,
                        }
                    }
                })
            })
            .collect();

        CompressionPool {
            sender,
            workers: parking_lot::Mutex::new(workers),
            queued,
            dropped,
            queue_capacity,
        }
    }

    /// Enqueues `path` for compression; returns `false` (and counts a drop)
    /// if the queue is full rather than blocking the rotation path.
    pub fn submit(&self, path: PathBuf) -> bool {
        match self.sender.try_send(Job::Compress(path)) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Sends a shutdown job to every worker and joins them, draining
    /// whatever compression jobs are already queued first; part of
    /// `Logger`'s `Shutdown(deadline)` path (§4.5, §9 Open Question (a)).
    /// Takes `&self` (not `self`) since `Logger` only ever holds the pool
    /// behind an `Arc` shared with its own dispatcher thread.
    pub fn shutdown(&self) {
        let mut workers = self.workers.lock();
        for _ in workers.iter() {
            let _ = self.sender.send(Job::Shutdown);
        }
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn compress_file(path: &PathBuf) -> Result<(), Error> {
    let gz_path = {
        let mut p = path.as_os_str().to_os_string();
        p.push(".gz");
        PathBuf::from(p)
    };

    // Atomic-create: if a `.gz` already exists (a previous crashed run left
    // one), skip rather than overwrite.
    let gz_file = fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&gz_path)
        .map_err(|e| Error::from_io(ErrorCode::CompressionFailed, "compress_create", e).with_path(&gz_path))?;

    let result = (|| -> io::Result<()> {
        let source = File::open(path)?;
        let mut reader = BufReader::new(source);
        let mut encoder = GzEncoder::new(gz_file, GzCompression::default());
        io::copy(&mut reader, &mut encoder)?;
        let mut file = encoder.finish()?;
        file.sync_all()
    })();

    match result {
        Ok(()) => {
            fs::remove_file(path)
                .map_err(|e| Error::from_io(ErrorCode::CompressionFailed, "compress_remove_source", e).with_path(path))?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&gz_path);
            Err(Error::from_io(ErrorCode::CompressionFailed, "compress_write", e).with_path(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error as EngineError;
    use std::io::Read as _;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn compress_file_produces_gz_and_removes_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log.20260101-000000.000");
        fs::write(&path, b"hello world, compress me").unwrap();

        compress_file(&path).unwrap();

        assert!(!path.exists());
        let gz_path = {
            let mut p = path.as_os_str().to_os_string();
            p.push(".gz");
            PathBuf::from(p)
        };
        assert!(gz_path.exists());

        let mut decoder = flate2::read::GzDecoder::new(File::open(&gz_path).unwrap());
        let mut contents = String::new();
        decoder.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello world, compress me");
    }

    #[test]
    fn pool_compresses_submitted_file_and_updates_metrics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log.20260101-000000.000");
        fs::write(&path, b"pool test").unwrap();

        let metrics = Arc::new(Metrics::new(10));
        let errors: Arc<std::sync::Mutex<Vec<EngineError>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let errors_clone = errors.clone();
        let handler: ErrorHandler = Arc::new(move |e| errors_clone.lock().unwrap().push(e.clone()));

        let pool = CompressionPool::start(1, 4, metrics.clone(), handler);
        assert!(pool.submit(path.clone()));
        pool.shutdown();

        assert!(errors.lock().unwrap().is_empty());
        assert_eq!(metrics.compression_count(), 1);
    }

    #[test]
    fn full_queue_counts_a_drop_instead_of_blocking() {
        let metrics = Arc::new(Metrics::new(10));
        let handler: ErrorHandler = Arc::new(|_| {});
        // Zero workers means nothing ever drains the queue.
        let (sender, _receiver) = bounded::<Job>(1);
        let pool = CompressionPool {
            sender,
            workers: parking_lot::Mutex::new(Vec::new()),
            queued: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            queue_capacity: 1,
        };
        let _ = metrics;
        let _ = handler;
        assert!(pool.submit(PathBuf::from("/tmp/a")));
        assert!(!pool.submit(PathBuf::from("/tmp/b")));
        assert_eq!(pool.dropped(), 1);
    }
}
