//! Bounded ingest queue (§4.5): wraps a `crossbeam_channel` bounded channel
//! with an explicit depth counter so `Logger::submit` can report queue
//! capacity/occupancy through `Metrics` without racing the channel's own
//! internal bookkeeping.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;

use crate::record::Record;

pub struct IngestQueue {
    sender: Sender<Record>,
    receiver: Receiver<Record>,
    depth: AtomicUsize,
    capacity: usize,
}

impl IngestQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        IngestQueue {
            sender,
            receiver,
            depth: AtomicUsize::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Non-blocking submit; returns the record back on failure so the
    /// caller can route it into the recovery side-buffer (§4.5).
    pub fn try_submit(&self, record: Record) -> Result<(), Record> {
        match self.sender.try_send(record) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(record)) => Err(record),
            Err(TrySendError::Disconnected(record)) => Err(record),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Record, RecvTimeoutError> {
        let result = self.receiver.recv_timeout(timeout);
        if result.is_ok() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        result
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sender(&self) -> Sender<Record> {
        self.sender.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;

    #[test]
    fn depth_tracks_submit_and_receive() {
        let queue = IngestQueue::new(4);
        queue.try_submit(Record::formatted(Level::Info, "a")).unwrap();
        queue.try_submit(Record::formatted(Level::Info, "b")).unwrap();
        assert_eq!(queue.depth(), 2);
        queue.recv_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(queue.depth(), 1);
    }

    #[test]
    fn full_queue_returns_record_instead_of_blocking() {
        let queue = IngestQueue::new(1);
        queue.try_submit(Record::formatted(Level::Info, "a")).unwrap();
        let rejected = queue.try_submit(Record::formatted(Level::Info, "b"));
        assert!(rejected.is_err());
    }
}
