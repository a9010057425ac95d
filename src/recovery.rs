//! Recovery policy (§4.5, §7): what happens when a write to a destination
//! fails. Four policies, selected per error code: retry with backoff, fall
//! back to a secondary destination, buffer into a bounded side-queue for a
//! later retry pass, or drop (counted).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::record::Record;

#[derive(Debug, Clone)]
pub enum RecoveryPolicy {
    Retry { base_delay: Duration, multiplier: f64, max_delay: Duration, max_retries: u32 },
    Fallback { destination_name: String },
    Buffer { capacity: usize },
    Drop,
}

impl RecoveryPolicy {
    pub fn retry_delay(base_delay: Duration, multiplier: f64, max_delay: Duration, attempt: u32) -> Duration {
        let scaled = base_delay.as_secs_f64() * multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(max_delay.as_secs_f64()))
    }
}

/// Per-destination retry state, keyed by destination name by the caller.
pub struct RetryState {
    attempt: AtomicU32,
}

impl RetryState {
    pub fn new() -> Self {
        RetryState { attempt: AtomicU32::new(0) }
    }

    pub fn next_delay(&self, base_delay: Duration, multiplier: f64, max_delay: Duration, max_retries: u32) -> Option<Duration> {
        let attempt = self.attempt.fetch_add(1, Ordering::Relaxed);
        if attempt >= max_retries {
            return None;
        }
        Some(RecoveryPolicy::retry_delay(base_delay, multiplier, max_delay, attempt))
    }

    pub fn reset(&self) {
        self.attempt.store(0, Ordering::Relaxed);
    }
}

impl Default for RetryState {
    fn default() -> Self {
        RetryState::new()
    }
}

/// A bounded FIFO used by `RecoveryPolicy::Buffer`: records that couldn't be
/// written are parked here for a later drain attempt; once full, the oldest
/// record is evicted to make room (counted by the caller via `Metrics`).
pub struct SideBuffer {
    capacity: usize,
    records: Mutex<VecDeque<Record>>,
}

impl SideBuffer {
    pub fn new(capacity: usize) -> Self {
        SideBuffer { capacity, records: Mutex::new(VecDeque::new()) }
    }

    /// Returns the evicted record, if the buffer was already at capacity.
    pub fn push(&self, record: Record) -> Option<Record> {
        let mut records = self.records.lock();
        let evicted = if records.len() >= self.capacity {
            records.pop_front()
        } else {
            None
        };
        records.push_back(record);
        evicted
    }

    pub fn drain(&self) -> Vec<Record> {
        let mut records = self.records.lock();
        records.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;

    #[test]
    fn retry_delay_grows_with_attempt_and_clamps_to_max() {
        let base = Duration::from_millis(100);
        let d0 = RecoveryPolicy::retry_delay(base, 2.0, Duration::from_secs(10), 0);
        let d1 = RecoveryPolicy::retry_delay(base, 2.0, Duration::from_secs(10), 1);
        let d5 = RecoveryPolicy::retry_delay(base, 2.0, Duration::from_secs(10), 5);
        assert_eq!(d0, Duration::from_millis(100));
        assert_eq!(d1, Duration::from_millis(200));
        assert_eq!(d5, Duration::from_secs(10));
    }

    #[test]
    fn retry_state_exhausts_after_max_retries() {
        let state = RetryState::new();
        let base = Duration::from_millis(10);
        let max = Duration::from_secs(1);
        assert!(state.next_delay(base, 2.0, max, 2).is_some());
        assert!(state.next_delay(base, 2.0, max, 2).is_some());
        assert!(state.next_delay(base, 2.0, max, 2).is_none());
    }

    #[test]
    fn side_buffer_evicts_oldest_when_full() {
        let buffer = SideBuffer::new(2);
        assert!(buffer.push(Record::formatted(Level::Info, "a")).is_none());
        assert!(buffer.push(Record::formatted(Level::Info, "b")).is_none());
        let evicted = buffer.push(Record::formatted(Level::Info, "c"));
        assert!(evicted.is_some());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn drain_empties_the_buffer() {
        let buffer = SideBuffer::new(4);
        buffer.push(Record::formatted(Level::Info, "a"));
        buffer.push(Record::formatted(Level::Info, "b"));
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
    }
}
