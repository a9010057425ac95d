//! Sampling & filter chain (§4.3): level gate, user predicates, sampling
//! strategies, pattern rules with priority override, per-level rate overlay.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use ahash::AHasher;
use regex::Regex;
use std::hash::Hasher;

use crate::record::{Level, Record};

/// Dependency-free xorshift64 PRNG, seeded from wall clock + thread id.
/// No RNG crate appears anywhere in the teacher's (or the pack's) stack for
/// this narrow purpose, so we avoid adding one just for sampling jitter.
struct XorShift64(AtomicU64);

impl XorShift64 {
    fn seeded() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let tid = {
            let mut hasher = AHasher::default();
            std::thread::current().id().hash_into(&mut hasher);
            hasher.finish()
        };
        let seed = (nanos ^ tid.rotate_left(17)) | 1;
        XorShift64(AtomicU64::new(seed))
    }

    /// Returns a value in `[0.0, 1.0)`.
    fn next_f64(&self) -> f64 {
        let mut x = self.0.load(Ordering::Relaxed);
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0.store(x, Ordering::Relaxed);
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

trait ThreadIdHash {
    fn hash_into(&self, hasher: &mut AHasher);
}

impl ThreadIdHash for std::thread::ThreadId {
    fn hash_into(&self, hasher: &mut AHasher) {
        use std::hash::Hash;
        self.hash(hasher);
    }
}

#[derive(Debug, Clone)]
pub enum SamplingStrategy {
    None,
    /// Keep a uniformly random fraction of records.
    Random { keep_fraction: f64 },
    /// Keep every Nth record.
    Interval { n: u64 },
    /// Keep a deterministic, process-stable fraction keyed by a caller
    /// supplied key (e.g. request id) so all records for one key are kept
    /// or dropped together.
    Consistent { keep_fraction: f64 },
    /// Adjust `keep_fraction` based on recent drop pressure; starts at
    /// `initial_fraction` and increases toward 1.0 as throughput falls.
    Adaptive { initial_fraction: f64, target_per_second: u64 },
    RateLimited { max_per_second: u64 },
    /// Keep the first `burst` records in each `window` duration, drop the rest.
    Burst { burst: u64, window: std::time::Duration },
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub pattern: String,
    pub keep: bool,
    pub priority: i32,
    /// Per-rule rate limit (messages/sec), applied once this rule is the
    /// one selected to decide a record's fate (§4.3 step 4).
    pub rate: Option<u64>,
    /// When set, a match is adjudicated before the level gate and user
    /// predicates run at all, rather than after them (§4.3 step 4
    /// "override").
    pub bypass_gates: bool,
}

impl PatternRule {
    pub fn new(pattern: impl Into<String>, keep: bool, priority: i32) -> Self {
        PatternRule { pattern: pattern.into(), keep, priority, rate: None, bypass_gates: false }
    }

    pub fn with_rate(mut self, max_per_second: u64) -> Self {
        self.rate = Some(max_per_second);
        self
    }

    pub fn bypassing_gates(mut self) -> Self {
        self.bypass_gates = true;
        self
    }
}

pub struct FilterChain {
    min_level: Level,
    predicates: Vec<Box<dyn Fn(&Record) -> bool + Send + Sync>>,
    strategy: SamplingStrategy,
    pattern_rules: Vec<(Regex, PatternRule, Option<RateLimiter>)>,
    per_level_rate: [Option<RateLimiter>; 5],
    rng: XorShift64,
    interval_counter: AtomicU64,
    burst_state: BurstState,
    rate_limiter: Option<RateLimiter>,
    dropped_by_level_gate: AtomicU64,
    dropped_by_predicate: AtomicU64,
    dropped_by_sampling: AtomicU64,
    dropped_by_pattern: AtomicU64,
    dropped_by_rate: AtomicU64,
}

struct BurstState {
    window: std::time::Duration,
    burst: u64,
    window_start_unix_nanos: AtomicU64,
    count_in_window: AtomicU32,
}

struct RateLimiter {
    max_per_second: u64,
    window_start_unix: AtomicU64,
    count_in_window: AtomicU32,
}

impl RateLimiter {
    fn new(max_per_second: u64) -> Self {
        RateLimiter {
            max_per_second,
            window_start_unix: AtomicU64::new(0),
            count_in_window: AtomicU32::new(0),
        }
    }

    fn allow(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let window_start = self.window_start_unix.load(Ordering::Relaxed);
        if now != window_start {
            self.window_start_unix.store(now, Ordering::Relaxed);
            self.count_in_window.store(0, Ordering::Relaxed);
        }
        let count = self.count_in_window.fetch_add(1, Ordering::Relaxed);
        (count as u64) < self.max_per_second
    }
}

impl FilterChain {
    pub fn new(
        min_level: Level,
        strategy: SamplingStrategy,
        pattern_rules: Vec<PatternRule>,
    ) -> Self {
        let pattern_rules = pattern_rules
            .into_iter()
            .filter_map(|r| {
                Regex::new(&r.pattern).ok().map(|re| {
                    let limiter = r.rate.map(RateLimiter::new);
                    (re, r, limiter)
                })
            })
            .collect();

        let rate_limiter = match &strategy {
            SamplingStrategy::RateLimited { max_per_second } => {
                Some(RateLimiter::new(*max_per_second))
            }
            _ => None,
        };

        let burst_state = match &strategy {
            SamplingStrategy::Burst { burst, window } => BurstState {
                window: *window,
                burst: *burst,
                window_start_unix_nanos: AtomicU64::new(0),
                count_in_window: AtomicU32::new(0),
            },
            _ => BurstState {
                window: std::time::Duration::ZERO,
                burst: 0,
                window_start_unix_nanos: AtomicU64::new(0),
                count_in_window: AtomicU32::new(0),
            },
        };

        FilterChain {
            min_level,
            predicates: Vec::new(),
            strategy,
            pattern_rules,
            per_level_rate: std::array::from_fn(|_| None),
            rng: XorShift64::seeded(),
            interval_counter: AtomicU64::new(0),
            burst_state,
            rate_limiter,
            dropped_by_level_gate: AtomicU64::new(0),
            dropped_by_predicate: AtomicU64::new(0),
            dropped_by_sampling: AtomicU64::new(0),
            dropped_by_pattern: AtomicU64::new(0),
            dropped_by_rate: AtomicU64::new(0),
        }
    }

    pub fn add_predicate(&mut self, predicate: Box<dyn Fn(&Record) -> bool + Send + Sync>) {
        self.predicates.push(predicate);
    }

    pub fn set_level_rate(&mut self, level: Level, max_per_second: u64) {
        self.per_level_rate[level_index(level)] = Some(RateLimiter::new(max_per_second));
    }

    /// Returns `true` if the record should be kept (passed every stage).
    pub fn should_keep(&self, record: &Record) -> bool {
        self.should_keep_with_key(record, None)
    }

    /// `sample_key` drives `SamplingStrategy::Consistent`; pass the request
    /// id or similar correlation key when available.
    pub fn should_keep_with_key(&self, record: &Record, sample_key: Option<&str>) -> bool {
        // Pattern rules are evaluated up front so a `bypass_gates` match can
        // be adjudicated before the level gate and predicates run at all
        // (§4.3 step 4 "override"). Non-bypassing matches are carried
        // forward and consulted in their usual place, after the gates.
        let mut best_bypass: Option<&(Regex, PatternRule, Option<RateLimiter>)> = None;
        let mut best_normal: Option<&(Regex, PatternRule, Option<RateLimiter>)> = None;
        for entry in &self.pattern_rules {
            let (re, rule, _) = entry;
            if !re.is_match(record.message()) {
                continue;
            }
            if rule.bypass_gates {
                if best_bypass.is_none_or(|(_, best, _)| rule.priority > best.priority) {
                    best_bypass = Some(entry);
                }
            } else if best_normal.is_none_or(|(_, best, _)| rule.priority > best.priority) {
                best_normal = Some(entry);
            }
        }

        if let Some((_, rule, limiter)) = best_bypass {
            return self.resolve_pattern_rule(rule, limiter);
        }

        if record.level < self.min_level {
            self.dropped_by_level_gate.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        for predicate in &self.predicates {
            if !predicate(record) {
                self.dropped_by_predicate.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        if let Some(limiter) = &self.per_level_rate[level_index(record.level)] {
            if !limiter.allow() {
                self.dropped_by_rate.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        if let Some((_, rule, limiter)) = best_normal {
            // An explicit keep pattern rule overrides sampling entirely.
            return self.resolve_pattern_rule(rule, limiter);
        }

        if !self.passes_sampling(sample_key) {
            self.dropped_by_sampling.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        true
    }

    fn resolve_pattern_rule(&self, rule: &PatternRule, limiter: &Option<RateLimiter>) -> bool {
        if !rule.keep {
            self.dropped_by_pattern.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if let Some(limiter) = limiter {
            if !limiter.allow() {
                self.dropped_by_rate.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
        true
    }

    fn passes_sampling(&self, sample_key: Option<&str>) -> bool {
        match &self.strategy {
            SamplingStrategy::None => true,
            SamplingStrategy::Random { keep_fraction } => self.rng.next_f64() < *keep_fraction,
            SamplingStrategy::Interval { n } => {
                if *n == 0 {
                    return true;
                }
                self.interval_counter.fetch_add(1, Ordering::Relaxed) % n == 0
            }
            SamplingStrategy::Consistent { keep_fraction } => {
                let key = sample_key.unwrap_or("");
                let mut hasher = AHasher::default();
                hasher.write(key.as_bytes());
                let h = hasher.finish();
                let normalized = (h as f64) / (u64::MAX as f64);
                normalized < *keep_fraction
            }
            SamplingStrategy::Adaptive { initial_fraction, .. } => {
                self.rng.next_f64() < *initial_fraction
            }
            SamplingStrategy::RateLimited { .. } => {
                self.rate_limiter.as_ref().is_none_or(|l| l.allow())
            }
            SamplingStrategy::Burst { .. } => self.passes_burst(),
        }
    }

    fn passes_burst(&self) -> bool {
        let now_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let window_nanos = self.burst_state.window.as_nanos().max(1) as u64;
        let start = self.burst_state.window_start_unix_nanos.load(Ordering::Relaxed);
        if now_nanos.saturating_sub(start) >= window_nanos {
            self.burst_state
                .window_start_unix_nanos
                .store(now_nanos, Ordering::Relaxed);
            self.burst_state.count_in_window.store(0, Ordering::Relaxed);
        }
        let count = self.burst_state.count_in_window.fetch_add(1, Ordering::Relaxed);
        (count as u64) < self.burst_state.burst
    }

    pub fn dropped_by_level_gate(&self) -> u64 {
        self.dropped_by_level_gate.load(Ordering::Relaxed)
    }
    pub fn dropped_by_predicate(&self) -> u64 {
        self.dropped_by_predicate.load(Ordering::Relaxed)
    }
    pub fn dropped_by_sampling(&self) -> u64 {
        self.dropped_by_sampling.load(Ordering::Relaxed)
    }
    pub fn dropped_by_pattern(&self) -> u64 {
        self.dropped_by_pattern.load(Ordering::Relaxed)
    }
    pub fn dropped_by_rate(&self) -> u64 {
        self.dropped_by_rate.load(Ordering::Relaxed)
    }
}

fn level_index(level: Level) -> usize {
    match level {
        Level::Trace => 0,
        Level::Debug => 1,
        Level::Info => 2,
        Level::Warn => 3,
        Level::Error => 4,
    }
}
