//! The adaptive slow-write limiter: per-(cmd,table) cost histograms at
//! 10/50/100ms thresholds feeding a half-open admission gate, plus a
//! background decay loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::config::LimiterConfig;
use crate::metrics::{LimiterMetrics, NoopMetrics, SlowBucket};

/// Counter never exceeds this value.
pub const MAX_SLOW: u64 = 300;
/// Counter at or above this value puts admission under scrutiny.
pub const SMALL_THRESHOLD: u64 = 20;
/// Counter at or above this value is treated as "mid" load for history
/// checks and decay rate.
pub const MID_THRESHOLD: u64 = 60;
/// Counter at or above this value is treated as "heavy" load.
pub const HEAVY_THRESHOLD: u64 = 250;

const DECAY_INTERVAL: Duration = Duration::from_secs(2);

fn feature_key(cmd: &str, table: &str) -> String {
    let mut s = String::with_capacity(cmd.len() + 1 + table.len());
    s.push_str(cmd);
    s.push(' ');
    s.push_str(table);
    s
}

struct Histograms {
    slow_10ms: FxHashMap<String, u64>,
    slow_50ms: FxHashMap<String, u64>,
    slow_100ms: FxHashMap<String, u64>,
}

impl Histograms {
    fn new() -> Self {
        Histograms {
            slow_10ms: FxHashMap::default(),
            slow_50ms: FxHashMap::default(),
            slow_100ms: FxHashMap::default(),
        }
    }

    fn clear(&mut self) {
        self.slow_10ms.clear();
        self.slow_50ms.clear();
        self.slow_100ms.clear();
    }
}

struct LimiterState {
    config: LimiterConfig,
    slow_counter: AtomicU64,
    last_slow_ts_nanos: AtomicU64,
    histograms: RwLock<Histograms>,
    metrics: Arc<dyn LimiterMetrics>,
}

impl LimiterState {
    fn is_history_slow(&self, cmd: &str, table: &str, sc: u64, ignore_10ms: bool) -> (bool, bool) {
        let feat = feature_key(cmd, table);
        let hist = self.histograms.read();
        if *hist.slow_100ms.get(&feat).unwrap_or(&0) > 2 {
            return (true, false);
        }
        if sc >= MID_THRESHOLD && *hist.slow_50ms.get(&feat).unwrap_or(&0) > 4 {
            return (true, true);
        }
        if !ignore_10ms && sc >= HEAVY_THRESHOLD && *hist.slow_10ms.get(&feat).unwrap_or(&0) > 20 {
            return (true, true);
        }
        (false, false)
    }

    fn add_slow(&self, ts_nanos: u64) {
        self.last_slow_ts_nanos.store(ts_nanos, Ordering::Relaxed);
        self.slow_counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some((c + 1).min(MAX_SLOW))
            })
            .ok();
    }
}

/// The adaptive slow-write limiter.
///
/// Cloning shares the same underlying state (it's an `Arc` handle); drop
/// the last clone (or call [`SlowLimiter::shutdown`]) to stop the decay
/// thread.
pub struct SlowLimiter {
    state: Arc<LimiterState>,
    stop_tx: Option<mpsc::Sender<()>>,
    decay_thread: Option<JoinHandle<()>>,
}

impl SlowLimiter {
    /// Build a limiter with default config and a no-op metrics sink.
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(NoopMetrics))
    }

    /// Build a limiter reporting to the given metrics sink, and spawn its
    /// decay thread.
    pub fn with_metrics(metrics: Arc<dyn LimiterMetrics>) -> Self {
        let state = Arc::new(LimiterState {
            config: LimiterConfig::new(),
            slow_counter: AtomicU64::new(0),
            last_slow_ts_nanos: AtomicU64::new(0),
            histograms: RwLock::new(Histograms::new()),
            metrics,
        });

        let (stop_tx, stop_rx) = mpsc::channel();
        let decay_state = Arc::clone(&state);
        let decay_thread = std::thread::Builder::new()
            .name("redislist-slow-decay".into())
            .spawn(move || decay_loop(decay_state, stop_rx))
            .expect("failed to spawn slow-limiter decay thread");

        SlowLimiter {
            state,
            stop_tx: Some(stop_tx),
            decay_thread: Some(decay_thread),
        }
    }

    /// Access the dynamically reconfigurable knobs.
    pub fn config(&self) -> &LimiterConfig {
        &self.state.config
    }

    /// Force the counter to its maximum and refresh the last-slow
    /// timestamp, for out-of-band slow signals (e.g. an upstream replica
    /// lag alarm).
    pub fn mark_heavy_slow(&self, ts_nanos: u64) {
        self.state.slow_counter.store(MAX_SLOW, Ordering::Relaxed);
        self.state
            .last_slow_ts_nanos
            .store(ts_nanos, Ordering::Relaxed);
    }

    /// Admission check. `table` empty means "no table scoping available";
    /// such calls are never refused.
    pub fn can_pass(&self, ts_nanos: u64, cmd: &str, table: &str) -> bool {
        if table.is_empty() || !self.state.config.is_on() {
            return true;
        }
        let sc = self.state.slow_counter.load(Ordering::Relaxed);
        if sc < SMALL_THRESHOLD {
            return true;
        }
        let half_open_nanos = self.state.config.half_open_sec() * 1_000_000_000;
        let last = self.state.last_slow_ts_nanos.load(Ordering::Relaxed);
        if ts_nanos > last.saturating_add(half_open_nanos) {
            return true;
        }

        let (slow, _) = self.state.is_history_slow(cmd, table, sc, false);
        if slow {
            self.state
                .slow_counter
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                    Some((c + 1).min(MAX_SLOW))
                })
                .ok();
            self.state.metrics.record_refused(cmd, table);
            false
        } else {
            true
        }
    }

    /// Record a completed operation's cost for the slow-write histograms.
    pub fn record_slow_cmd(&self, cmd: &str, table: &str, cost_ms: u64) {
        let bucket = if cost_ms > 100 {
            Some(SlowBucket::Ms100)
        } else if cost_ms > 50 {
            Some(SlowBucket::Ms50)
        } else if cost_ms > 10 {
            Some(SlowBucket::Ms10)
        } else {
            None
        };
        let Some(bucket) = bucket else { return };

        self.state.metrics.record_slow(bucket, cmd, table);

        if !self.state.config.is_on() {
            return;
        }
        let sc = self.state.slow_counter.load(Ordering::Relaxed);
        if sc < SMALL_THRESHOLD {
            return;
        }
        let feat = feature_key(cmd, table);
        let mut hist = self.state.histograms.write();
        let map = match bucket {
            SlowBucket::Ms100 => &mut hist.slow_100ms,
            SlowBucket::Ms50 => &mut hist.slow_50ms,
            SlowBucket::Ms10 => &mut hist.slow_10ms,
        };
        *map.entry(feat).or_insert(0) += 1;
    }

    /// Feed an observed cost into the admission state: a sufficiently
    /// slow single operation, or a moderately slow one against an already
    /// troubled history, marks the counter.
    pub fn maybe_add_slow(&self, ts_nanos: u64, cost_ms: u64, cmd: &str, table: &str) {
        if cost_ms >= self.state.config.refuse_cost_ms() {
            self.state.add_slow(ts_nanos);
            return;
        }
        let sc = self.state.slow_counter.load(Ordering::Relaxed);
        if cost_ms >= 50 && sc >= SMALL_THRESHOLD {
            let (slow, _) = self.state.is_history_slow(cmd, table, sc, true);
            if slow {
                self.state.add_slow(ts_nanos);
            }
        }
    }

    /// Stop the decay thread, blocking until it exits. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.decay_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Default for SlowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SlowLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn decay_loop(state: Arc<LimiterState>, stop_rx: mpsc::Receiver<()>) {
    loop {
        match stop_rx.recv_timeout(DECAY_INTERVAL) {
            Ok(()) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }

        let before = state.slow_counter.load(Ordering::Relaxed);
        if before == 0 {
            continue;
        }
        let d: i64 = if before >= HEAVY_THRESHOLD {
            -10
        } else if before >= MID_THRESHOLD {
            -2
        } else {
            -1
        };
        let after = (before as i64 + d).max(0) as u64;
        state.slow_counter.store(after, Ordering::Relaxed);
        debug!(before, after, "slow limiter counter decayed");

        if before >= SMALL_THRESHOLD && after < SMALL_THRESHOLD {
            state.histograms.write().clear();
            warn!("slow limiter counter dropped below threshold, histograms cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter_with_counter(sc: u64) -> SlowLimiter {
        let limiter = SlowLimiter::new();
        limiter.state.slow_counter.store(sc, Ordering::Relaxed);
        limiter
    }

    #[test]
    fn empty_table_always_passes() {
        let limiter = limiter_with_counter(MAX_SLOW);
        assert!(limiter.can_pass(0, "lpush", ""));
    }

    #[test]
    fn below_small_threshold_always_passes() {
        let limiter = limiter_with_counter(SMALL_THRESHOLD - 1);
        assert!(limiter.can_pass(0, "lpush", "t"));
    }

    #[test]
    fn refuses_once_history_is_slow() {
        let limiter = limiter_with_counter(SMALL_THRESHOLD);
        limiter.state.last_slow_ts_nanos.store(0, Ordering::Relaxed);
        {
            let mut hist = limiter.state.histograms.write();
            hist.slow_100ms.insert(feature_key("lpush", "t"), 3);
        }
        let half_open_nanos = limiter.state.config.half_open_sec() * 1_000_000_000;
        let inside_window = half_open_nanos / 2;
        assert!(!limiter.can_pass(inside_window, "lpush", "t"));
    }

    #[test]
    fn half_open_probe_is_admitted_after_window() {
        let limiter = limiter_with_counter(SMALL_THRESHOLD);
        limiter.state.last_slow_ts_nanos.store(0, Ordering::Relaxed);
        {
            let mut hist = limiter.state.histograms.write();
            hist.slow_100ms.insert(feature_key("lpush", "t"), 3);
        }
        let half_open_nanos = limiter.state.config.half_open_sec() * 1_000_000_000;
        assert!(limiter.can_pass(half_open_nanos + 1, "lpush", "t"));
    }

    #[test]
    fn maybe_add_slow_marks_on_single_costly_op() {
        let limiter = SlowLimiter::new();
        limiter.maybe_add_slow(42, 700, "lpush", "t");
        assert_eq!(limiter.state.slow_counter.load(Ordering::Relaxed), 1);
        assert_eq!(limiter.state.last_slow_ts_nanos.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn maybe_add_slow_ignores_cheap_ops() {
        let limiter = SlowLimiter::new();
        limiter.maybe_add_slow(42, 5, "lpush", "t");
        assert_eq!(limiter.state.slow_counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn record_slow_cmd_buckets_by_highest_threshold_crossed() {
        let limiter = limiter_with_counter(SMALL_THRESHOLD);
        limiter.record_slow_cmd("lpush", "t", 150);
        let hist = limiter.state.histograms.read();
        assert_eq!(*hist.slow_100ms.get("lpush t").unwrap(), 1);
        assert!(hist.slow_50ms.get("lpush t").is_none());
    }

    #[test]
    fn record_slow_cmd_below_10ms_is_ignored() {
        let limiter = limiter_with_counter(SMALL_THRESHOLD);
        limiter.record_slow_cmd("lpush", "t", 3);
        let hist = limiter.state.histograms.read();
        assert!(hist.slow_10ms.is_empty());
    }

    #[test]
    fn mark_heavy_slow_jams_counter_to_max() {
        let limiter = SlowLimiter::new();
        limiter.mark_heavy_slow(99);
        assert_eq!(limiter.state.slow_counter.load(Ordering::Relaxed), MAX_SLOW);
        assert_eq!(limiter.state.last_slow_ts_nanos.load(Ordering::Relaxed), 99);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut limiter = SlowLimiter::new();
        limiter.shutdown();
        limiter.shutdown();
    }
}
