//! Dynamically reconfigurable limiter thresholds, backed by plain atomics so
//! the admission hot path never takes a lock to read them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Atomic, hot-swappable limiter configuration.
pub struct LimiterConfig {
    switch_on: AtomicBool,
    refuse_cost_ms: AtomicU64,
    half_open_sec: AtomicU64,
}

impl LimiterConfig {
    /// Switch on, 600 ms refuse cost, 15 s half-open window.
    pub fn new() -> Self {
        LimiterConfig {
            switch_on: AtomicBool::new(true),
            refuse_cost_ms: AtomicU64::new(600),
            half_open_sec: AtomicU64::new(15),
        }
    }

    /// Whether the limiter is currently enforcing admission control.
    pub fn is_on(&self) -> bool {
        self.switch_on.load(Ordering::Relaxed)
    }

    /// Flip the limiter on or off.
    pub fn set_switch(&self, on: bool) {
        self.switch_on.store(on, Ordering::Relaxed);
    }

    /// Cost, in milliseconds, at or above which a single operation is
    /// unconditionally recorded as slow.
    pub fn refuse_cost_ms(&self) -> u64 {
        self.refuse_cost_ms.load(Ordering::Relaxed)
    }

    /// Set the refuse-cost threshold.
    pub fn set_refuse_cost_ms(&self, ms: u64) {
        self.refuse_cost_ms.store(ms, Ordering::Relaxed);
    }

    /// Seconds since the last slow mark during which a half-open probe is
    /// allowed through regardless of history.
    pub fn half_open_sec(&self) -> u64 {
        self.half_open_sec.load(Ordering::Relaxed)
    }

    /// Set the half-open window.
    pub fn set_half_open_sec(&self, secs: u64) {
        self.half_open_sec.store(secs, Ordering::Relaxed);
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}
