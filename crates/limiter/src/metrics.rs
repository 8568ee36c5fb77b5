//! Metrics sink the limiter reports to. The actual metrics backend lives
//! outside this crate; this module only defines the seam plus a no-op
//! reference impl, the same pattern `redislist_core::CollectionHooks` uses
//! for table counters.

/// Which threshold an observed operation crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowBucket {
    /// Exceeded 10ms.
    Ms10,
    /// Exceeded 50ms.
    Ms50,
    /// Exceeded 100ms.
    Ms100,
}

/// Counters the limiter emits, labeled `{table, cmd}`.
pub trait LimiterMetrics: Send + Sync {
    /// A completed operation crossed a slow-write bucket.
    fn record_slow(&self, bucket: SlowBucket, cmd: &str, table: &str);

    /// An operation was refused admission.
    fn record_refused(&self, cmd: &str, table: &str);
}

/// Discards every observation. Used by tests and standalone embedding.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl LimiterMetrics for NoopMetrics {
    fn record_slow(&self, _bucket: SlowBucket, _cmd: &str, _table: &str) {}
    fn record_refused(&self, _cmd: &str, _table: &str) {}
}
