//! `redislist`: a Redis-compatible list over an ordered KV engine, fronted
//! by an adaptive slow-write limiter.
//!
//! [`ListStore`] is the thin public surface: every operation first consults
//! the limiter's admission gate, then delegates to the list engine, then
//! feeds the observed cost back to the limiter.

#![warn(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use redislist_core::{Error, Result};
pub use redislist_list::{ExpirePolicy, ListEngineConfig, Side};
pub use redislist_limiter::{LimiterMetrics, NoopMetrics, SlowBucket, SlowLimiter};

use redislist_core::{CollectionHooks, VersioningLayer};
use redislist_list::ListEngine;
use redislist_storage::KvEngine;

/// The public facade: wires the list engine and the slow-write limiter
/// together into a single call path for each command.
pub struct ListStore {
    engine: ListEngine,
    limiter: SlowLimiter,
}

fn now_nanos() -> u64 {
    // Only used for limiter bookkeeping (relative comparisons against
    // `lastSlowTs`), never persisted, so wall-clock monotonicity is enough.
    Instant::now().elapsed().as_nanos() as u64
}

impl ListStore {
    /// Build a store over the given collaborators, with default list and
    /// limiter configuration and a no-op metrics sink.
    pub fn new(
        kv: Arc<dyn KvEngine>,
        versioning: Arc<dyn VersioningLayer>,
        hooks: Arc<dyn CollectionHooks>,
    ) -> Self {
        Self::with_config(kv, versioning, hooks, ListEngineConfig::default(), Arc::new(NoopMetrics))
    }

    /// Build a store with explicit list-engine configuration and a metrics
    /// sink for the limiter.
    pub fn with_config(
        kv: Arc<dyn KvEngine>,
        versioning: Arc<dyn VersioningLayer>,
        hooks: Arc<dyn CollectionHooks>,
        config: ListEngineConfig,
        metrics: Arc<dyn LimiterMetrics>,
    ) -> Self {
        ListStore {
            engine: ListEngine::new(kv, versioning, hooks, config),
            limiter: SlowLimiter::with_metrics(metrics),
        }
    }

    /// Dynamically reconfigurable limiter knobs.
    pub fn limiter_config(&self) -> &redislist_limiter::LimiterConfig {
        self.limiter.config()
    }

    fn table_label(&self, user_key: &[u8]) -> String {
        self.engine
            .table_of(user_key)
            .map(|t| t.to_string())
            .unwrap_or_default()
    }

    /// Run `op` under the limiter's admission gate, recording its cost
    /// back into the limiter on every path (success or error).
    fn guarded<T>(&self, ts_ms: u64, cmd: &str, user_key: &[u8], op: impl FnOnce() -> Result<T>) -> Result<T> {
        let table = self.table_label(user_key);
        let ts_nanos = now_nanos();
        if !self.limiter.can_pass(ts_nanos, cmd, &table) {
            return Err(Error::RefusedBySlowLimiter);
        }

        let start = Instant::now();
        let result = op();
        let cost_ms = start.elapsed().as_millis() as u64;

        self.limiter.record_slow_cmd(cmd, &table, cost_ms);
        self.limiter.maybe_add_slow(ts_nanos, cost_ms, cmd, &table);
        let _ = ts_ms; // carried through for API symmetry with the engine's own ts param

        result
    }

    /// LPush.
    pub fn lpush(&self, ts_ms: u64, key: &[u8], values: &[Vec<u8>]) -> Result<u64> {
        self.guarded(ts_ms, "lpush", key, || {
            self.engine.push(ts_ms, key, values, Side::Head)
        })
    }

    /// RPush.
    pub fn rpush(&self, ts_ms: u64, key: &[u8], values: &[Vec<u8>]) -> Result<u64> {
        self.guarded(ts_ms, "rpush", key, || {
            self.engine.push(ts_ms, key, values, Side::Tail)
        })
    }

    /// LPop.
    pub fn lpop(&self, ts_ms: u64, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.guarded(ts_ms, "lpop", key, || self.engine.pop(ts_ms, key, Side::Head))
    }

    /// RPop.
    pub fn rpop(&self, ts_ms: u64, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.guarded(ts_ms, "rpop", key, || self.engine.pop(ts_ms, key, Side::Tail))
    }

    /// LIndex.
    pub fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        self.guarded(0, "lindex", key, || self.engine.index(key, index))
    }

    /// LSet.
    pub fn lset(&self, ts_ms: u64, key: &[u8], index: i64, value: Vec<u8>) -> Result<()> {
        self.guarded(ts_ms, "lset", key, || self.engine.set(ts_ms, key, index, value))
    }

    /// LRange.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        self.guarded(0, "lrange", key, || self.engine.range(key, start, stop))
    }

    /// LLen.
    pub fn llen(&self, key: &[u8]) -> Result<u64> {
        self.guarded(0, "llen", key, || self.engine.len(key))
    }

    /// LVer.
    pub fn lver(&self, key: &[u8]) -> Result<u64> {
        self.guarded(0, "lver", key, || self.engine.ver(key))
    }

    /// LTrim, range form.
    pub fn ltrim(&self, ts_ms: u64, key: &[u8], start: i64, stop: i64) -> Result<()> {
        self.guarded(ts_ms, "ltrim", key, || self.engine.trim(ts_ms, key, start, stop))
    }

    /// LTrimFront, count form.
    pub fn ltrim_front(&self, ts_ms: u64, key: &[u8], count: u64) -> Result<u64> {
        self.guarded(ts_ms, "ltrimfront", key, || self.engine.trim_front(ts_ms, key, count))
    }

    /// LTrimBack, count form.
    pub fn ltrim_back(&self, ts_ms: u64, key: &[u8], count: u64) -> Result<u64> {
        self.guarded(ts_ms, "ltrimback", key, || self.engine.trim_back(ts_ms, key, count))
    }

    /// LClear.
    pub fn lclear(&self, ts_ms: u64, key: &[u8]) -> Result<u64> {
        self.guarded(ts_ms, "lclear", key, || self.engine.clear(ts_ms, key))
    }

    /// LMclear: a capped batch of keys. Admission is checked per key
    /// against its own table, the way `LClear` is.
    pub fn lmclear(&self, ts_ms: u64, keys: &[Vec<u8>]) -> Result<u64> {
        if keys.len() > self.engine.config().max_batch_num {
            return Err(Error::TooMuchBatchSize);
        }
        let mut removed = 0u64;
        for key in keys {
            removed += self.lclear(ts_ms, key)?;
        }
        Ok(removed)
    }

    /// LKeyExists.
    pub fn lkey_exists(&self, key: &[u8]) -> Result<bool> {
        self.engine.key_exists(key)
    }

    /// LExpire.
    pub fn lexpire(&self, key: &[u8], ttl: Duration) -> Result<bool> {
        self.guarded(0, "lexpire", key, || self.engine.expire(key, ttl))
    }

    /// LPersist.
    pub fn lpersist(&self, key: &[u8]) -> Result<bool> {
        self.guarded(0, "lpersist", key, || self.engine.persist(key))
    }

    /// LFixKey.
    pub fn lfix_key(&self, ts_ms: u64, key: &[u8]) -> Result<()> {
        self.engine.fix_list_key(ts_ms, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redislist_core::{NoopHooks, PlainVersioning};
    use redislist_storage::MemKvEngine;

    fn store() -> ListStore {
        ListStore::new(
            Arc::new(MemKvEngine::new()),
            Arc::new(PlainVersioning::default()),
            Arc::new(NoopHooks),
        )
    }

    #[test]
    fn push_pop_round_trip() {
        let store = store();
        let key = b"mylist";
        assert_eq!(
            store
                .rpush(1, key, &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()])
                .unwrap(),
            3
        );
        assert_eq!(store.lrange(key, 0, -1).unwrap(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(store.rpop(2, key).unwrap(), Some(b"c".to_vec()));
        assert_eq!(store.llen(key).unwrap(), 2);
    }

    #[test]
    fn lpush_then_rpop_scenario() {
        let store = store();
        let key = b"k";
        store.lpush(1, key, &[b"a".to_vec()]).unwrap();
        assert_eq!(store.rpop(2, key).unwrap(), Some(b"a".to_vec()));
        assert_eq!(store.llen(key).unwrap(), 0);
    }

    #[test]
    fn lmclear_respects_batch_cap() {
        let store = store();
        let keys: Vec<Vec<u8>> = (0..3000u32).map(|i| i.to_be_bytes().to_vec()).collect();
        assert!(matches!(store.lmclear(1, &keys), Err(Error::TooMuchBatchSize)));
    }

    #[test]
    fn refused_error_is_retryable() {
        assert!(Error::RefusedBySlowLimiter.is_retryable());
    }
}
