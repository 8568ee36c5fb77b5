//! The ordered KV engine contract: point `get`, a write-batch builder with
//! `put`/`delete`/`delete_range`, atomic batch commit, and a consistent
//! read snapshot with forward range iteration.
//!
//! The actual storage engine (an LSM tree) lives outside this crate; the
//! traits here are the seam. `MemKvEngine` below is a reference
//! implementation used for tests and standalone embedding, not a second
//! production storage engine.

use redislist_core::Result;

/// A batch of pending mutations, committed atomically.
///
/// `Box<dyn WriteBatch>` keeps `KvEngine` object-safe — an associated type
/// on the trait itself would rule out dynamic dispatch.
pub trait WriteBatch: Send + std::any::Any {
    /// Stage a put.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Stage a point delete.
    fn delete(&mut self, key: Vec<u8>);

    /// Stage a half-open range delete `[start, end)`. Callers needing the
    /// upper bound included must pair this with an explicit `delete` of
    /// that key.
    fn delete_range(&mut self, start: Vec<u8>, end: Vec<u8>);

    /// Whether any mutation has been staged.
    fn is_empty(&self) -> bool;

    /// Discard all staged mutations without committing them.
    fn clear(&mut self);
}

/// A consistent point-in-time view supporting point reads and forward
/// range scans. The list engine never needs reverse iteration: pops and
/// pushes are point operations, and range reads (`LRange`, `FixListKey`)
/// always walk head-to-tail.
pub trait Snapshot: Send {
    /// Point read. `None` means the key is absent; `Some(vec![])` is a
    /// legitimate stored empty value and must not be collapsed to `None`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Forward scan over `[start, end)`, stopping after `limit` entries
    /// (0 means unbounded).
    fn scan_forward(
        &self,
        start: &[u8],
        end_exclusive: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// The ordered KV engine: point reads, a batch builder, atomic commit, and
/// snapshots.
pub trait KvEngine: Send + Sync {
    /// Start a new, empty write batch.
    fn new_batch(&self) -> Box<dyn WriteBatch>;

    /// Commit a batch atomically. On success all staged mutations become
    /// visible to subsequent snapshots; on failure none of them do.
    fn commit(&self, batch: Box<dyn WriteBatch>) -> Result<()>;

    /// Point read outside of any batch/snapshot (used for the
    /// pre-write corruption check in `Push`).
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Acquire a consistent read snapshot.
    fn snapshot(&self) -> Box<dyn Snapshot>;
}
