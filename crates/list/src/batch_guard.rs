//! Scoped write-batch acquisition.
//!
//! A single reused batch buffer is tempting for allocation reasons but
//! leaves a stale batch lying around after a short-circuit return, which can
//! silently bleed into the next call. This guard is created fresh at the top
//! of every mutating entry point; its `Drop` impl guarantees the batch is
//! cleared whether the call returns via an error, a corruption abort, or a
//! successful commit.

use redislist_core::Result;
use redislist_storage::{KvEngine, WriteBatch};

/// A freshly acquired write batch, cleared on every exit path.
pub struct BatchGuard<'e> {
    engine: &'e dyn KvEngine,
    batch: Option<Box<dyn WriteBatch>>,
}

impl<'e> BatchGuard<'e> {
    /// Acquire a new, empty batch from `engine`.
    pub fn new(engine: &'e dyn KvEngine) -> Self {
        Self {
            engine,
            batch: Some(engine.new_batch()),
        }
    }

    /// Mutable access to the staged batch.
    pub fn batch_mut(&mut self) -> &mut Box<dyn WriteBatch> {
        self.batch.as_mut().expect("batch already consumed")
    }

    /// Commit the staged batch, consuming the guard.
    pub fn commit(mut self) -> Result<()> {
        let batch = self.batch.take().expect("batch already consumed");
        self.engine.commit(batch)
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut batch) = self.batch.take() {
            batch.clear();
        }
    }
}
