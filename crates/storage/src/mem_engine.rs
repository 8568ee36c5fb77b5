//! `MemKvEngine`: a `BTreeMap`-backed reference implementation of
//! [`KvEngine`], guarded by a `parking_lot::RwLock`. Snapshots are taken by
//! cloning the map — cheap enough for an in-memory test double and
//! trivially consistent.

use crate::engine::{KvEngine, Snapshot, WriteBatch};
use parking_lot::RwLock;
use redislist_core::Result;
use std::collections::BTreeMap;
use std::ops::Bound;

/// One staged mutation in a [`MemWriteBatch`].
enum Mutation {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
    DeleteRange(Vec<u8>, Vec<u8>),
}

/// Write batch for [`MemKvEngine`]: an ordered list of staged mutations,
/// applied in order on commit.
#[derive(Default)]
pub struct MemWriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch for MemWriteBatch {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.mutations.push(Mutation::Put(key, value));
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.mutations.push(Mutation::Delete(key));
    }

    fn delete_range(&mut self, start: Vec<u8>, end: Vec<u8>) {
        self.mutations.push(Mutation::DeleteRange(start, end));
    }

    fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    fn clear(&mut self) {
        self.mutations.clear();
    }
}

/// Snapshot over a cloned copy of the store at acquisition time.
pub struct MemSnapshot {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Snapshot for MemSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn scan_forward(
        &self,
        start: &[u8],
        end_exclusive: &[u8],
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let range = self
            .data
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end_exclusive)));
        let iter = range.map(|(k, v)| (k.clone(), v.clone()));
        Ok(if limit == 0 {
            iter.collect()
        } else {
            iter.take(limit).collect()
        })
    }
}

/// In-memory reference implementation of the ordered KV engine contract.
#[derive(Default)]
pub struct MemKvEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKvEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvEngine for MemKvEngine {
    fn new_batch(&self) -> Box<dyn WriteBatch> {
        Box::new(MemWriteBatch::default())
    }

    fn commit(&self, mut batch: Box<dyn WriteBatch>) -> Result<()> {
        // MemKvEngine only ever hands out batches it created itself via
        // `new_batch`, so this downcast always succeeds in practice.
        let batch = (&mut *batch as &mut dyn std::any::Any)
            .downcast_mut::<MemWriteBatch>()
            .ok_or_else(|| redislist_core::Error::Storage("foreign write batch".into()))?;
        let mutations = std::mem::take(&mut batch.mutations);
        let mut data = self.data.write();
        for mutation in mutations {
            match mutation {
                Mutation::Put(k, v) => {
                    data.insert(k, v);
                }
                Mutation::Delete(k) => {
                    data.remove(&k);
                }
                Mutation::DeleteRange(start, end) => {
                    let keys: Vec<Vec<u8>> = data
                        .range::<[u8], _>((Bound::Included(start.as_slice()), Bound::Excluded(end.as_slice())))
                        .map(|(k, _)| k.clone())
                        .collect();
                    for k in keys {
                        data.remove(&k);
                    }
                }
            }
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn snapshot(&self) -> Box<dyn Snapshot> {
        Box::new(MemSnapshot {
            data: self.data.read().clone(),
        })
    }
}
