//! KV engine contract for redislist: point get, a write-batch builder,
//! atomic commit, and consistent-snapshot range scans — plus `MemKvEngine`,
//! a `BTreeMap`-backed reference implementation used by every test in this
//! workspace.
//!
//! The real engine (an LSM tree) lives elsewhere; this crate only defines
//! the seam and a conformance-test double for it.

#![warn(missing_docs)]

pub mod engine;
pub mod mem_engine;

pub use engine::{KvEngine, Snapshot, WriteBatch};
pub use mem_engine::{MemKvEngine, MemSnapshot, MemWriteBatch};
