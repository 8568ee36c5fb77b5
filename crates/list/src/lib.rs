//! Redis-compatible list semantics over an ordered KV engine: key codec,
//! meta encoding, the scoped batch guard, and the list engine itself.

#![warn(missing_docs)]

pub mod batch_guard;
pub mod codec;
pub mod engine;
pub mod meta;

pub use batch_guard::BatchGuard;
pub use engine::{ExpirePolicy, ListEngine, ListEngineConfig, Side};
pub use meta::{ParsedMeta, LIST_INITIAL_SEQ, LIST_MAX_SEQ, LIST_MIN_SEQ};
