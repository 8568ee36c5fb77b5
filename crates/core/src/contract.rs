//! Collaborator contracts the list engine consumes but does not implement:
//! the collection-key versioning layer and the table-level hooks (live-key
//! counters, expiration-metadata cleanup, metrics).
//!
//! These are traits on purpose — the versioning layer, table counters, and
//! metrics sinks live in other parts of the system; this crate only needs a
//! seam to call into them, plus a reference implementation each for tests.

use crate::error::Result;
use std::time::Duration;

/// Redis data type a key belongs to, passed to the versioning layer so it
/// can namespace keys per type. Only `List` is exercised by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Redis list type.
    List,
}

/// Opaque capability object wrapping the outer header bytes owned by the
/// versioning layer. The list engine never interprets the contents; it only
/// re-wraps the 24-byte inner meta payload on every meta update.
///
/// Modeled as a concrete struct rather than a trait object: a real
/// versioning layer would hand back something with this same
/// wrap/unwrap shape, whatever its internal format, and a struct avoids the
/// dynamic-dispatch overhead for something re-encoded on every write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderEnvelope {
    prefix: Vec<u8>,
}

impl HeaderEnvelope {
    /// Construct an envelope from the versioning layer's opaque prefix
    /// bytes (everything in the outer header that isn't the inner payload).
    pub fn new(prefix: Vec<u8>) -> Self {
        Self { prefix }
    }

    /// Re-wrap the 24-byte inner list-meta payload with this envelope's
    /// prefix, producing the bytes to store.
    pub fn wrap(&self, inner: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + inner.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(inner);
        out
    }

    /// Split stored bytes into (envelope, inner payload), given the known
    /// inner payload width. Returns `None` if `bytes` is shorter than
    /// `inner_len`.
    pub fn unwrap(bytes: &[u8], inner_len: usize) -> Option<(Self, &[u8])> {
        if bytes.len() < inner_len {
            return None;
        }
        let split = bytes.len() - inner_len;
        Some((Self::new(bytes[..split].to_vec()), &bytes[split..]))
    }
}

/// Whether a key is live, or has logically expired and should be treated as
/// absent by the list engine even though its row may still be on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireVerdict {
    /// Key is live.
    NotExpired,
    /// Key has expired; treat as if it does not exist.
    Expired,
}

/// Per-key resolution returned by the versioning layer: which table the key
/// lives in, its versioned raw-key form, whether it has expired, and the
/// opaque header envelope wrapping its meta value.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    /// Table identifier the key's rows live under.
    pub table_id: u32,
    /// Key after the versioning layer has appended its generation suffix.
    pub versioned_key: Vec<u8>,
    /// Liveness verdict.
    pub expire: ExpireVerdict,
    /// Opaque outer header envelope for the meta value.
    pub header: HeaderEnvelope,
}

impl KeyInfo {
    /// True if this key should be treated as absent (expired).
    pub fn is_expired(&self) -> bool {
        matches!(self.expire, ExpireVerdict::Expired)
    }
}

/// The collection-key versioning layer: given a raw user key and a type
/// tag, resolves the table, versioned key, expiration verdict, and header
/// envelope. Implemented and owned outside this crate in production; we
/// only depend on this seam.
pub trait VersioningLayer: Send + Sync {
    /// Resolve a user key into its `KeyInfo`.
    fn key_info(&self, user_key: &[u8], type_tag: TypeTag) -> Result<KeyInfo>;
}

/// Table-level side effects the list engine must trigger but does not own:
/// the live-key counter, expiration-metadata cleanup, and collection-size
/// metrics. Grouped as one trait because the list engine always knows all
/// three at the same call sites and a single collaborator is simpler to
/// thread through than three.
pub trait CollectionHooks: Send + Sync {
    /// Called when a list transitions from size 0 (or expired) to size ≥ 1.
    fn incr_live_keys(&self, table_id: u32);

    /// Called when a list transitions from size ≥ 1 to size 0.
    fn decr_live_keys(&self, table_id: u32);

    /// Called when a list's size drops to 0, to remove any expiration
    /// metadata tracked for the key.
    fn delete_expire_meta(&self, table_id: u32, user_key: &[u8]);

    /// Called with the post-operation size so a collection-length
    /// histogram can be recorded when it crosses a configured threshold.
    fn observe_collection_len(&self, table_id: u32, size: u64);

    /// Set (or refresh) an expiration on a key.
    fn set_expire(&self, table_id: u32, user_key: &[u8], ttl: Duration);

    /// Clear any expiration previously set on a key.
    fn persist(&self, table_id: u32, user_key: &[u8]);

    /// Whether a key currently carries a (non-expired) TTL.
    fn has_expire(&self, table_id: u32, user_key: &[u8]) -> bool;
}

/// No-op hooks for tests and standalone embedding without a metrics/TTL
/// backend wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl CollectionHooks for NoopHooks {
    fn incr_live_keys(&self, _table_id: u32) {}
    fn decr_live_keys(&self, _table_id: u32) {}
    fn delete_expire_meta(&self, _table_id: u32, _user_key: &[u8]) {}
    fn observe_collection_len(&self, _table_id: u32, _size: u64) {}
    fn set_expire(&self, _table_id: u32, _user_key: &[u8], _ttl: Duration) {}
    fn persist(&self, _table_id: u32, _user_key: &[u8]) {}
    fn has_expire(&self, _table_id: u32, _user_key: &[u8]) -> bool {
        false
    }
}

/// Pass-through versioning layer: no real multi-generation versioning, a
/// single fixed table, nothing ever expires. Used by tests and by
/// standalone embedding where the versioning layer isn't present.
#[derive(Debug, Clone, Copy)]
pub struct PlainVersioning {
    table_id: u32,
}

impl PlainVersioning {
    /// Build a plain versioning layer addressing a single table.
    pub fn new(table_id: u32) -> Self {
        Self { table_id }
    }
}

impl Default for PlainVersioning {
    fn default() -> Self {
        Self::new(0)
    }
}

impl VersioningLayer for PlainVersioning {
    fn key_info(&self, user_key: &[u8], _type_tag: TypeTag) -> Result<KeyInfo> {
        Ok(KeyInfo {
            table_id: self.table_id,
            versioned_key: user_key.to_vec(),
            expire: ExpireVerdict::NotExpired,
            header: HeaderEnvelope::default(),
        })
    }
}
