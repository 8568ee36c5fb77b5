//! List metadata: parses and serializes the per-list header (head sequence,
//! tail sequence, update timestamp), wrapped in the versioning layer's
//! opaque outer header.

use byteorder::{BigEndian, ByteOrder};
use redislist_core::{Error, HeaderEnvelope, Result};
use redislist_storage::WriteBatch;

/// Sequences live in `[LIST_MIN_SEQ, LIST_MAX_SEQ]`; pushing past either
/// bound is an overflow.
pub const LIST_MIN_SEQ: i64 = 1000;
/// See [`LIST_MIN_SEQ`].
pub const LIST_MAX_SEQ: i64 = (1i64 << 62) - 1000;
/// Head and tail both start here on an empty list.
pub const LIST_INITIAL_SEQ: i64 = LIST_MIN_SEQ + (LIST_MAX_SEQ - LIST_MIN_SEQ) / 2;

const INNER_LEN_WITH_TS: usize = 24;
const INNER_LEN_NO_TS: usize = 16;

/// Parsed list meta: head/tail sequence, derived size, and update
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedMeta {
    /// Sequence of the first (head) element.
    pub head_seq: i64,
    /// Sequence of the last (tail) element.
    pub tail_seq: i64,
    /// `tail_seq - head_seq + 1`, or 0 if the list is absent/empty.
    pub size: u64,
    /// Timestamp of the last meta update, in milliseconds.
    pub update_ts: u64,
}

impl ParsedMeta {
    /// The meta of a list that does not exist.
    pub fn empty() -> Self {
        ParsedMeta {
            head_seq: LIST_INITIAL_SEQ,
            tail_seq: LIST_INITIAL_SEQ,
            size: 0,
            update_ts: 0,
        }
    }
}

/// Parse a stored list meta value's inner payload.
///
/// Empty input means the list does not exist. Input shorter than 16 bytes
/// is corrupt. A 24-byte input also carries `update_ts`; a 16-byte one
/// leaves it at 0.
pub fn parse_meta(inner: &[u8]) -> Result<ParsedMeta> {
    if inner.is_empty() {
        return Ok(ParsedMeta::empty());
    }
    if inner.len() < INNER_LEN_NO_TS {
        return Err(Error::InvalidMeta);
    }
    let head_seq = BigEndian::read_u64(&inner[0..8]) as i64;
    let tail_seq = BigEndian::read_u64(&inner[8..16]) as i64;
    let update_ts = if inner.len() >= INNER_LEN_WITH_TS {
        BigEndian::read_u64(&inner[16..INNER_LEN_WITH_TS])
    } else {
        0
    };
    let size = (tail_seq - head_seq + 1).max(0) as u64;
    Ok(ParsedMeta {
        head_seq,
        tail_seq,
        size,
        update_ts,
    })
}

/// Encode the 24-byte inner payload and re-wrap it with the caller's outer
/// header envelope.
pub fn encode_meta(header: &HeaderEnvelope, head_seq: i64, tail_seq: i64, update_ts: u64) -> Vec<u8> {
    let mut inner = [0u8; INNER_LEN_WITH_TS];
    BigEndian::write_u64(&mut inner[0..8], head_seq as u64);
    BigEndian::write_u64(&mut inner[8..16], tail_seq as u64);
    BigEndian::write_u64(&mut inner[16..24], update_ts);
    header.wrap(&inner)
}

/// Stage the meta row update in `batch`: delete it if the computed size is
/// 0, otherwise put the freshly encoded value. Returns the new size.
///
/// Returns [`Error::InvalidSeq`] if `tail_seq - head_seq + 1` would be
/// negative.
pub fn set_meta(
    batch: &mut dyn WriteBatch,
    meta_key: Vec<u8>,
    header: &HeaderEnvelope,
    head_seq: i64,
    tail_seq: i64,
    update_ts: u64,
) -> Result<u64> {
    let size = tail_seq - head_seq + 1;
    if size < 0 {
        return Err(Error::InvalidSeq);
    }
    if size == 0 {
        batch.delete(meta_key);
        Ok(0)
    } else {
        batch.put(meta_key, encode_meta(header, head_seq, tail_seq, update_ts));
        Ok(size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_nonexistent_list() {
        let parsed = parse_meta(&[]).unwrap();
        assert_eq!(parsed.size, 0);
        assert_eq!(parsed.head_seq, LIST_INITIAL_SEQ);
        assert_eq!(parsed.tail_seq, LIST_INITIAL_SEQ);
    }

    #[test]
    fn short_input_is_invalid() {
        assert!(matches!(parse_meta(&[1, 2, 3]), Err(Error::InvalidMeta)));
    }

    #[test]
    fn sixteen_byte_input_has_no_timestamp() {
        let encoded = encode_meta(&HeaderEnvelope::default(), 2000, 2005, 99);
        let parsed = parse_meta(&encoded[..16]).unwrap();
        assert_eq!(parsed.head_seq, 2000);
        assert_eq!(parsed.tail_seq, 2005);
        assert_eq!(parsed.size, 6);
        assert_eq!(parsed.update_ts, 0);
    }

    #[test]
    fn twenty_four_byte_input_round_trips_timestamp() {
        let encoded = encode_meta(&HeaderEnvelope::default(), 2000, 2005, 424242);
        let parsed = parse_meta(&encoded).unwrap();
        assert_eq!(parsed.update_ts, 424242);
        assert_eq!(parsed.size, 6);
    }

    #[test]
    fn set_meta_deletes_row_on_zero_size() {
        use redislist_storage::MemWriteBatch;
        let mut batch = MemWriteBatch::default();
        let size = set_meta(&mut batch, b"k".to_vec(), &HeaderEnvelope::default(), 100, 99, 1).unwrap();
        assert_eq!(size, 0);
        assert!(!batch.is_empty());
    }

    #[test]
    fn set_meta_rejects_negative_size() {
        use redislist_storage::MemWriteBatch;
        let mut batch = MemWriteBatch::default();
        let err = set_meta(&mut batch, b"k".to_vec(), &HeaderEnvelope::default(), 100, 50, 1);
        assert!(matches!(err, Err(Error::InvalidSeq)));
    }

    #[test]
    fn header_envelope_is_preserved_across_encode() {
        let header = HeaderEnvelope::new(vec![0xAB, 0xCD]);
        let encoded = encode_meta(&header, 10, 20, 5);
        assert_eq!(&encoded[..2], &[0xAB, 0xCD]);
        assert_eq!(encoded.len(), 2 + 24);
    }
}
