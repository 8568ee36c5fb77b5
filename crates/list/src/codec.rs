//! Key codec: encodes/decodes list-metadata keys and list-element keys.
//!
//! Element keys trail the sequence number last, so a forward scan over a
//! fixed (table, versioned key) returns elements in ascending `seq` order —
//! i.e. head-to-tail. Round-trip identity and lex-order-equals-seq-order are
//! both covered by the property tests at the bottom of this module.

use byteorder::{BigEndian, ByteOrder};
use redislist_core::{Error, Result};

/// Type tag byte for a list meta key.
pub const TAG_LIST_META: u8 = 0x6C; // 'l' meta
/// Type tag byte for a list element key.
pub const TAG_LIST_ELEM: u8 = 0x4C; // 'L' element

const TABLE_ID_LEN: usize = 4;
const KEY_LEN_LEN: usize = 2;
const SEQ_LEN: usize = 8;

/// Encode a list meta key: `[TAG_LIST_META] ++ table_id:u32be ++ user_key`.
///
/// Namespacing the meta key by table id the same way element rows are
/// namespaced means two tables sharing a raw keyspace can't collide on list
/// existence.
pub fn encode_meta_key(table_id: u32, user_key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + TABLE_ID_LEN + user_key.len());
    out.push(TAG_LIST_META);
    let mut table_buf = [0u8; TABLE_ID_LEN];
    BigEndian::write_u32(&mut table_buf, table_id);
    out.extend_from_slice(&table_buf);
    out.extend_from_slice(user_key);
    out
}

/// Decode a list meta key back into `(table_id, user_key)`.
pub fn decode_meta_key(bytes: &[u8]) -> Result<(u32, Vec<u8>)> {
    if bytes.len() < 1 + TABLE_ID_LEN || bytes[0] != TAG_LIST_META {
        return Err(Error::InvalidMetaKey);
    }
    let table_id = BigEndian::read_u32(&bytes[1..1 + TABLE_ID_LEN]);
    let user_key = bytes[1 + TABLE_ID_LEN..].to_vec();
    Ok((table_id, user_key))
}

/// Exclusive upper bound for a forward scan over every list meta row in a
/// table: encode the no-user-key form and bump its last byte, so the
/// result sorts after every key with that table's meta prefix.
pub fn meta_scan_upper_bound(table_id: u32) -> Vec<u8> {
    prefix_upper_bound(&encode_meta_key(table_id, &[]))
}

/// Encode a list element key:
/// `[TAG_LIST_ELEM] ++ table_id:u32be ++ key_len:u16be ++ versioned_key ++ seq:u64be`.
///
/// `seq` is carried as `i64` throughout the engine but is always within
/// `[LIST_MIN_SEQ, LIST_MAX_SEQ]`, both comfortably positive, so a plain
/// big-endian reinterpretation as `u64` preserves numeric order — no
/// sign-flip encoding needed.
pub fn encode_element_key(table_id: u32, versioned_key: &[u8], seq: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        1 + TABLE_ID_LEN + KEY_LEN_LEN + versioned_key.len() + SEQ_LEN,
    );
    out.push(TAG_LIST_ELEM);
    let mut table_buf = [0u8; TABLE_ID_LEN];
    BigEndian::write_u32(&mut table_buf, table_id);
    out.extend_from_slice(&table_buf);
    let mut len_buf = [0u8; KEY_LEN_LEN];
    BigEndian::write_u16(&mut len_buf, versioned_key.len() as u16);
    out.extend_from_slice(&len_buf);
    out.extend_from_slice(versioned_key);
    let mut seq_buf = [0u8; SEQ_LEN];
    BigEndian::write_u64(&mut seq_buf, seq as u64);
    out.extend_from_slice(&seq_buf);
    out
}

/// Decode a list element key back into `(table_id, versioned_key, seq)`.
pub fn decode_element_key(bytes: &[u8]) -> Result<(u32, Vec<u8>, i64)> {
    let header_len = 1 + TABLE_ID_LEN + KEY_LEN_LEN;
    if bytes.len() < header_len || bytes[0] != TAG_LIST_ELEM {
        return Err(Error::InvalidListKey);
    }
    let table_id = BigEndian::read_u32(&bytes[1..1 + TABLE_ID_LEN]);
    let key_len =
        BigEndian::read_u16(&bytes[1 + TABLE_ID_LEN..header_len]) as usize;
    if bytes.len() != header_len + key_len + SEQ_LEN {
        return Err(Error::InvalidListKey);
    }
    let versioned_key = bytes[header_len..header_len + key_len].to_vec();
    let seq = BigEndian::read_u64(&bytes[header_len + key_len..]) as i64;
    Ok((table_id, versioned_key, seq))
}

/// Compute an exclusive upper bound for a scan over every key sharing
/// `prefix`: increment the last byte that isn't `0xFF`, truncating
/// everything after it. If `prefix` is all `0xFF` bytes, no finite upper
/// bound exists within the same length; we extend by one `0x00` byte,
/// which still sorts after every key with that prefix.
fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    for i in (0..out.len()).rev() {
        if out[i] != 0xFF {
            out[i] += 1;
            out.truncate(i + 1);
            return out;
        }
    }
    out.push(0x00);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn meta_key_round_trip() {
        let encoded = encode_meta_key(7, b"mylist");
        let (table_id, user_key) = decode_meta_key(&encoded).unwrap();
        assert_eq!(table_id, 7);
        assert_eq!(user_key, b"mylist");
    }

    #[test]
    fn meta_key_rejects_wrong_tag() {
        let mut encoded = encode_meta_key(1, b"k");
        encoded[0] = TAG_LIST_ELEM;
        assert!(matches!(decode_meta_key(&encoded), Err(Error::InvalidMetaKey)));
    }

    #[test]
    fn element_key_round_trip() {
        let encoded = encode_element_key(3, b"versioned-key", 123_456);
        let (table_id, vkey, seq) = decode_element_key(&encoded).unwrap();
        assert_eq!(table_id, 3);
        assert_eq!(vkey, b"versioned-key");
        assert_eq!(seq, 123_456);
    }

    #[test]
    fn element_key_rejects_length_mismatch() {
        let mut encoded = encode_element_key(1, b"k", 5);
        encoded.pop();
        assert!(matches!(decode_element_key(&encoded), Err(Error::InvalidListKey)));
    }

    #[test]
    fn meta_scan_upper_bound_excludes_all_table_keys() {
        let table_id = 9;
        let upper = meta_scan_upper_bound(table_id);
        let some_key = encode_meta_key(table_id, b"\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff");
        assert!(some_key.as_slice() < upper.as_slice());
        let other_table = encode_meta_key(table_id + 1, b"");
        assert!(upper.as_slice() <= other_table.as_slice());
    }

    proptest! {
        #[test]
        fn prop_element_key_round_trip(
            table_id in any::<u32>(),
            vkey in proptest::collection::vec(any::<u8>(), 0..64),
            seq in 1000i64..((1i64 << 62) - 1000),
        ) {
            let encoded = encode_element_key(table_id, &vkey, seq);
            let (t, k, s) = decode_element_key(&encoded).unwrap();
            prop_assert_eq!(t, table_id);
            prop_assert_eq!(k, vkey);
            prop_assert_eq!(s, seq);
        }

        #[test]
        fn prop_lex_order_matches_seq_order(
            table_id in any::<u32>(),
            vkey in proptest::collection::vec(any::<u8>(), 0..32),
            s1 in 1000i64..((1i64 << 62) - 1000),
            s2 in 1000i64..((1i64 << 62) - 1000),
        ) {
            let k1 = encode_element_key(table_id, &vkey, s1);
            let k2 = encode_element_key(table_id, &vkey, s2);
            prop_assert_eq!(k1 < k2, s1 < s2);
        }

        #[test]
        fn prop_meta_key_round_trip(
            table_id in any::<u32>(),
            user_key in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let encoded = encode_meta_key(table_id, &user_key);
            let (t, k) = decode_meta_key(&encoded).unwrap();
            prop_assert_eq!(t, table_id);
            prop_assert_eq!(k, user_key);
        }
    }
}
