//! Tests for the command codec
//!
//! These tests verify:
//! - Single command and batch envelope round trips
//! - Encoding is deterministic
//! - Malformed input fails with a decode error
//! - Operation classification

use std::collections::BTreeMap;

use atlasmeta::protocol::{decode, decode_batch, encode, encode_batch, Command, OpCode, OpKind};
use atlasmeta::AtlasError;

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_command_round_trip() {
    let cmd = Command::new(OpCode::SYNC_ADD_DATA_NODE, "#dn#10.0.0.1:17310", vec![1, 2, 3]);

    let decoded = decode(&encode(&cmd).unwrap()).unwrap();

    assert_eq!(decoded, cmd);
}

#[test]
fn test_empty_key_and_value() {
    let cmd = Command::new(OpCode::SYNC_PUT, "", Vec::new());

    assert_eq!(decode(&encode(&cmd).unwrap()).unwrap(), cmd);
}

#[test]
fn test_unknown_op_survives_round_trip() {
    let cmd = Command::new(OpCode(0xBEEF), "k", b"v".to_vec());

    let decoded = decode(&encode(&cmd).unwrap()).unwrap();

    assert_eq!(decoded.op, OpCode(0xBEEF));
    assert_eq!(decoded.kind(), OpKind::Put);
}

#[test]
fn test_batch_round_trip() {
    let mut batch = BTreeMap::new();
    batch.insert("a".to_string(), Command::new(OpCode::SYNC_PUT, "a", b"1".to_vec()));
    batch.insert("b".to_string(), Command::new(OpCode::SYNC_ADD_VOL, "b", b"2".to_vec()));

    let decoded = decode_batch(&encode_batch(&batch).unwrap()).unwrap();

    assert_eq!(decoded, batch);
}

#[test]
fn test_batch_inside_command() {
    let mut batch = BTreeMap::new();
    batch.insert("x".to_string(), Command::new(OpCode::SYNC_PUT, "x", b"9".to_vec()));
    let outer = Command::new(OpCode::SYNC_BATCH_PUT, "", encode_batch(&batch).unwrap());

    let decoded = decode(&encode(&outer).unwrap()).unwrap();

    assert_eq!(decoded.kind(), OpKind::BatchPut);
    assert_eq!(decode_batch(&decoded.value).unwrap(), batch);
}

// =============================================================================
// Determinism Tests
// =============================================================================

#[test]
fn test_batch_encoding_independent_of_insert_order() {
    let a = Command::new(OpCode::SYNC_PUT, "a", b"1".to_vec());
    let b = Command::new(OpCode::SYNC_PUT, "b", b"2".to_vec());

    let mut first = BTreeMap::new();
    first.insert("a".to_string(), a.clone());
    first.insert("b".to_string(), b.clone());

    let mut second = BTreeMap::new();
    second.insert("b".to_string(), b);
    second.insert("a".to_string(), a);

    assert_eq!(encode_batch(&first).unwrap(), encode_batch(&second).unwrap());
}

#[test]
fn test_fixed_layout_prefix() {
    let bytes = encode(&Command::new(OpCode(7), "ab", b"xyz".to_vec())).unwrap();

    // op (4) + key len (8) + key + value len (8) + value
    assert_eq!(bytes.len(), 4 + 8 + 2 + 8 + 3);
    assert_eq!(&bytes[0..4], &7u32.to_le_bytes());
    assert_eq!(&bytes[4..12], &2u64.to_le_bytes());
    assert_eq!(&bytes[12..14], b"ab");
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_decode_truncated() {
    let bytes = encode(&Command::new(OpCode::SYNC_PUT, "key", b"value".to_vec())).unwrap();

    for cut in [0, 3, 10, bytes.len() - 1] {
        assert!(
            matches!(decode(&bytes[..cut]), Err(AtlasError::Decode(_))),
            "cut at {}",
            cut
        );
    }
}

#[test]
fn test_decode_trailing_bytes_rejected() {
    let mut bytes = encode(&Command::new(OpCode::SYNC_PUT, "key", b"value".to_vec())).unwrap();
    bytes.push(0);

    assert!(matches!(decode(&bytes), Err(AtlasError::Decode(_))));
}

#[test]
fn test_decode_invalid_utf8_key() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&2u64.to_le_bytes());
    bytes.extend_from_slice(&[0xFF, 0xFE]);
    bytes.extend_from_slice(&0u64.to_le_bytes());

    assert!(matches!(decode(&bytes), Err(AtlasError::Decode(_))));
}

#[test]
fn test_decode_huge_length_rejected() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&u64::MAX.to_le_bytes());

    assert!(matches!(decode(&bytes), Err(AtlasError::Decode(_))));
}

#[test]
fn test_decode_batch_garbage() {
    assert!(matches!(decode_batch(&[0xFF; 5]), Err(AtlasError::Decode(_))));
}

// =============================================================================
// Classification Tests
// =============================================================================

#[test]
fn test_op_kinds() {
    let deletes = [
        OpCode::SYNC_DELETE_DATA_NODE,
        OpCode::SYNC_DELETE_META_NODE,
        OpCode::SYNC_DELETE_VOL,
        OpCode::SYNC_DELETE_DATA_PARTITION,
        OpCode::SYNC_DELETE_META_PARTITION,
        OpCode::SYNC_DELETE_USER_INFO,
        OpCode::SYNC_DELETE_AK_USER,
        OpCode::SYNC_DELETE_VOL_USER,
        OpCode::SYNC_DELETE_QUOTA,
        OpCode::SYNC_DELETE_LC_NODE,
        OpCode::SYNC_DELETE_LC_CONF,
        OpCode::SYNC_S3_QOS_DELETE,
    ];
    for op in deletes {
        assert_eq!(op.kind(), OpKind::Delete, "{}", op);
    }

    assert_eq!(OpCode::SYNC_PUT_API_LIMITER_INFO.kind(), OpKind::LimiterSync);
    assert_eq!(OpCode::SYNC_PUT_FOLLOWER_API_LIMITER_INFO.kind(), OpKind::LimiterSync);
    assert_eq!(OpCode::SYNC_BATCH_PUT.kind(), OpKind::BatchPut);
    assert_eq!(OpCode::SYNC_PUT.kind(), OpKind::Put);
    assert_eq!(OpCode::SYNC_ADD_VOL.kind(), OpKind::Put);
}
