//! Tests for WAL Entry
//!
//! These tests verify:
//! - Frame layout (LSN, CRC, length header)
//! - Round trip of every operation kind
//! - CRC and truncation detection

use atlasmeta::wal::{Operation, WalEntry, HEADER_SIZE};
use atlasmeta::AtlasError;

fn batch_op() -> Operation {
    Operation::Batch {
        deletes: vec![b"gone".to_vec()],
        puts: vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"applied".to_vec(), b"42".to_vec()),
        ],
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_put_round_trip() {
    let entry = WalEntry::new(
        7,
        Operation::Put {
            key: b"#vol#a".to_vec(),
            value: b"payload".to_vec(),
        },
    );

    let bytes = entry.serialize().unwrap();
    let decoded = WalEntry::deserialize(&bytes).unwrap();

    assert_eq!(decoded, entry);
}

#[test]
fn test_batch_round_trip() {
    let entry = WalEntry::new(3, batch_op());

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded.operation, batch_op());
    assert_eq!(decoded.lsn, 3);
}

#[test]
fn test_empty_batch_round_trip() {
    let entry = WalEntry::new(
        1,
        Operation::Batch {
            deletes: vec![],
            puts: vec![],
        },
    );

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();
    assert_eq!(decoded, entry);
}

// =============================================================================
// Frame Layout Tests
// =============================================================================

#[test]
fn test_header_fields() {
    let entry = WalEntry::new(0x0102_0304_0506_0708, batch_op());
    let bytes = entry.serialize().unwrap();

    assert_eq!(bytes.len(), entry.serialized_size().unwrap());

    let lsn = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;

    assert_eq!(lsn, entry.lsn);
    assert_eq!(crc, entry.compute_crc().unwrap());
    assert_eq!(len, bytes.len() - HEADER_SIZE);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_payload_bit_flip_detected() {
    let entry = WalEntry::new(1, batch_op());
    let mut bytes = entry.serialize().unwrap();

    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    match WalEntry::deserialize(&bytes) {
        Err(AtlasError::WalCorruption(msg)) => assert!(msg.contains("CRC")),
        other => panic!("expected CRC failure, got {:?}", other),
    }
}

#[test]
fn test_stored_crc_tampered() {
    let entry = WalEntry::new(1, Operation::Delete { key: b"k".to_vec() });
    let mut bytes = entry.serialize().unwrap();

    bytes[8] ^= 0xFF;

    assert!(matches!(
        WalEntry::deserialize(&bytes),
        Err(AtlasError::WalCorruption(_))
    ));
}

#[test]
fn test_truncated_payload() {
    let entry = WalEntry::new(1, batch_op());
    let bytes = entry.serialize().unwrap();

    let result = WalEntry::deserialize(&bytes[..bytes.len() - 3]);
    assert!(matches!(result, Err(AtlasError::WalCorruption(_))));
}

#[test]
fn test_short_header() {
    assert!(matches!(
        WalEntry::deserialize(&[0u8; HEADER_SIZE - 1]),
        Err(AtlasError::WalCorruption(_))
    ));
    assert!(WalEntry::deserialize(&[]).is_err());
}

#[test]
fn test_large_value() {
    let value = vec![0xABu8; 2 * 1024 * 1024];
    let entry = WalEntry::new(
        9,
        Operation::Put {
            key: b"big".to_vec(),
            value: value.clone(),
        },
    );

    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    match decoded.operation {
        Operation::Put { value: v, .. } => assert_eq!(v, value),
        other => panic!("unexpected operation {:?}", other),
    }
}
