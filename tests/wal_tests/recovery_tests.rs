//! Tests for WAL Recovery
//!
//! These tests verify:
//! - Recovery from clean and empty logs
//! - Torn tails are cut at the last complete frame
//! - A corrupted frame ends the scan
//! - Verify mode leaves the file alone

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use atlasmeta::config::WalSyncStrategy;
use atlasmeta::wal::{Operation, WalEntry, WalRecovery, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn write_entries(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(Operation::Put {
                key: format!("key{}", i).into_bytes(),
                value: format!("value{}", i).into_bytes(),
            })
            .unwrap();
    }
}

fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}

// =============================================================================
// Clean Log Tests
// =============================================================================

#[test]
fn test_recover_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert!(entries.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_clean_log() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 10);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert!(!result.was_truncated);
}

// =============================================================================
// Torn Tail Tests
// =============================================================================

#[test]
fn test_partial_header_is_cut() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 3);
    let clean_len = file_len(&wal_path);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0xAA; HEADER_SIZE / 2]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 3);
    assert!(result.was_truncated);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(file_len(&wal_path), clean_len);
}

#[test]
fn test_partial_payload_is_cut() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 2);
    let clean_len = file_len(&wal_path);

    let frame = WalEntry::new(
        3,
        Operation::Batch {
            deletes: vec![],
            puts: vec![(b"k".to_vec(), vec![1u8; 64])],
        },
    )
    .serialize()
    .unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&frame[..frame.len() - 10]).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert_eq!(file_len(&wal_path), clean_len);

    // A second pass finds nothing left to repair
    let (_, again) = WalRecovery::recover(&wal_path).unwrap();
    assert!(!again.was_truncated);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_corrupted_middle_frame_stops_scan() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 3);

    let first_len = WalEntry::new(
        1,
        Operation::Put {
            key: b"key0".to_vec(),
            value: b"value0".to_vec(),
        },
    )
    .serialized_size()
    .unwrap();

    // Flip a payload byte of the second frame
    let mut bytes = fs::read(&wal_path).unwrap();
    bytes[first_len + HEADER_SIZE + 2] ^= 0xFF;
    fs::write(&wal_path, &bytes).unwrap();

    let (entries, result) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(file_len(&wal_path), first_len as u64);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_does_not_modify() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 4);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0x01, 0x02, 0x03]).unwrap();
    drop(file);
    let len_before = file_len(&wal_path);

    let result = WalRecovery::verify(&wal_path).unwrap();

    assert_eq!(result.entries_recovered, 4);
    assert!(result.was_truncated);
    assert_eq!(file_len(&wal_path), len_before);
}

#[test]
fn test_recover_and_verify_agree() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 6);

    let verified = WalRecovery::verify(&wal_path).unwrap();
    let (_, recovered) = WalRecovery::recover(&wal_path).unwrap();

    assert_eq!(verified, recovered);
}
