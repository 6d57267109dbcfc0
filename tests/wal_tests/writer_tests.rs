//! Tests for WAL Writer and Reader
//!
//! These tests verify:
//! - LSN generation and sequencing (also across reopen)
//! - Sync strategies and forced sync
//! - Truncation
//! - Reading back what was written

use std::path::PathBuf;

use atlasmeta::config::WalSyncStrategy;
use atlasmeta::wal::{Operation, WalReader, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(i: usize) -> Operation {
    Operation::Put {
        key: format!("key{}", i).into_bytes(),
        value: format!("value{}", i).into_bytes(),
    }
}

// =============================================================================
// LSN Tests
// =============================================================================

#[test]
fn test_lsn_sequential() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    for expected in 1..=5u64 {
        assert_eq!(writer.append(put(expected as usize)).unwrap(), expected);
    }
    assert_eq!(writer.current_lsn(), 6);
}

#[test]
fn test_lsn_continues_after_reopen() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put(1)).unwrap();
        writer.append(put(2)).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.append(put(3)).unwrap(), 3);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_sync_every_write() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put(1)).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_sync_every_n_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(put(1)).unwrap();
    writer.append(put(2)).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(put(3)).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_forced_sync_overrides_strategy() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();

    writer.append(put(1)).unwrap();
    assert_eq!(writer.uncommitted_count(), 1);

    writer.append_with_sync(&put(2), true).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

// =============================================================================
// Truncation Tests
// =============================================================================

#[test]
fn test_truncate_clears_file_keeps_lsn() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(put(1)).unwrap();
    writer.append(put(2)).unwrap();
    writer.truncate().unwrap();

    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);
    assert_eq!(writer.append(put(3)).unwrap(), 3);

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

// =============================================================================
// Read Back Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    std::fs::File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_write_then_read_mixed_operations() {
    let (_temp, wal_path) = setup_temp_wal();
    let ops = vec![
        put(1),
        Operation::Delete { key: b"key1".to_vec() },
        Operation::Batch {
            deletes: vec![b"x".to_vec()],
            puts: vec![(b"y".to_vec(), b"z".to_vec())],
        },
    ];

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        for op in &ops {
            writer.append(op.clone()).unwrap();
        }
    }

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 3);
    for (i, (entry, op)) in entries.iter().zip(&ops).enumerate() {
        assert_eq!(entry.lsn, i as u64 + 1);
        assert_eq!(&entry.operation, op);
    }
}

#[test]
fn test_reader_reports_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put(1)).unwrap();
        writer.append(put(2)).unwrap();
    }
    let len = std::fs::metadata(&wal_path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.set_len(len - 4).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().is_err());
}
