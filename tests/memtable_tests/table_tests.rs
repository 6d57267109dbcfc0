//! Tests for MemTable
//!
//! These tests verify:
//! - Put/get/delete semantics with tombstones
//! - Atomic batches
//! - Size accounting
//! - Snapshot isolation (copy-on-write)
//! - Concurrent access

use std::sync::Arc;
use std::thread;

use atlasmeta::memtable::{MemTable, MemTableEntry};

fn value(v: &[u8]) -> Option<MemTableEntry> {
    Some(MemTableEntry::Value(v.to_vec()))
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
    assert_eq!(memtable.entry_count(), 0);
}

#[test]
fn test_put_get_overwrite() {
    let memtable = MemTable::new();

    memtable.put(b"k".to_vec(), b"v1".to_vec());
    assert_eq!(memtable.get(b"k"), value(b"v1"));

    memtable.put(b"k".to_vec(), b"v2".to_vec());
    assert_eq!(memtable.get(b"k"), value(b"v2"));
    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.get(b"missing"), None);
}

#[test]
fn test_delete_leaves_tombstone() {
    let memtable = MemTable::new();
    memtable.put(b"k".to_vec(), b"v".to_vec());

    memtable.delete(b"k".to_vec());
    memtable.delete(b"never-written".to_vec());

    assert_eq!(memtable.get(b"k"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.get(b"never-written"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.entry_count(), 2);
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_batch_deletes_before_puts() {
    let memtable = MemTable::new();
    memtable.put(b"a".to_vec(), b"old".to_vec());

    memtable.apply_batch(
        vec![b"a".to_vec(), b"b".to_vec()],
        vec![(b"a".to_vec(), b"new".to_vec()), (b"c".to_vec(), b"3".to_vec())],
    );

    assert_eq!(memtable.get(b"a"), value(b"new"));
    assert_eq!(memtable.get(b"b"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.get(b"c"), value(b"3"));
}

// =============================================================================
// Size Accounting
// =============================================================================

#[test]
fn test_size_tracking() {
    let memtable = MemTable::new();

    let size = memtable.put(b"key".to_vec(), b"value".to_vec());
    assert_eq!(size, 8);

    // Overwrite only changes the value part
    let size = memtable.put(b"key".to_vec(), b"v".to_vec());
    assert_eq!(size, 4);

    // Tombstone carries no value bytes
    let size = memtable.delete(b"key".to_vec());
    assert_eq!(size, 3);

    assert!(memtable.should_flush(3));
    assert!(!memtable.should_flush(4));
}

#[test]
fn test_clear_resets_everything() {
    let memtable = MemTable::new();
    for i in 0..10 {
        memtable.put(format!("k{}", i).into_bytes(), vec![0u8; 10]);
    }

    memtable.clear();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
}

// =============================================================================
// Iteration and Snapshots
// =============================================================================

#[test]
fn test_iter_sorted_with_tombstones() {
    let memtable = MemTable::new();
    memtable.put(b"c".to_vec(), b"3".to_vec());
    memtable.put(b"a".to_vec(), b"1".to_vec());
    memtable.delete(b"b".to_vec());

    let items: Vec<_> = memtable.iter().collect();

    assert_eq!(
        items,
        vec![
            (b"a".to_vec(), MemTableEntry::Value(b"1".to_vec())),
            (b"b".to_vec(), MemTableEntry::Tombstone),
            (b"c".to_vec(), MemTableEntry::Value(b"3".to_vec())),
        ]
    );
}

#[test]
fn test_snapshot_unaffected_by_later_writes() {
    let memtable = MemTable::new();
    memtable.put(b"x".to_vec(), b"1".to_vec());

    let snapshot = memtable.snapshot();
    let mut iter = memtable.iter();

    memtable.put(b"x".to_vec(), b"2".to_vec());
    memtable.put(b"y".to_vec(), b"3".to_vec());
    memtable.clear();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get(b"x".as_slice()), Some(&MemTableEntry::Value(b"1".to_vec())));
    assert_eq!(iter.next().map(|(k, _)| k), Some(b"x".to_vec()));
    assert!(iter.next().is_none());
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let memtable = Arc::new(MemTable::new());
    let mut handles = Vec::new();

    for t in 0..4 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                memtable.put(format!("t{}_{:03}", t, i).into_bytes(), vec![t as u8]);
            }
        }));
    }
    for _ in 0..2 {
        let memtable = Arc::clone(&memtable);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let count = memtable.iter().count();
                assert!(count <= 400);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 400);
}
