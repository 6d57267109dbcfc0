//! MemTable implementation
//!
//! Copy-on-write BTreeMap behind a RwLock.
//!
//! Readers that want a stable view call [`MemTable::snapshot`] and get an
//! `Arc` of the current map. The next write clones the map only if such a
//! snapshot is still alive (`Arc::make_mut`).

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::MemTableEntry;

type Map = BTreeMap<Vec<u8>, MemTableEntry>;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<Arc<Map>>,
    /// Approximate size in bytes (keys + live values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Arc::new(BTreeMap::new())),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    ///
    /// `Some(Tombstone)` means the key was deleted here and older layers
    /// must not be consulted.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair; returns the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.apply_batch(Vec::new(), vec![(key, value)])
    }

    /// Delete a key (inserts tombstone); returns the new approximate size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.apply_batch(vec![key], Vec::new())
    }

    /// Apply deletes then puts under a single write lock
    ///
    /// Readers observe either none or all of the batch.
    pub fn apply_batch(&self, deletes: Vec<Vec<u8>>, puts: Vec<(Vec<u8>, Vec<u8>)>) -> usize {
        let mut guard = self.data.write();
        let map = Arc::make_mut(&mut guard);

        for key in deletes {
            self.insert(map, key, MemTableEntry::Tombstone);
        }
        for (key, value) in puts {
            self.insert(map, key, MemTableEntry::Value(value));
        }

        self.size.load(Ordering::SeqCst)
    }

    fn insert(&self, map: &mut Map, key: Vec<u8>, entry: MemTableEntry) {
        let key_len = key.len();
        let value_len = entry.value_len();
        match map.insert(key, entry) {
            Some(old) => {
                // Key bytes were already counted
                self.size.fetch_sub(old.value_len(), Ordering::SeqCst);
                self.size.fetch_add(value_len, Ordering::SeqCst);
            }
            None => {
                self.size.fetch_add(key_len + value_len, Ordering::SeqCst);
            }
        }
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Stable view of the current contents
    pub fn snapshot(&self) -> Arc<BTreeMap<Vec<u8>, MemTableEntry>> {
        Arc::clone(&self.data.read())
    }

    /// Iterate over all entries in sorted key order
    ///
    /// Iterates a snapshot, so concurrent writes are not observed.
    pub fn iter(&self) -> MemTableIterator {
        MemTableIterator::new(self.snapshot())
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut guard = self.data.write();
        *guard = Arc::new(BTreeMap::new());
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Owning iterator over a MemTable snapshot
///
/// Walks the map with a key cursor so it can hold the `Arc` instead of a
/// borrow.
pub struct MemTableIterator {
    map: Arc<Map>,
    cursor: Option<Vec<u8>>,
}

impl MemTableIterator {
    pub(crate) fn new(map: Arc<Map>) -> Self {
        Self { map, cursor: None }
    }
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let lower = match &self.cursor {
            Some(key) => Bound::Excluded(key.as_slice()),
            None => Bound::Unbounded,
        };
        let (key, entry) = self
            .map
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))?;

        self.cursor = Some(key.clone());
        Some((key, entry))
    }
}
