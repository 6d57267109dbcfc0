//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::sync::Arc;

use crate::error::Result;

use super::reader::SSTableReader;

/// Iterator over SSTable entries in sorted key order
///
/// Owns a handle on the reader, so it outlives the `StorageManager` that
/// produced it.
pub struct SSTableIterator {
    reader: Arc<SSTableReader>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    current_offset: u64,
    failed: bool,
}

impl SSTableIterator {
    pub(super) fn new(reader: Arc<SSTableReader>, start_offset: u64, end_offset: u64) -> Self {
        Self {
            reader,
            end_offset,
            current_offset: start_offset,
            failed: false,
        }
    }
}

impl Iterator for SSTableIterator {
    /// (key, Option<value>); a `None` value is a tombstone
    type Item = Result<(Vec<u8>, Option<Vec<u8>>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        match self.reader.read_entry_at(self.current_offset) {
            Ok((key, value, size)) => {
                self.current_offset += size;
                Some(Ok((key, value)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
