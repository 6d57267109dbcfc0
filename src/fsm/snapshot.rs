//! Snapshot export

use crate::error::{AtlasError, Result};
use crate::protocol::{self, Command, OpCode};
use crate::raft::SnapshotIterator;
use crate::store::{KvIterator, KvStore};

use super::MetadataFsm;

/// Point-in-time export of the whole store
///
/// Yields every `(key, value)` in key order as an encoded `SYNC_PUT`
/// command, so the stream can be fed straight into `apply_snapshot` on
/// another replica. Writes made after creation are not visible.
pub struct MetadataSnapshot<I> {
    applied: u64,
    iter: I,
}

impl<I: KvIterator> MetadataSnapshot<I> {
    pub(crate) fn new(applied: u64, iter: I) -> Self {
        Self { applied, iter }
    }

    /// Applied index when the snapshot was taken
    pub fn applied_index(&self) -> u64 {
        self.applied
    }
}

impl<I: KvIterator> SnapshotIterator for MetadataSnapshot<I> {
    fn next_record(&mut self) -> Result<Option<Vec<u8>>> {
        let (key, value) = match self.iter.next() {
            None => return Ok(None),
            Some(entry) => entry?,
        };

        let key = String::from_utf8(key)
            .map_err(|e| AtlasError::Snapshot(format!("store key is not UTF-8: {}", e)))?;

        protocol::encode(&Command::new(OpCode::SYNC_PUT, key, value)).map(Some)
    }
}

impl<S: KvStore> MetadataFsm<S> {
    /// Snapshot the store for a lagging follower
    pub fn create_snapshot(&self) -> Result<MetadataSnapshot<S::Iter>> {
        let snapshot = self.store.snapshot()?;
        let mut iter = self.store.iterator(&snapshot);
        iter.seek_to_first();

        tracing::debug!(applied = self.applied, "snapshot created");
        Ok(MetadataSnapshot::new(self.applied, iter))
    }
}
