//! Storage Manager
//!
//! The SSTable set under `<data_dir>/sstables/`. Files are numbered; a
//! higher number is newer. A reopened store (after close, or after a
//! snapshot install swapped its directory) rebuilds the set from the file
//! names alone.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AtlasError, Result};
use crate::memtable::{MemTable, MemTableEntry};

use super::sstable::TMP_SUFFIX;
use super::{EntrySource, MergeIterator, SSTable, SSTableBuilder, SSTableReader};

/// Numbered SSTables of one store directory
///
/// Lookups only take the read lock; readers synchronize their own file
/// handles.
pub struct StorageManager {
    data_dir: PathBuf,

    /// Newest first
    sstables: RwLock<Vec<Arc<SSTableReader>>>,

    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open every `sstable_*.sst` under `path`, creating the directory if
    /// needed. Leftover `.tmp` files from an interrupted flush are removed;
    /// their entries are still in the WAL.
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() && Self::is_tmp(&file_path) {
                tracing::warn!(path = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
            }
        }

        let sstables = Self::load(path)?;
        let next_id = sstables
            .iter()
            .filter_map(|r| Self::parse_sstable_id(r.path()))
            .max()
            .map_or(1, |id| id + 1);

        tracing::debug!(
            dir = %path.display(),
            sstables = sstables.len(),
            "storage opened"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Readers for every finished SSTable under `path`, newest first
    ///
    /// Touches nothing on disk; a missing directory yields no readers.
    pub fn load(path: &Path) -> Result<Vec<Arc<SSTableReader>>> {
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = Self::parse_sstable_id(&file_path) {
                    sstable_ids.push(id);
                }
            }
        }

        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let reader = SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?;
            sstables.push(Arc::new(reader));
        }
        Ok(sstables)
    }

    /// Newest SSTable holding `key` decides; a tombstone reads as `None`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let sstables = self.sstables.read();

        for reader in sstables.iter() {
            if !reader.might_contain(key) {
                continue;
            }

            match reader.get(key) {
                Ok(value) => return Ok(value),
                Err(AtlasError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Write `memtable` out as the newest SSTable
    ///
    /// The file and the directory entry are both fsynced before the reader
    /// is published, so a batch acknowledged by a flush survives power loss.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(AtlasError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, Arc::new(reader));

        tracing::debug!(
            path = %metadata.path.display(),
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "memtable flushed"
        );

        Ok(metadata)
    }

    /// Merge every SSTable into one and delete the inputs
    ///
    /// A full merge has nothing older underneath it, so tombstones are
    /// dropped. The caller must keep flushes out while this runs (the engine
    /// holds its write lock).
    ///
    /// Crash safety: the merged file is published before any input is
    /// removed, and inputs are removed oldest first. Whatever subset survives
    /// a crash is the newest inputs plus the merged file, which reads the
    /// same as the merged file alone.
    pub fn compact(&self) -> Result<Option<SSTable>> {
        let inputs = self.readers();
        if inputs.len() < 2 {
            return Ok(None);
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let sources: Vec<EntrySource> = inputs
            .iter()
            .map(|reader| Box::new(reader.iter()) as EntrySource)
            .collect();

        let mut builder = SSTableBuilder::new(&path)?;
        for entry in MergeIterator::new(sources) {
            let (key, value) = entry?;
            builder.add(&key, &value)?;
        }
        let metadata = builder.finish()?;
        let merged = Arc::new(SSTableReader::open(&path)?);

        {
            let mut sstables = self.sstables.write();
            sstables.retain(|t| !inputs.iter().any(|input| Arc::ptr_eq(input, t)));
            sstables.push(merged);
        }

        for input in inputs.iter().rev() {
            if let Err(e) = fs::remove_file(input.path()) {
                tracing::warn!(path = %input.path().display(), error = %e, "failed to remove compacted SSTable");
            }
        }
        File::open(&self.data_dir)?.sync_all()?;

        tracing::info!(
            inputs = inputs.len(),
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "sstables compacted"
        );

        Ok(Some(metadata))
    }

    /// Shared handles on every SSTable, newest first
    pub fn readers(&self) -> Vec<Arc<SSTableReader>> {
        self.sstables.read().clone()
    }

    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    fn is_tmp(path: &Path) -> bool {
        path.to_string_lossy().ends_with(TMP_SUFFIX)
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
