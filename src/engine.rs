//! Engine Module
//!
//! The storage engine behind a store directory: WAL, MemTable and SSTables.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Commit write batches atomically (one WAL frame, one memtable section)
//! - Hand out point-in-time snapshots
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry, MemTableIterator};
use crate::storage::{EntrySource, MergeIterator, SSTableReader, StorageManager};
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/write/flush): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Must acquire: write_lock → WAL → memtable → storage (write)
///
/// - **Reads** (get): Concurrent
///   - No write_lock needed
///   - MemTable and StorageManager both take read locks only
///
/// - **Snapshots**: taken under `write_lock` so the memtable view and the
///   SSTable list describe the same instant
pub struct Engine {
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    wal: Mutex<WalWriter>,

    memtable: MemTable,

    storage: StorageManager,

    /// Serializes write operations (put/delete/write/flush/snapshot)
    write_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL, flush what it held, then truncate it
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery_result) = WalRecovery::recover(&wal_path)?;

            if recovery_result.entries_recovered > 0 || recovery_result.entries_corrupted > 0 {
                tracing::info!(
                    dir = %config.data_dir.display(),
                    recovered = recovery_result.entries_recovered,
                    corrupted = recovery_result.entries_corrupted,
                    last_lsn = recovery_result.last_lsn,
                    "WAL recovery"
                );
            }

            for entry in entries {
                Self::apply_to_memtable(&memtable, entry.operation);
            }

            // Recovered data goes to an SSTable before the WAL is cut
            if !memtable.is_empty() {
                tracing::info!(
                    entries = memtable.entry_count(),
                    "flushing recovered entries to SSTable"
                );
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.into_value());
        }
        self.storage.get(key)
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.commit(
            Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            },
            false,
        )
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.commit(Operation::Delete { key: key.to_vec() }, false)
    }

    /// Commit a batch atomically
    ///
    /// `sync` forces the WAL to disk before returning, regardless of the
    /// configured sync strategy.
    pub fn write(&self, batch: WriteBatch, sync: bool) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.commit(
            Operation::Batch {
                deletes: batch.deletes,
                puts: batch.puts,
            },
            sync,
        )
    }

    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write to WAL (durability)
    /// 3. Write to MemTable
    /// 4. Check if flush needed
    fn commit(&self, operation: Operation, sync: bool) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append_with_sync(&operation, sync)?;

        let new_size = Self::apply_to_memtable(&self.memtable, operation);

        if new_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }

        Ok(())
    }

    fn apply_to_memtable(memtable: &MemTable, operation: Operation) -> usize {
        match operation {
            Operation::Put { key, value } => memtable.put(key, value),
            Operation::Delete { key } => memtable.delete(key),
            Operation::Batch { deletes, puts } => memtable.apply_batch(deletes, puts),
        }
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        if self.storage.sstable_count() >= self.config.compaction_threshold {
            // Everything is already durable; a failed merge only costs read speed
            if let Err(e) = self.storage.compact() {
                tracing::error!(dir = %self.storage_dir.display(), error = %e, "compaction failed");
            }
        }

        Ok(())
    }

    /// Point-in-time view of the whole engine
    ///
    /// Later writes, flushes, or closing the engine do not change what the
    /// snapshot sees.
    pub fn snapshot(&self) -> EngineSnapshot {
        let _write_guard = self.write_lock.lock();
        EngineSnapshot {
            memtable: self.memtable.snapshot(),
            sstables: self.storage.readers(),
        }
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        tracing::debug!(dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

// =============================================================================
// Write Batch
// =============================================================================

/// Mutations committed together by [`Engine::write`]
///
/// Deletes are applied before puts, so a key both deleted and put in the
/// same batch ends up with the put value.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    deletes: Vec<Vec<u8>>,
    puts: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.puts.push((key.into(), value.into()));
        self
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.deletes.push(key.into());
        self
    }

    pub fn len(&self) -> usize {
        self.deletes.len() + self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.puts.is_empty()
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Frozen view of an engine: a memtable image plus the SSTables that
/// existed when it was taken
#[derive(Clone)]
pub struct EngineSnapshot {
    memtable: Arc<BTreeMap<Vec<u8>, MemTableEntry>>,
    /// Newest first
    sstables: Vec<Arc<SSTableReader>>,
}

impl EngineSnapshot {
    /// View of the store at `data_dir` without opening it
    ///
    /// Loads the finished SSTables and replays the WAL into a private
    /// memtable. Nothing on disk is created, flushed or truncated, so this is
    /// safe on a directory another process may later recover.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let sstables = StorageManager::load(&data_dir.join(Engine::SSTABLE_DIR))?;

        let memtable = MemTable::new();
        let wal_path = data_dir.join(Engine::WAL_FILENAME);
        if wal_path.exists() {
            let (entries, _) = WalRecovery::read(&wal_path)?;
            for entry in entries {
                Engine::apply_to_memtable(&memtable, entry.operation);
            }
        }

        Ok(Self {
            memtable: memtable.snapshot(),
            sstables,
        })
    }

    /// Point lookup against the frozen view
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.clone().into_value());
        }
        for reader in &self.sstables {
            if !reader.might_contain(key) {
                continue;
            }
            match reader.get(key) {
                Ok(value) => return Ok(value),
                Err(crate::AtlasError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Ordered iterator over live keys, starting at the smallest
    pub fn iter(&self) -> MergeIterator {
        let mut sources: Vec<EntrySource> = Vec::with_capacity(self.sstables.len() + 1);

        let memtable = MemTableIterator::new(Arc::clone(&self.memtable))
            .map(|(key, entry)| Ok((key, entry.into_value())));
        sources.push(Box::new(memtable));

        for reader in &self.sstables {
            sources.push(Box::new(reader.iter()));
        }

        MergeIterator::new(sources)
    }
}
