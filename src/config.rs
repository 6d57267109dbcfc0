//! Configuration for AtlasMeta
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{AtlasError, Result};

/// Main configuration for a metadata state machine and its store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Canonical store directory
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    ///
    /// Snapshot install also uses two siblings of this directory:
    /// `{data_dir}_recovery` and `{data_dir}_removing`.
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    /// SSTable count at which a flush merges them all into one
    pub compaction_threshold: usize,

    // -------------------------------------------------------------------------
    // Replication Configuration
    // -------------------------------------------------------------------------
    /// Ask the consensus engine to truncate its log every `retain_logs`
    /// applied entries
    pub retain_logs: u64,

    /// Consensus group this state machine belongs to
    pub group_id: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./atlasmeta_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            compaction_threshold: 8,
            retain_logs: 20_000,
            group_id: 1,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the state machine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retain_logs == 0 {
            return Err(AtlasError::Config(
                "retain_logs must be greater than zero".to_string(),
            ));
        }
        if self.memtable_size_limit == 0 {
            return Err(AtlasError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if self.compaction_threshold < 2 {
            return Err(AtlasError::Config(
                "compaction_threshold must be at least 2".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(AtlasError::Config(
                "wal sync count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    pub fn compaction_threshold(mut self, count: usize) -> Self {
        self.config.compaction_threshold = count;
        self
    }

    /// Set the log truncation period
    pub fn retain_logs(mut self, count: u64) -> Self {
        self.config.retain_logs = count;
        self
    }

    /// Set the consensus group id
    pub fn group_id(mut self, id: u64) -> Self {
        self.config.group_id = id;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
