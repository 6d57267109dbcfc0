//! Disk Store
//!
//! `KvStore` over the storage engine.

use std::path::Path;

use crate::config::Config;
use crate::engine::{Engine, EngineSnapshot, WriteBatch};
use crate::error::{AtlasError, Result};
use crate::storage::MergeIterator;

use super::{sibling_dir, KvIterator, KvStore, WriteSet, REMOVING_SUFFIX};

/// Engine-backed store rooted at `config.data_dir`
///
/// While closed the engine is dropped and every data operation fails with
/// `StoreClosed`.
pub struct DiskStore {
    config: Config,
    engine: Option<Engine>,
}

impl DiskStore {
    /// Open the store, creating its directory if needed
    ///
    /// Refuses to create the directory while `{dir}_removing` exists: that
    /// is a snapshot swap cut short, and an empty store at `{dir}` would hide
    /// both real ones. `DirSwap::recover` repairs it.
    pub fn create(config: Config) -> Result<Self> {
        let removing = sibling_dir(&config.data_dir, REMOVING_SUFFIX);
        if !config.data_dir.exists() && removing.exists() {
            return Err(AtlasError::Storage(format!(
                "{} is missing but {} exists; interrupted snapshot swap",
                config.data_dir.display(),
                removing.display()
            )));
        }

        let engine = Engine::open(config.clone())?;
        tracing::debug!(dir = %config.data_dir.display(), "store opened");
        Ok(Self {
            config,
            engine: Some(engine),
        })
    }

    /// Open with default config at `path`
    pub fn create_path(path: &Path) -> Result<Self> {
        Self::create(Config::builder().data_dir(path).build())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying engine (for stats and debugging)
    pub fn engine(&self) -> Result<&Engine> {
        self.engine
            .as_ref()
            .ok_or_else(|| AtlasError::StoreClosed(self.config.data_dir.display().to_string()))
    }
}

impl KvStore for DiskStore {
    type Snapshot = EngineSnapshot;
    type Iter = StoreIterator;

    fn open_sibling(&self, dir: &Path) -> Result<Self> {
        let mut config = self.config.clone();
        config.data_dir = dir.to_path_buf();
        Self::create(config)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.engine()?.get(key.as_bytes())
    }

    fn put(&self, key: &str, value: &[u8], sync: bool) -> Result<Option<Vec<u8>>> {
        let engine = self.engine()?;
        let previous = engine.get(key.as_bytes())?;

        let mut batch = WriteBatch::new();
        batch.put(key.as_bytes(), value);
        engine.write(batch, sync)?;

        Ok(previous)
    }

    fn batch_put(&self, set: &WriteSet, sync: bool) -> Result<()> {
        let mut batch = WriteBatch::new();
        for (key, value) in set {
            batch.put(key.as_bytes(), value.as_slice());
        }
        self.engine()?.write(batch, sync)
    }

    fn delete_key_and_batch(&self, key: &str, set: &WriteSet, sync: bool) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key.as_bytes());
        for (k, value) in set.iter().filter(|(k, _)| k.as_str() != key) {
            batch.put(k.as_bytes(), value.as_slice());
        }
        self.engine()?.write(batch, sync)
    }

    fn snapshot(&self) -> Result<EngineSnapshot> {
        Ok(self.engine()?.snapshot())
    }

    fn iterator(&self, snapshot: &EngineSnapshot) -> StoreIterator {
        StoreIterator::new(snapshot.clone())
    }

    fn flush(&self) -> Result<()> {
        self.engine()?.flush()
    }

    fn open(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }
        if !self.config.data_dir.is_dir() {
            return Err(AtlasError::Storage(format!(
                "store directory {} does not exist",
                self.config.data_dir.display()
            )));
        }
        self.engine = Some(Engine::open(self.config.clone())?);
        tracing::debug!(dir = %self.config.data_dir.display(), "store reopened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(engine) => engine.close(),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    fn dir(&self) -> &Path {
        &self.config.data_dir
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Ordered iterator over an `EngineSnapshot`
pub struct StoreIterator {
    snapshot: EngineSnapshot,
    inner: MergeIterator,
}

impl StoreIterator {
    fn new(snapshot: EngineSnapshot) -> Self {
        let inner = snapshot.iter();
        Self { snapshot, inner }
    }
}

impl Iterator for StoreIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl KvIterator for StoreIterator {
    fn seek_to_first(&mut self) {
        self.inner = self.snapshot.iter();
    }
}
