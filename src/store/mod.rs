//! Store Module
//!
//! The persistent key-value store the state machine writes into.
//!
//! ## Contract
//! - `batch_put` / `delete_key_and_batch` are atomic: readers and crash
//!   recovery see all of a batch or none of it
//! - `snapshot` + `iterator` give an ordered, point-in-time view that later
//!   writes do not disturb
//! - A store is rooted at one directory and can be closed and reopened;
//!   `open_sibling` builds an independent instance at another directory
//!
//! `DiskStore` is the implementation backed by the WAL/MemTable/SSTable
//! engine.

mod disk;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use disk::{DiskStore, StoreIterator};

/// Suffix of the directory a replacement store is built in
pub const RECOVERY_SUFFIX: &str = "_recovery";

/// Suffix of the directory a replaced store waits in before deletion
pub const REMOVING_SUFFIX: &str = "_removing";

/// Key → value pairs committed together
pub type WriteSet = BTreeMap<String, Vec<u8>>;

/// Ordered iterator over a store snapshot
pub trait KvIterator: Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> + Send {
    /// Restart from the smallest key
    fn seek_to_first(&mut self);
}

/// Persistent key-value store
pub trait KvStore: Sized + Send {
    /// Point-in-time handle
    type Snapshot: Clone + Send;

    type Iter: KvIterator;

    /// A fresh, independent store rooted at `dir` (created if missing)
    fn open_sibling(&self, dir: &Path) -> Result<Self>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns the previous value, if any
    fn put(&self, key: &str, value: &[u8], sync: bool) -> Result<Option<Vec<u8>>>;

    fn batch_put(&self, set: &WriteSet, sync: bool) -> Result<()>;

    /// Delete `key` and write the rest of `set` in one atomic batch
    fn delete_key_and_batch(&self, key: &str, set: &WriteSet, sync: bool) -> Result<()>;

    fn snapshot(&self) -> Result<Self::Snapshot>;

    /// Iterator positioned at the first key of `snapshot`
    fn iterator(&self, snapshot: &Self::Snapshot) -> Self::Iter;

    /// Make everything written so far durable
    fn flush(&self) -> Result<()>;

    /// Reopen at `dir()`; the directory must already exist
    fn open(&mut self) -> Result<()>;

    /// Flush and release the directory. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Root directory of this store
    fn dir(&self) -> &Path;

    /// Where a replacement store is built during snapshot install
    fn recovery_dir(&self) -> PathBuf {
        sibling_dir(self.dir(), RECOVERY_SUFFIX)
    }

    /// Where the replaced store is moved before it is deleted
    fn removing_dir(&self) -> PathBuf {
        sibling_dir(self.dir(), REMOVING_SUFFIX)
    }
}

/// `/a/b/meta` + `_recovery` → `/a/b/meta_recovery`
///
/// Stays in the same parent so renames never cross filesystems.
pub fn sibling_dir(dir: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    dir.with_file_name(name)
}
