//! Storage Module
//!
//! Persistent storage layer using SSTable-like format.
//!
//! ## Responsibilities
//! - Persist data to disk in sorted format
//! - Point lookups newest → oldest
//! - Ordered merged scans over memtable + SSTables (snapshot export)
//!
//! SSTables are immutable once written. Readers are reference counted, so a
//! store snapshot can keep reading files after the store itself has been
//! closed or its directory renamed away.

mod sstable;
mod manager;
mod merge;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;
pub use merge::{EntrySource, MergeIterator};
