//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::WalSyncStrategy;
use crate::error::{AtlasError, Result};

use super::entry::{encode_frame, now_millis};
use super::{Operation, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    writer: BufWriter<File>,
    /// LSN assigned to the next appended entry
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    uncommitted: usize,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// LSNs continue after the last valid entry already in the file.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            WalRecovery::verify(path)?.last_lsn
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            next_lsn: last_lsn + 1,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append an operation, syncing according to the strategy
    ///
    /// Returns the LSN assigned to the entry.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        self.append_with_sync(&operation, false)
    }

    /// Append an operation; `force_sync` fsyncs regardless of the strategy
    pub fn append_with_sync(&mut self, operation: &Operation, force_sync: bool) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = encode_frame(lsn, operation, now_millis())?;

        self.writer
            .write_all(&frame)
            .and_then(|_| self.writer.flush())
            .map_err(|e| AtlasError::WalWrite(format!("append lsn {}: {}", lsn, e)))?;

        self.next_lsn += 1;
        self.uncommitted += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };
        if force_sync || due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard all entries (their effects are durable elsewhere)
    ///
    /// LSNs keep increasing across truncations.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_ref();
        file.set_len(0)?;
        file.sync_all()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries appended since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }
}
