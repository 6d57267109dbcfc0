//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::reader::{Frame, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted frame
    /// 3. Truncate the file after the last valid frame
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_len) = Self::scan(path, true)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            tracing::warn!(
                path = %path.display(),
                valid_len,
                corrupted = result.entries_corrupted,
                "WAL tail discarded during recovery"
            );
        }

        Ok((entries, result))
    }

    /// Valid entries of a WAL file, leaving a torn tail in place
    pub fn read(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, _) = Self::scan(path, true)?;
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path, false)?;
        Ok(result)
    }

    /// Shared scan used by both `recover` and `verify`
    ///
    /// A corrupted frame poisons everything after it: its length field can
    /// no longer be trusted, so scanning stops there.
    fn scan(path: &Path, keep_entries: bool) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult {
            entries_recovered: 0,
            entries_corrupted: 0,
            last_lsn: 0,
            was_truncated: false,
        };

        loop {
            match reader.read_frame()? {
                Frame::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    if keep_entries {
                        entries.push(entry);
                    }
                }
                Frame::End => break,
                Frame::Partial => {
                    result.was_truncated = true;
                    break;
                }
                Frame::Corrupted => {
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
            }
        }

        Ok((entries, result, reader.position()))
    }
}
