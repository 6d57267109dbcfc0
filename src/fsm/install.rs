//! Snapshot install
//!
//! Replaces the live store with one rebuilt from a remote stream.
//!
//! ## Protocol
//! ```text
//! Preparing   repair or clear {dir}_recovery / {dir}_removing,
//!             open an empty store at {dir}_recovery
//! Streaming   close the live store, copy every record into the new store
//! Barrier     flush + close the new store
//! Swapping    {dir} → {dir}_removing, {dir}_recovery → {dir},
//!             remove {dir}_removing (best effort)
//! Reopening   open {dir}, reload the applied index, run the snapshot handler
//! ```
//!
//! Until `{dir}` is renamed away, a failure reopens the untouched original
//! store before the error is returned. Between rename-away and rename-in
//! nothing sits at `{dir}`; the old store is at `{dir}_removing` and the
//! finished new one at `{dir}_recovery`. A crash in that window, or a failed
//! rename-in whose rollback also failed, is repaired by
//! [`DirSwap::recover`], which `MetadataFsm::open` runs before the store
//! opens.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};
use crate::protocol;
use crate::raft::{Peer, SnapshotIterator};
use crate::store::{sibling_dir, KvStore, WriteSet, RECOVERY_SUFFIX, REMOVING_SUFFIX};

use super::MetadataFsm;

/// Records buffered per batch while streaming into the recovery store
const STREAM_BATCH_SIZE: usize = 1024;

impl<S: KvStore> MetadataFsm<S> {
    /// Rebuild the store from `iter` and swap it in
    pub fn install_snapshot(
        &mut self,
        peers: &[Peer],
        iter: &mut dyn SnapshotIterator,
    ) -> Result<()> {
        tracing::warn!(
            dir = %self.store.dir().display(),
            peers = peers.len(),
            applied = self.applied,
            "installing snapshot, live store will be replaced"
        );

        self.installing = true;
        let result = self.install(iter);
        self.installing = false;

        match &result {
            Ok(()) => tracing::info!(applied = self.applied, "snapshot installed"),
            Err(e) => tracing::error!(error = %e, "snapshot install failed"),
        }
        result
    }

    fn install(&mut self, iter: &mut dyn SnapshotIterator) -> Result<()> {
        // ---------------------------------------------------------------------
        // Preparing: live store untouched
        // ---------------------------------------------------------------------
        let recovery_dir = self.store.recovery_dir();
        let removing_dir = self.store.removing_dir();
        let swap = DirSwap::new(self.store.dir(), &recovery_dir, &removing_dir);

        // Clears leftovers, or first repairs a swap that failed half way
        swap.recover()?;

        let mut recovery = self.store.open_sibling(&recovery_dir)?;

        // ---------------------------------------------------------------------
        // Streaming: live store closed, failures reopen it
        // ---------------------------------------------------------------------
        if let Err(e) = self.store.close() {
            return Err(self.reopen_original(e));
        }

        match stream_into(&mut recovery, iter) {
            Ok(records) => tracing::debug!(records, "snapshot streamed"),
            Err(e) => {
                drop(recovery);
                return Err(self.reopen_original(e));
            }
        }

        // ---------------------------------------------------------------------
        // Swapping
        // ---------------------------------------------------------------------
        if let Err(e) = swap.rename_away() {
            return Err(self.reopen_original(e));
        }
        if let Err(e) = swap.rename_in() {
            if let Err(rollback_err) = swap.rollback() {
                tracing::error!(
                    dir = %self.store.dir().display(),
                    error = %rollback_err,
                    "rollback failed, no store at the canonical directory"
                );
                return Err(e);
            }
            return Err(self.reopen_original(e));
        }
        swap.cleanup();

        // ---------------------------------------------------------------------
        // Reopening
        // ---------------------------------------------------------------------
        self.store.open()?;
        self.restore()?;

        if let Some(handler) = &self.handlers.snapshot {
            handler();
        }
        Ok(())
    }

    /// Reopen the (never renamed) live store, keep `cause` as the result
    fn reopen_original(&mut self, cause: AtlasError) -> AtlasError {
        if let Err(e) = self.store.open() {
            tracing::error!(
                dir = %self.store.dir().display(),
                error = %e,
                "failed to reopen original store"
            );
        }
        cause
    }
}

/// Copy every record into `recovery`, then flush and close it
fn stream_into<S: KvStore>(recovery: &mut S, iter: &mut dyn SnapshotIterator) -> Result<u64> {
    let mut records = 0u64;
    let mut pending = WriteSet::new();

    while let Some(record) = iter.next_record()? {
        let command = protocol::decode(&record)?;
        pending.insert(command.key, command.value);
        records += 1;

        if pending.len() >= STREAM_BATCH_SIZE {
            recovery.batch_put(&pending, false)?;
            pending.clear();
        }
    }
    if !pending.is_empty() {
        recovery.batch_put(&pending, false)?;
    }

    recovery.flush()?;
    recovery.close()?;
    Ok(records)
}

fn remove_leftover(dir: &Path) -> Result<()> {
    if dir.exists() {
        tracing::warn!(dir = %dir.display(), "removing leftover directory");
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}

// =============================================================================
// Directory Swap
// =============================================================================

/// Rename-based replacement of `live` by `staged`
///
/// Steps, in order: [`rename_away`](Self::rename_away),
/// [`rename_in`](Self::rename_in), [`cleanup`](Self::cleanup). If
/// `rename_in` fails, [`rollback`](Self::rollback) moves the old store back.
/// Each rename fsyncs the parent directory.
#[derive(Debug, Clone)]
pub struct DirSwap {
    live: PathBuf,
    staged: PathBuf,
    disposal: PathBuf,
}

impl DirSwap {
    pub fn new(live: &Path, staged: &Path, disposal: &Path) -> Self {
        Self {
            live: live.to_path_buf(),
            staged: staged.to_path_buf(),
            disposal: disposal.to_path_buf(),
        }
    }

    /// The swap `install_snapshot` runs for a store rooted at `dir`
    pub fn for_dir(dir: &Path) -> Self {
        Self::new(
            dir,
            &sibling_dir(dir, RECOVERY_SUFFIX),
            &sibling_dir(dir, REMOVING_SUFFIX),
        )
    }

    /// `live` → `disposal`
    pub fn rename_away(&self) -> Result<()> {
        rename_synced(&self.live, &self.disposal, "rename-away")
    }

    /// `staged` → `live`; the commit point
    pub fn rename_in(&self) -> Result<()> {
        rename_synced(&self.staged, &self.live, "rename-in")
    }

    /// `disposal` → `live`, after a failed `rename_in`
    pub fn rollback(&self) -> Result<()> {
        tracing::warn!(dir = %self.live.display(), "rolling back directory swap");
        rename_synced(&self.disposal, &self.live, "rollback")
    }

    /// Repair the directories after a crash at any point of a swap
    ///
    /// | `live` | `disposal` | `staged` | state                    | action          |
    /// |--------|------------|----------|--------------------------|-----------------|
    /// | yes    | any        | any      | not started or committed | clear siblings  |
    /// | no     | yes        | yes      | between the renames      | finish the swap |
    /// | no     | yes        | no       | rename-in lost `staged`  | roll back       |
    /// | no     | no         | any      | fresh store              | nothing         |
    ///
    /// `staged` only gets renamed away from once it was flushed and closed,
    /// so finishing the swap never publishes a partial store.
    pub fn recover(&self) -> Result<()> {
        if self.live.exists() {
            remove_leftover(&self.staged)?;
            if self.disposal.exists() {
                self.cleanup();
            }
            return Ok(());
        }
        if !self.disposal.exists() {
            return Ok(());
        }

        if self.staged.exists() {
            tracing::warn!(dir = %self.live.display(), "finishing interrupted snapshot swap");
            self.rename_in()?;
            self.cleanup();
            Ok(())
        } else {
            self.rollback()
        }
    }

    /// Delete the old store; failure only costs disk space
    pub fn cleanup(&self) {
        if let Err(e) = fs::remove_dir_all(&self.disposal) {
            tracing::error!(
                dir = %self.disposal.display(),
                error = %e,
                "failed to remove replaced store"
            );
        }
    }
}

fn rename_synced(from: &Path, to: &Path, step: &'static str) -> Result<()> {
    fs::rename(from, to).map_err(|source| AtlasError::SnapshotSwap { step, source })?;
    if let Err(e) = sync_parent(to) {
        tracing::warn!(dir = %to.display(), error = %e, step, "parent directory fsync failed");
    }
    Ok(())
}

fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}
