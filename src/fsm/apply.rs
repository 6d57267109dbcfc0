//! Apply path
//!
//! One committed entry → one atomic store batch carrying the applied index.

use crate::error::Result;
use crate::protocol::{self, Command, OpKind};
use crate::store::{KvStore, WriteSet};

use super::{fail_stop, MetadataFsm, APPLIED_KEY};

impl<S: KvStore> MetadataFsm<S> {
    /// Apply the committed entry at `index`
    ///
    /// Any failure terminates the process: a committed entry that is skipped
    /// or half-applied on one replica cannot be repaired later.
    pub fn apply_entry(&mut self, command: &[u8], index: u64) {
        if let Err(e) = self.commit_entry(command, index) {
            tracing::error!(index, applied = self.applied, "failed to apply committed entry");
            fail_stop("apply failed", &e);
        }

        self.applied = index;

        if index > 0 && index % self.retain_logs == 0 {
            tracing::warn!(retain_logs = self.retain_logs, index, "truncate raft log");
            if let Some(raft) = &self.raft {
                raft.truncate(self.group_id, index);
            }
        }
    }

    fn commit_entry(&self, command: &[u8], index: u64) -> Result<()> {
        let command = protocol::decode(command)?;
        let write_set = build_write_set(&command, index)?;

        tracing::trace!(index, op = %command.op, key = %command.key, "apply");

        match command.kind() {
            OpKind::Delete => self
                .store
                .delete_key_and_batch(&command.key, &write_set, true),
            OpKind::LimiterSync => {
                if let Some(handler) = &self.handlers.user_cmd_apply {
                    handler(command.op, &command.key, &write_set)?;
                }
                self.store.batch_put(&write_set, true)
            }
            OpKind::Put | OpKind::BatchPut => self.store.batch_put(&write_set, true),
        }
    }
}

/// Keys written for `command` at `index`, marker included
///
/// A batch contributes every nested record's value under its envelope key.
pub(crate) fn build_write_set(command: &Command, index: u64) -> Result<WriteSet> {
    let mut write_set = WriteSet::new();

    match command.kind() {
        OpKind::BatchPut => {
            for (key, nested) in protocol::decode_batch(&command.value)? {
                write_set.insert(key, nested.value);
            }
        }
        _ => {
            write_set.insert(command.key.clone(), command.value.clone());
        }
    }

    write_set.insert(APPLIED_KEY.to_string(), index.to_string().into_bytes());
    Ok(write_set)
}

