//! Handler set
//!
//! Callbacks registered by the domain layer. Each one is optional; an unset
//! handler is a no-op.

use std::thread;

use crossbeam::channel::{self, Sender};

use crate::error::Result;
use crate::protocol::OpCode;
use crate::raft::ConfChange;
use crate::store::WriteSet;

/// Called with the new leader id, off the apply loop
pub type LeaderChangeHandler = Box<dyn Fn(u64) + Send + 'static>;

/// Called for every membership change; an error fails the change
pub type PeerChangeHandler = Box<dyn Fn(&ConfChange) -> Result<()> + Send + Sync + 'static>;

/// Called after a snapshot has been installed and the store reopened
pub type SnapshotHandler = Box<dyn Fn() + Send + Sync + 'static>;

/// Called for rate limiter sync commands with `(op, key, write_set)`.
///
/// Runs BEFORE the write-set is committed to the store: the handler sees the
/// write-set while the store still holds the previous state. An error is
/// fatal, same as a failed commit.
pub type UserCmdApplyHandler =
    Box<dyn Fn(OpCode, &str, &WriteSet) -> Result<()> + Send + Sync + 'static>;

#[derive(Default)]
pub(crate) struct Handlers {
    pub(crate) leader_change: Option<LeaderNotifier>,
    pub(crate) peer_change: Option<PeerChangeHandler>,
    pub(crate) snapshot: Option<SnapshotHandler>,
    pub(crate) user_cmd_apply: Option<UserCmdApplyHandler>,
}

/// Runs the leader change handler on its own thread
///
/// `notify` only enqueues, so the caller never waits on the handler. The
/// worker exits once the notifier is dropped and the queue is drained.
pub(crate) struct LeaderNotifier {
    tx: Sender<u64>,
}

impl LeaderNotifier {
    pub(crate) fn spawn(handler: LeaderChangeHandler) -> Result<Self> {
        let (tx, rx) = channel::unbounded::<u64>();

        thread::Builder::new()
            .name("atlasmeta-leader-change".to_string())
            .spawn(move || {
                for leader in rx {
                    handler(leader);
                }
                tracing::trace!("leader change dispatcher exited");
            })?;

        Ok(Self { tx })
    }

    pub(crate) fn notify(&self, leader: u64) {
        if self.tx.send(leader).is_err() {
            tracing::warn!(leader, "leader change dispatcher is gone, notification dropped");
        }
    }
}
