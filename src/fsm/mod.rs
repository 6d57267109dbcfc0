//! FSM Module
//!
//! `MetadataFsm`: the replicated state machine between the consensus log
//! and the store.
//!
//! ## Responsibilities
//! - Apply committed entries: decode, build the write-set, commit it
//!   together with the applied index marker, request log truncation
//! - Relay membership and leader changes to registered handlers
//! - Export point-in-time snapshots
//! - Install snapshots by building a new store and swapping directories
//!
//! ## Serialization
//!
//! The consensus engine never calls `apply`, `apply_member_change`,
//! `snapshot` or `apply_snapshot` concurrently on one instance. Nothing in
//! here locks around the store or the cached applied index; `&mut self` on
//! the mutating entry points is the only guard.

mod apply;
mod handlers;
mod install;
mod snapshot;

use std::fmt::Display;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{AtlasError, Result};
use crate::raft::{ConfChange, FatalError, Peer, RaftServer, SnapshotIterator, StateMachine};
use crate::store::{DiskStore, KvStore};

pub use handlers::{LeaderChangeHandler, PeerChangeHandler, SnapshotHandler, UserCmdApplyHandler};
pub use install::DirSwap;
pub use snapshot::MetadataSnapshot;

use handlers::{Handlers, LeaderNotifier};

/// Store key holding the decimal text of the last applied log index
pub const APPLIED_KEY: &str = "applied";

/// Decode the value stored under `APPLIED_KEY`
pub fn parse_applied(raw: &[u8]) -> Result<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| {
            AtlasError::Storage(format!(
                "applied index marker is not a decimal integer: {:?}",
                String::from_utf8_lossy(raw)
            ))
        })
}

/// Replicated metadata state machine
pub struct MetadataFsm<S: KvStore = DiskStore> {
    store: S,
    raft: Option<Arc<dyn RaftServer>>,
    group_id: u64,
    retain_logs: u64,

    /// Last applied index. Always equal to the marker in `store` once the
    /// entry's batch has been committed.
    applied: u64,

    /// Set for the duration of `apply_snapshot`
    installing: bool,

    handlers: Handlers,
}

impl MetadataFsm<DiskStore> {
    /// Open the disk store at `config.data_dir` and restore the applied index
    ///
    /// A snapshot swap cut short by a crash is repaired first.
    pub fn open(config: Config, raft: Option<Arc<dyn RaftServer>>) -> Result<Self> {
        config.validate()?;
        DirSwap::for_dir(&config.data_dir).recover()?;
        let store = DiskStore::create(config.clone())?;
        Self::new(store, &config, raft)
    }
}

impl<S: KvStore> MetadataFsm<S> {
    /// Wrap an open store
    ///
    /// The applied index is read back from the store (absent means 0).
    pub fn new(store: S, config: &Config, raft: Option<Arc<dyn RaftServer>>) -> Result<Self> {
        config.validate()?;

        let mut fsm = Self {
            store,
            raft,
            group_id: config.group_id,
            retain_logs: config.retain_logs,
            applied: 0,
            installing: false,
            handlers: Handlers::default(),
        };
        fsm.restore()?;

        tracing::info!(
            dir = %fsm.store.dir().display(),
            applied = fsm.applied,
            group_id = fsm.group_id,
            "metadata fsm ready"
        );
        Ok(fsm)
    }

    /// Reload the cached applied index from the store
    pub fn restore(&mut self) -> Result<()> {
        self.applied = match self.store.get(APPLIED_KEY)? {
            None => 0,
            Some(raw) => parse_applied(&raw)?,
        };
        Ok(())
    }

    pub fn applied_index(&self) -> u64 {
        self.applied
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_installing_snapshot(&self) -> bool {
        self.installing
    }

    /// Attach the consensus engine after construction
    pub fn set_raft_server(&mut self, raft: Arc<dyn RaftServer>) {
        self.raft = Some(raft);
    }

    // =========================================================================
    // Handler Registration
    // =========================================================================

    /// Replaces any earlier leader change handler (and its worker thread)
    pub fn register_leader_change_handler<F>(&mut self, handler: F) -> Result<()>
    where
        F: Fn(u64) + Send + 'static,
    {
        self.handlers.leader_change = Some(LeaderNotifier::spawn(Box::new(handler))?);
        Ok(())
    }

    pub fn register_peer_change_handler<F>(&mut self, handler: F)
    where
        F: Fn(&ConfChange) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.peer_change = Some(Box::new(handler));
    }

    pub fn register_snapshot_handler<F>(&mut self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handlers.snapshot = Some(Box::new(handler));
    }

    /// See [`UserCmdApplyHandler`] for when it runs
    pub fn register_user_cmd_apply_handler<F>(&mut self, handler: F)
    where
        F: Fn(crate::protocol::OpCode, &str, &crate::store::WriteSet) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.user_cmd_apply = Some(Box::new(handler));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Forward a membership change to the registered handler
    pub fn change_membership(&self, change: &ConfChange, index: u64) -> Result<()> {
        tracing::debug!(index, ?change, "membership change");
        match &self.handlers.peer_change {
            Some(handler) => handler(change),
            None => Ok(()),
        }
    }

    /// Queue a leader change for the handler thread; never blocks
    pub fn notify_leader_change(&self, leader: u64) {
        if let Some(notifier) = &self.handlers.leader_change {
            notifier.notify(leader);
        }
    }

    /// Stop the consensus engine and the leader change worker. Idempotent.
    pub fn stop(&mut self) {
        if let Some(raft) = self.raft.take() {
            raft.stop();
            tracing::info!(group_id = self.group_id, "raft server stopped");
        }
        self.handlers.leader_change = None;
    }
}

impl<S: KvStore> StateMachine for MetadataFsm<S> {
    type Snapshot = MetadataSnapshot<S::Iter>;

    fn apply(&mut self, command: &[u8], index: u64) {
        self.apply_entry(command, index);
    }

    fn apply_member_change(&mut self, change: &ConfChange, index: u64) -> Result<()> {
        self.change_membership(change, index)
    }

    fn snapshot(&self) -> Result<Self::Snapshot> {
        self.create_snapshot()
    }

    fn apply_snapshot(&mut self, peers: &[Peer], iter: &mut dyn SnapshotIterator) -> Result<()> {
        self.install_snapshot(peers, iter)
    }

    fn handle_fatal_event(&self, err: FatalError) -> ! {
        fail_stop("raft reported a fatal error", &err)
    }

    fn handle_leader_change(&self, leader: u64) {
        self.notify_leader_change(leader);
    }
}

/// Log and terminate. The release profile aborts on panic.
pub(crate) fn fail_stop(what: &str, err: &dyn Display) -> ! {
    tracing::error!(error = %err, "{}", what);
    panic!("{}: {}", what, err);
}
