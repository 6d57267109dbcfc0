//! Raft Module
//!
//! Types shared with the consensus engine. The engine itself (election,
//! replication, transport) lives outside this crate; it drives a
//! [`StateMachine`] and accepts truncate requests through [`RaftServer`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;

/// Handle on the consensus engine
pub trait RaftServer: Send + Sync {
    /// Drop log entries up to and including `index`; their effects are in
    /// the state machine's store
    fn truncate(&self, group_id: u64, index: u64);

    /// Release the engine
    fn stop(&self);
}

/// A member of the consensus group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub id: u64,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfChangeType {
    AddNode,
    RemoveNode,
    PromoteLearner,
}

/// Membership change committed by the consensus engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfChange {
    pub change_type: ConfChangeType,
    pub peer: Peer,
    /// Opaque context attached by the proposer
    pub context: Vec<u8>,
}

/// Fault the consensus engine cannot recover from
#[derive(Debug, Clone, Error)]
#[error("raft group {group_id} fatal error: {message}")]
pub struct FatalError {
    pub group_id: u64,
    pub message: String,
}

/// Stream of snapshot records
///
/// Each record is an encoded `Command`. `Ok(None)` marks the end of the
/// stream; any `Err` aborts the transfer.
pub trait SnapshotIterator {
    fn next_record(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Callbacks driven by the consensus engine's apply loop
///
/// The engine never calls two of these concurrently on one instance.
pub trait StateMachine {
    type Snapshot: SnapshotIterator;

    /// Apply one committed entry. Entries arrive once each, in index order.
    fn apply(&mut self, command: &[u8], index: u64);

    /// A non-`Ok` result fails the configuration change
    fn apply_member_change(&mut self, change: &ConfChange, index: u64) -> Result<()>;

    fn snapshot(&self) -> Result<Self::Snapshot>;

    fn apply_snapshot(&mut self, peers: &[Peer], iter: &mut dyn SnapshotIterator) -> Result<()>;

    fn handle_fatal_event(&self, err: FatalError) -> !;

    fn handle_leader_change(&self, leader: u64);
}
