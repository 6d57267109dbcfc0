//! # AtlasMeta
//!
//! A replicated metadata state machine over a crash-safe key-value store:
//! - Deterministic apply of committed log entries, each as one atomic batch
//!   carrying the applied index
//! - Point-in-time snapshot export for lagging replicas
//! - Crash-safe snapshot install via directory swap
//! - Write-Ahead Logging (WAL) with partial write recovery underneath
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Consensus Engine (external)                 │
//! │     apply / member change / snapshot / leader / fatal        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  StateMachine
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      MetadataFsm                             │
//! │   Command Codec → Write-Set + "applied" → atomic batch       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  KvStore
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                DiskStore → Engine                            │
//! └─────────────────────┬───────────────────────────────────────┘
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │   (CoW)     │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

pub mod protocol;
pub mod store;
pub mod raft;
pub mod fsm;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, Result};
pub use config::Config;
pub use engine::Engine;
pub use fsm::{MetadataFsm, MetadataSnapshot, APPLIED_KEY};
pub use protocol::{Command, OpCode, OpKind};
pub use raft::{RaftServer, SnapshotIterator, StateMachine};
pub use store::{DiskStore, KvIterator, KvStore, WriteSet};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasMeta
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
