//! Write-Ahead Log (WAL) Module
//!
//! Durability for the store engine. Every write batch the state machine
//! commits (its records plus the `applied` marker) becomes exactly one frame,
//! so replay after a crash restores a batch whole or not at all.
//!
//! ## Frame
//! ```text
//! [LSN u64 LE][CRC32 u32 LE][Len u32 LE][bincode(Operation, timestamp)]
//! ```
//!
//! The CRC covers the payload. Recovery stops at the first frame that is
//! short or fails its CRC and cuts the file there. The log is truncated
//! after every memtable flush, so it only ever holds unflushed batches.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Operation, HEADER_SIZE};
pub use writer::WalWriter;
pub use reader::{WalReader, WalIterator};
pub use recovery::{WalRecovery, RecoveryResult};
