//! Command codec
//!
//! Encoding and decoding of single commands and batch envelopes.
//!
//! ## Wire Format
//!
//! bincode with fixed-width integers (little endian):
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬──────────┐
//! │  Op (4)  │KeyLen (8)│   Key    │ValLen (8)│  Value   │
//! └──────────┴──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! A batch envelope is a `BTreeMap<String, Command>`: an 8-byte entry count
//! followed by (key, command) pairs in key order, so equal batches always
//! encode to equal bytes. Trailing bytes after a value are rejected.

use std::collections::BTreeMap;

use bincode::Options;

use crate::error::{AtlasError, Result};

use super::Command;

/// Maximum encoded size of a single command or envelope (64 MB)
pub const MAX_COMMAND_SIZE: u64 = 64 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_COMMAND_SIZE)
        .reject_trailing_bytes()
}

// =============================================================================
// Single Command
// =============================================================================

/// Encode a command to bytes
pub fn encode(command: &Command) -> Result<Vec<u8>> {
    options()
        .serialize(command)
        .map_err(|e| AtlasError::Serialization(e.to_string()))
}

/// Decode a command from bytes
///
/// Fails with `AtlasError::Decode` on truncated, oversized or otherwise
/// malformed input.
pub fn decode(bytes: &[u8]) -> Result<Command> {
    options()
        .deserialize(bytes)
        .map_err(|e| AtlasError::Decode(e.to_string()))
}

// =============================================================================
// Batch Envelope
// =============================================================================

/// Encode a batch envelope (the value of a `SYNC_BATCH_PUT` command)
pub fn encode_batch(batch: &BTreeMap<String, Command>) -> Result<Vec<u8>> {
    options()
        .serialize(batch)
        .map_err(|e| AtlasError::Serialization(e.to_string()))
}

/// Decode a batch envelope
pub fn decode_batch(bytes: &[u8]) -> Result<BTreeMap<String, Command>> {
    options()
        .deserialize(bytes)
        .map_err(|e| AtlasError::Decode(e.to_string()))
}
