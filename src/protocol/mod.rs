//! Protocol Module
//!
//! The replicated command format.
//!
//! ### Command Record
//! - `op`:    operation code (`OpCode`), classified into an `OpKind`
//! - `key`:   string identifier, meaning depends on `op`
//! - `value`: opaque bytes; a batch envelope for `SYNC_BATCH_PUT`
//!
//! ### Dispatch Classes
//! - Put:         plain put (also the fallback for unknown codes)
//! - BatchPut:    nested `key → Command` map
//! - Delete:      delete-class ops, key removed atomically with the marker
//! - LimiterSync: rate limiter info, passed to the user handler first

mod codec;
mod command;

pub use codec::{decode, decode_batch, encode, encode_batch, MAX_COMMAND_SIZE};
pub use command::{Command, OpCode, OpKind};
