//! Command definitions
//!
//! A `Command` is the unit of replication: one record appended to the
//! consensus log and applied on every replica.

use serde::{Deserialize, Serialize};

/// Operation code carried by every command
///
/// Codes are plain integers on the wire so that a replica running a newer
/// catalogue still decodes records it does not know; those fall through to
/// the default put path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpCode(pub u32);

/// How the apply path treats an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Write `key = value` plus the applied marker
    Put,
    /// `value` is a batch envelope; write every nested record plus the marker
    BatchPut,
    /// Remove `key` and advance the marker in one batch
    Delete,
    /// Hand the write-set to the user command handler, then write it
    LimiterSync,
}

impl OpCode {
    // =========================================================================
    // Put-class
    // =========================================================================
    pub const SYNC_PUT: OpCode = OpCode(0x01);
    pub const SYNC_ADD_META_NODE: OpCode = OpCode(0x02);
    pub const SYNC_ADD_DATA_NODE: OpCode = OpCode(0x03);
    pub const SYNC_ADD_VOL: OpCode = OpCode(0x04);
    pub const SYNC_UPDATE_VOL: OpCode = OpCode(0x05);
    pub const SYNC_ADD_META_PARTITION: OpCode = OpCode(0x06);
    pub const SYNC_UPDATE_META_PARTITION: OpCode = OpCode(0x07);
    pub const SYNC_ADD_DATA_PARTITION: OpCode = OpCode(0x08);
    pub const SYNC_UPDATE_DATA_PARTITION: OpCode = OpCode(0x09);
    pub const SYNC_ADD_USER_INFO: OpCode = OpCode(0x0A);
    pub const SYNC_UPDATE_USER_INFO: OpCode = OpCode(0x0B);
    pub const SYNC_ADD_AK_USER: OpCode = OpCode(0x0C);
    pub const SYNC_ADD_VOL_USER: OpCode = OpCode(0x0D);
    pub const SYNC_UPDATE_VOL_USER: OpCode = OpCode(0x0E);
    pub const SYNC_SET_QUOTA: OpCode = OpCode(0x0F);
    pub const SYNC_ADD_LC_NODE: OpCode = OpCode(0x10);
    pub const SYNC_SET_LC_CONF: OpCode = OpCode(0x11);
    pub const SYNC_S3_QOS_SET: OpCode = OpCode(0x12);
    pub const SYNC_PUT_CLUSTER: OpCode = OpCode(0x13);
    pub const SYNC_ALLOCATE_ID: OpCode = OpCode(0x14);

    pub const SYNC_BATCH_PUT: OpCode = OpCode(0x20);

    // =========================================================================
    // Delete-class
    // =========================================================================
    pub const SYNC_DELETE_DATA_NODE: OpCode = OpCode(0x40);
    pub const SYNC_DELETE_META_NODE: OpCode = OpCode(0x41);
    pub const SYNC_DELETE_VOL: OpCode = OpCode(0x42);
    pub const SYNC_DELETE_DATA_PARTITION: OpCode = OpCode(0x43);
    pub const SYNC_DELETE_META_PARTITION: OpCode = OpCode(0x44);
    pub const SYNC_DELETE_USER_INFO: OpCode = OpCode(0x45);
    pub const SYNC_DELETE_AK_USER: OpCode = OpCode(0x46);
    pub const SYNC_DELETE_VOL_USER: OpCode = OpCode(0x47);
    pub const SYNC_DELETE_QUOTA: OpCode = OpCode(0x48);
    pub const SYNC_DELETE_LC_NODE: OpCode = OpCode(0x49);
    pub const SYNC_DELETE_LC_CONF: OpCode = OpCode(0x4A);
    pub const SYNC_S3_QOS_DELETE: OpCode = OpCode(0x4B);

    // =========================================================================
    // Rate limiter sync
    // =========================================================================
    pub const SYNC_PUT_FOLLOWER_API_LIMITER_INFO: OpCode = OpCode(0x60);
    pub const SYNC_PUT_API_LIMITER_INFO: OpCode = OpCode(0x61);

    /// Classify for dispatch; unknown codes are plain puts
    pub fn kind(self) -> OpKind {
        match self {
            Self::SYNC_BATCH_PUT => OpKind::BatchPut,
            Self::SYNC_DELETE_DATA_NODE
            | Self::SYNC_DELETE_META_NODE
            | Self::SYNC_DELETE_VOL
            | Self::SYNC_DELETE_DATA_PARTITION
            | Self::SYNC_DELETE_META_PARTITION
            | Self::SYNC_DELETE_USER_INFO
            | Self::SYNC_DELETE_AK_USER
            | Self::SYNC_DELETE_VOL_USER
            | Self::SYNC_DELETE_QUOTA
            | Self::SYNC_DELETE_LC_NODE
            | Self::SYNC_DELETE_LC_CONF
            | Self::SYNC_S3_QOS_DELETE => OpKind::Delete,
            Self::SYNC_PUT_FOLLOWER_API_LIMITER_INFO | Self::SYNC_PUT_API_LIMITER_INFO => {
                OpKind::LimiterSync
            }
            _ => OpKind::Put,
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A replicated mutation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub op: OpCode,
    pub key: String,
    /// Opaque payload; for `SYNC_BATCH_PUT` an encoded batch envelope
    pub value: Vec<u8>,
}

impl Command {
    pub fn new(op: OpCode, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            op,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }
}
