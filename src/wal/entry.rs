//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their on-disk frame.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Several mutations that must land together.
    ///
    /// Deletes are applied before puts.
    Batch {
        deletes: Vec<Vec<u8>>,
        puts: Vec<(Vec<u8>, Vec<u8>)>,
    },
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self {
            lsn,
            operation,
            timestamp: now_millis(),
        }
    }

    /// Serialize into a self-describing frame:
    /// `[lsn: u64 LE][crc: u32 LE][len: u32 LE][payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode_frame(self.lsn, &self.operation, self.timestamp)
    }

    /// Deserialize a single complete frame
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(bytes)?;
        let end = HEADER_SIZE + header.len as usize;

        if bytes.len() < end {
            return Err(AtlasError::WalCorruption(format!(
                "truncated entry: expected {} bytes, got {}",
                end,
                bytes.len()
            )));
        }

        Self::from_frame(&header, &bytes[HEADER_SIZE..end])
    }

    /// Total frame size on disk
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + encode_payload(&self.operation, self.timestamp)?.len())
    }

    /// CRC32 of the payload section
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(crc32fast::hash(&encode_payload(&self.operation, self.timestamp)?))
    }

    /// Rebuild an entry from a parsed header and its payload bytes
    pub(crate) fn from_frame(header: &FrameHeader, payload: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(payload);
        if actual != header.crc {
            return Err(AtlasError::WalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:#010x}, computed {:#010x}",
                header.lsn, header.crc, actual
            )));
        }

        let (operation, timestamp): (Operation, u64) = bincode::deserialize(payload)
            .map_err(|e| AtlasError::WalCorruption(format!("undecodable payload: {}", e)))?;

        Ok(Self {
            lsn: header.lsn,
            operation,
            timestamp,
        })
    }
}

/// Current wall-clock time in unix millis
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Build a frame without taking ownership of the operation
pub(crate) fn encode_frame(lsn: u64, operation: &Operation, timestamp: u64) -> Result<Vec<u8>> {
    let payload = encode_payload(operation, timestamp)?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&lsn.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Payload is everything except the LSN, which lives in the header
fn encode_payload(operation: &Operation, timestamp: u64) -> Result<Vec<u8>> {
    bincode::serialize(&(operation, timestamp)).map_err(|e| AtlasError::Serialization(e.to_string()))
}

/// Parsed fixed-size frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(AtlasError::WalCorruption(format!(
                "truncated header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);

        Ok(Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        })
    }
}
