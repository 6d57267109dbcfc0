//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{AtlasError, Result};

use super::entry::{FrameHeader, HEADER_SIZE};
use super::WalEntry;

/// Upper bound on a single frame payload; anything larger is a damaged header
const MAX_FRAME_PAYLOAD: u32 = 256 * 1024 * 1024;

/// Outcome of reading one frame
#[derive(Debug)]
pub(crate) enum Frame {
    /// A complete, checksummed entry
    Entry(WalEntry),
    /// Clean end of file on a frame boundary
    End,
    /// The file ends in the middle of a frame (torn write)
    Partial,
    /// A complete frame whose checksum or payload is bad
    Corrupted,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset of the next frame
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn tail or a checksum
    /// failure is reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Partial => Err(AtlasError::WalCorruption(format!(
                "partial write at offset {}",
                self.position
            ))),
            Frame::Corrupted => Err(AtlasError::WalCorruption(format!(
                "corrupted entry at offset {}",
                self.position
            ))),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Byte offset just past the last complete frame read
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn read_frame(&mut self) -> Result<Frame> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header_bytes)? {
            0 => return Ok(Frame::End),
            n if n < HEADER_SIZE => return Ok(Frame::Partial),
            _ => {}
        }

        let header = FrameHeader::parse(&header_bytes)?;
        if header.len > MAX_FRAME_PAYLOAD {
            return Ok(Frame::Corrupted);
        }

        let mut payload = vec![0u8; header.len as usize];
        if read_full(&mut self.reader, &mut payload)? < payload.len() {
            return Ok(Frame::Partial);
        }

        match WalEntry::from_frame(&header, &payload) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + payload.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(AtlasError::WalCorruption(reason)) => {
                tracing::debug!(offset = self.position, %reason, "WAL frame rejected");
                Ok(Frame::Corrupted)
            }
            Err(e) => Err(e),
        }
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(AtlasError::Io(e)),
        }
    }
    Ok(filled)
}

/// Iterator over WAL entries
///
/// Stops after the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
