//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{AtlasError, Result};

use super::iterator::SSTableIterator;
use super::{read_u32, read_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// The file handle sits behind a mutex so lookups take `&self` and a reader
/// can be shared (`Arc`) between the live store and any number of snapshots.
/// A shared reader keeps its file readable after the file is unlinked.
pub struct SSTableReader {
    path: PathBuf,
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of the data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header, footer and data checksum, then loads the index.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(AtlasError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(AtlasError::Storage(format!(
                "Invalid SSTable magic in {}: {:?}",
                path.display(),
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(AtlasError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header, 6);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer, 0);
        let data_crc = read_u32(&footer, 8);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(AtlasError::Storage(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Verify the data block
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != data_crc {
            return Err(AtlasError::Storage(format!(
                "SSTable {} data CRC mismatch: stored {:#010x}, computed {:#010x}",
                path.display(),
                data_crc,
                actual_crc
            )));
        }
        drop(data);

        // Index block size = file_size - footer_size - index_offset
        let mut index_data = vec![0u8; (file_size - FOOTER_SIZE - index_offset) as usize];
        file.read_exact(&mut index_data)?;
        let index = parse_index(&index_data).ok_or_else(|| {
            AtlasError::Storage(format!("SSTable {} has a malformed index", path.display()))
        })?;

        if index.len() as u64 != entry_count {
            return Err(AtlasError::Storage(format!(
                "SSTable {} index holds {} keys, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Point lookup through the in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(value))`: live value
    /// - `Ok(None)`: tombstone
    /// - `Err(KeyNotFound)`: not in this file
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(AtlasError::KeyNotFound),
        };

        self.read_entry_at(offset).map(|(_, value, _)| value)
    }

    /// Read the entry at `offset`: (key, value-or-tombstone, encoded size)
    pub(super) fn read_entry_at(&self, offset: u64) -> Result<(Vec<u8>, Option<Vec<u8>>, u64)> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let key_len = read_u32(&header, 0) as usize;
        let val_len = read_u32(&header, 4);

        let mut key = vec![0u8; key_len];
        file.read_exact(&mut key)?;

        let mut size = 8 + key_len as u64;
        let value = if val_len == TOMBSTONE_MARKER {
            None
        } else {
            let mut v = vec![0u8; val_len as usize];
            file.read_exact(&mut v)?;
            size += val_len as u64;
            Some(v)
        };

        Ok((key, value, size))
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Sequential iterator over all entries, tombstones included
    pub fn iter(self: &Arc<Self>) -> SSTableIterator {
        SSTableIterator::new(Arc::clone(self), HEADER_SIZE, self.index_offset)
    }
}

/// Parse index entries: [key_len(4)][offset(8)][key]
fn parse_index(data: &[u8]) -> Option<BTreeMap<Vec<u8>, u64>> {
    let mut index = BTreeMap::new();
    let mut pos = 0;
    while pos < data.len() {
        if pos + 12 > data.len() {
            return None;
        }
        let key_len = read_u32(data, pos) as usize;
        let offset = read_u64(data, pos + 4);
        pos += 12;

        if pos + key_len > data.len() {
            return None;
        }
        index.insert(data[pos..pos + key_len].to_vec(), offset);
        pos += key_len;
    }
    Some(index)
}
