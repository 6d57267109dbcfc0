//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.
//!
//! Entries go to `<name>.tmp` first. `finish()` fsyncs it, renames it to the
//! final name and fsyncs the directory, so a file under an `.sst` name is
//! always complete. A crash mid-build leaves only a `.tmp` file, which
//! `StorageManager::open` discards.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};

use super::{SSTable, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, TMP_SUFFIX, VERSION};

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    /// Final name, published by `finish()`
    path: PathBuf,
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: key → file offset of entry
    index: Vec<(Vec<u8>, u64)>,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Writes header immediately; call `add()`/`add_tombstone()` in strictly
    /// ascending key order, then `finish()` to write index and footer.
    pub fn new(path: &Path) -> Result<Self> {
        let tmp_path = tmp_path_for(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);

        // Entry count is patched in by finish()
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    /// value=None means tombstone
    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some((last, _)) = self.index.last() {
            if key <= last.as_slice() {
                return Err(AtlasError::Storage(format!(
                    "SSTable keys out of order in {}: {:?} after {:?}",
                    self.path.display(),
                    key,
                    last
                )));
            }
        }
        if let Some(v) = value {
            if v.len() as u64 >= TOMBSTONE_MARKER as u64 {
                return Err(AtlasError::Storage(format!(
                    "value of {} bytes exceeds SSTable limit",
                    v.len()
                )));
            }
        }

        self.index.push((key.to_vec(), self.current_offset));

        // [key_len(4)][val_len(4)][key][value]
        let key_len_bytes = (key.len() as u32).to_le_bytes();
        let val_len_bytes = match value {
            Some(v) => v.len() as u32,
            None => TOMBSTONE_MARKER,
        }
        .to_le_bytes();

        for part in [&key_len_bytes[..], &val_len_bytes[..], key, value.unwrap_or(&[])] {
            self.writer.write_all(part)?;
            self.data_hasher.update(part);
        }

        self.current_offset += 8 + key.len() as u64 + value.map_or(0, |v| v.len() as u64);
        self.entry_count += 1;

        Ok(())
    }

    /// Write index block and footer, fsync, publish under the final name
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.current_offset;

        // [key_len(4)][offset(8)][key] for each entry
        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| AtlasError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            File::open(dir)?.sync_all()?;
        }

        Ok(SSTable {
            file_size,
            path: self.path,
            entry_count: self.entry_count,
        })
    }
}

/// `sstable_000007.sst` → `sstable_000007.sst.tmp`
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}
