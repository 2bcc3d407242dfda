//! Segment writer: turns an ordered entry stream into a published key/data
//! file pair.
//!
//! The writer consumes an iterator yielding entries in strictly ascending key
//! order and emits two files: the key file, a sequence of 4096-byte blocks of
//! prefix-compressed entries, and the data file, a raw concatenation of the
//! values. It also builds the sparse key index (the first key of every Nth
//! block) so the freshly written segment can be opened without rescanning.
//!
//! Both files are written under `.tmp` names and renamed into place once
//! complete, so a segment either exists as a committed pair or not at all.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::compare::KeyCompare;
use crate::error::{Error, Result};

use super::codec::{self, BLOCK_SIZE, END_OF_BLOCK, ENTRY_OVERHEAD, MAX_KEY_SIZE, REMOVED_DATA_LEN};
use super::disk::DiskSegment;
use super::LookupIterator;

/// Writes the iterator's entries to temporary files, renames them to the
/// final paths, and opens the result as a disk segment carrying the sparse
/// index built during the write.
///
/// On any error the temporary files are removed. An input that yields no
/// entries fails with `Error::EmptySegment`; the caller must not materialize
/// the segment.
pub fn write_and_load_segment(
    key_path: &Path,
    data_path: &Path,
    itr: &mut dyn LookupIterator,
    compare: Arc<dyn KeyCompare>,
    key_index_interval: usize,
) -> Result<DiskSegment> {
    let key_tmp = tmp_path(key_path);
    let data_tmp = tmp_path(data_path);

    let key_index = match write_segment_files(&key_tmp, &data_tmp, itr, key_index_interval) {
        Ok(index) => index,
        Err(err) => {
            let _ = fs::remove_file(&key_tmp);
            let _ = fs::remove_file(&data_tmp);
            return Err(err);
        }
    };

    fs::rename(&key_tmp, key_path)?;
    fs::rename(&data_tmp, data_path)?;

    DiskSegment::open(key_path, data_path, Some(key_index), compare, key_index_interval)
}

/// Writes the iterator's entries to the given files and returns the sparse
/// key index recorded along the way.
fn write_segment_files(
    key_path: &Path,
    data_path: &Path,
    itr: &mut dyn LookupIterator,
    key_index_interval: usize,
) -> Result<Vec<Vec<u8>>> {
    let interval = key_index_interval.max(1) as u64;
    let mut key_writer = BufWriter::new(File::create(key_path)?);
    let mut data_writer = BufWriter::new(File::create(data_path)?);

    let zeros = [0u8; BLOCK_SIZE];
    let mut key_index: Vec<Vec<u8>> = Vec::new();
    let mut data_offset = 0u64;
    let mut block_len = 0usize;
    let mut block_index = 0u64;
    let mut entry_count = 0u64;
    let mut prev_key: Vec<u8> = Vec::new();

    while let Some((key, value)) = itr.next_entry()? {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge(key.len()));
        }
        entry_count += 1;

        if let Some(value) = &value {
            // A length of REMOVED_DATA_LEN would read back as a tombstone.
            if value.len() >= REMOVED_DATA_LEN as usize {
                return Err(Error::ValueTooLarge(value.len()));
            }
            data_writer.write_all(value)?;
        }

        // The fit check uses the full key length: after a block break the key
        // is written uncompressed. Two bytes stay reserved for the terminator.
        if block_len + ENTRY_OVERHEAD + key.len() >= BLOCK_SIZE - 2 {
            key_writer.write_u16::<LittleEndian>(END_OF_BLOCK)?;
            key_writer.write_all(&zeros[..BLOCK_SIZE - block_len - 2])?;
            block_len = 0;
            prev_key.clear();
        }

        if block_len == 0 {
            if block_index % interval == 0 {
                key_index.push(key.clone());
            }
            block_index += 1;
        }

        let data_len = match &value {
            Some(value) => value.len() as u32,
            None => REMOVED_DATA_LEN,
        };

        let encoded = codec::encode_key(&key, &prev_key);
        key_writer.write_u16::<LittleEndian>(encoded.keylen)?;
        key_writer.write_all(encoded.tail)?;
        key_writer.write_u64::<LittleEndian>(data_offset)?;
        key_writer.write_u32::<LittleEndian>(data_len)?;
        block_len += ENTRY_OVERHEAD + encoded.tail.len();

        // Tombstones occupy no bytes in the data file.
        if value.is_some() {
            data_offset += data_len as u64;
        }

        prev_key.clear();
        prev_key.extend_from_slice(&key);
    }

    if block_len > 0 {
        key_writer.write_u16::<LittleEndian>(END_OF_BLOCK)?;
        key_writer.write_all(&zeros[..BLOCK_SIZE - block_len - 2])?;
    }

    key_writer.flush()?;
    data_writer.flush()?;

    if entry_count == 0 {
        return Err(Error::EmptySegment);
    }

    Ok(key_index)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
