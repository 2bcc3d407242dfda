//! Immutable disk segment: the read path over a published key/data file pair.
//!
//! ## File pair layout
//!
//! ```text
//! {table}.keys.{id}                        {table}.data.{id}
//! +--------------------------+             +------------------------+
//! | Block 0 (4096 bytes)     |             | value bytes, raw,      |
//! +--------------------------+             | in key order           |
//! | Block 1 (4096 bytes)     |   ------>   |                        |
//! +--------------------------+   offset,   +------------------------+
//! | ...                      |   length
//! +--------------------------+
//! ```
//!
//! Each key block holds prefix-compressed entries (see `codec`) terminated by
//! an end-of-block marker; every entry carries the offset and length of its
//! value in the data file. The data file has no framing of its own.
//!
//! A point lookup narrows to a band of blocks via the sparse in-memory key
//! index, binary-searches the band on block first keys (which are never
//! compressed), and scans the chosen block linearly. Range scans start from
//! the block found for the lower bound and decode forward, resetting the
//! prefix-decompression state at every block boundary.
//!
//! Both file handles are shared by concurrent readers; all reads are
//! positional, so no cursor state exists to race on.

use std::cmp::Ordering;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::compare::KeyCompare;
use crate::error::{Error, Result};

use super::codec::{self, BLOCK_SIZE, END_OF_BLOCK, MAX_KEY_SIZE, REMOVED_DATA_LEN};
use super::{Entry, LookupIterator};

/// An immutable, opened segment file pair with its sparse key index.
pub struct DiskSegment {
    id: u64,
    key_file: File,
    data_file: File,
    key_path: PathBuf,
    data_path: PathBuf,
    key_blocks: u64,
    /// First key of every Nth block. `None` when reconstruction failed;
    /// lookups then binary-search the full block range.
    key_index: Option<Vec<Vec<u8>>>,
    key_index_interval: u64,
    compare: Arc<dyn KeyCompare>,
}

impl DiskSegment {
    /// Opens a committed segment pair. A sparse index handed off by the
    /// writer is used as-is; otherwise one is rebuilt by reading the first
    /// key of every Nth block.
    pub fn open(
        key_path: &Path,
        data_path: &Path,
        key_index: Option<Vec<Vec<u8>>>,
        compare: Arc<dyn KeyCompare>,
        key_index_interval: usize,
    ) -> Result<DiskSegment> {
        let key_file = File::open(key_path)?;
        let data_file = File::open(data_path)?;
        let key_size = key_file.metadata()?.len();
        let key_blocks = key_size.div_ceil(BLOCK_SIZE as u64);
        let interval = key_index_interval.max(1) as u64;

        let key_index = match key_index {
            Some(index) => Some(index),
            None => load_key_index(&key_file, key_blocks, interval),
        };

        Ok(DiskSegment {
            id: segment_id(key_path),
            key_file,
            data_file,
            key_path: key_path.to_path_buf(),
            data_path: data_path.to_path_buf(),
            key_blocks,
            key_index,
            key_index_interval: interval,
            compare,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub(crate) fn key_blocks(&self) -> u64 {
        self.key_blocks
    }

    pub(crate) fn key_index(&self) -> Option<&[Vec<u8>]> {
        self.key_index.as_deref()
    }

    /// Looks the key up in this segment. `Ok(None)` means the segment holds
    /// no entry for the key; `Ok(Some(None))` means it holds a tombstone.
    pub fn get(&self, key: &[u8]) -> Result<Option<Option<Vec<u8>>>> {
        match self.search(key)? {
            None => Ok(None),
            Some((_, REMOVED_DATA_LEN)) => Ok(Some(None)),
            Some((offset, len)) => {
                let mut value = vec![0u8; len as usize];
                read_exact_at(&self.data_file, &mut value, offset)?;
                Ok(Some(Some(value)))
            }
        }
    }

    /// Returns an iterator over entries with `lower <= key <= upper`. The
    /// start block is located with the block binary search; entries before
    /// `lower` within it are skipped during iteration.
    pub fn lookup(
        self: Arc<Self>,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
    ) -> Result<DiskSegmentIterator> {
        let mut buffer = vec![0u8; BLOCK_SIZE];
        let mut block = 0u64;
        if self.key_blocks == 0 {
            return Ok(DiskSegmentIterator::finished(self));
        }
        if let Some(lower) = lower {
            block = self.search_blocks(0, self.key_blocks - 1, lower, &mut buffer)?;
        }
        read_block(&self.key_file, block, &mut buffer)?;
        Ok(DiskSegmentIterator {
            segment: self,
            lower: lower.map(<[u8]>::to_vec),
            upper: upper.map(<[u8]>::to_vec),
            buffer,
            block,
            offset: 0,
            prev_key: Vec::new(),
            pending: None,
            finished: false,
        })
    }

    /// Locates the key's data pointer: sparse-index narrowing, block binary
    /// search, then a linear scan of the chosen block.
    fn search(&self, key: &[u8]) -> Result<Option<(u64, u32)>> {
        if self.key_blocks == 0 {
            return Ok(None);
        }
        let mut buffer = vec![0u8; BLOCK_SIZE];
        let mut low = 0u64;
        let mut high = self.key_blocks - 1;

        if let Some(index) = &self.key_index {
            // First indexed key greater than the target bounds the band.
            let pos = index.partition_point(|indexed| !self.compare.less(key, indexed));
            if pos == 0 {
                // Below the segment's first key: cannot exist here.
                return Ok(None);
            }
            low = (pos as u64 - 1) * self.key_index_interval;
            high = (low + self.key_index_interval).min(self.key_blocks - 1);
        }

        let block = self.search_blocks(low, high, key, &mut buffer)?;
        self.scan_block(block, key, &mut buffer)
    }

    /// Binary search over `[low, high]` on block first keys, returning the
    /// block whose first key is the greatest less than or equal to the
    /// target. Block first keys are never compressed.
    fn search_blocks(&self, mut low: u64, mut high: u64, key: &[u8], buffer: &mut [u8]) -> Result<u64> {
        while high - low > 1 {
            let mid = (high - low) / 2 + low;
            let first = self.read_first_key(mid, buffer)?;
            if self.compare.less(key, &first) {
                high = mid;
            } else {
                low = mid;
            }
        }
        // The key is in the low or the high block; check the high block.
        let first = self.read_first_key(high, buffer)?;
        if self.compare.less(key, &first) {
            Ok(low)
        } else {
            Ok(high)
        }
    }

    fn read_first_key(&self, block: u64, buffer: &mut [u8]) -> Result<Vec<u8>> {
        read_block(&self.key_file, block, buffer)?;
        let keylen = LittleEndian::read_u16(buffer);
        if keylen == END_OF_BLOCK {
            return Err(Error::InvalidKeyEncoding(format!(
                "block {block} starts with an end-of-block marker"
            )));
        }
        let (prefix_len, len) = codec::decode_key_len(keylen)?;
        if prefix_len != 0 {
            return Err(Error::InvalidKeyEncoding(format!(
                "block {block} starts with a compressed key"
            )));
        }
        Ok(buffer[2..2 + len].to_vec())
    }

    /// Scans a single block for the key, decompressing as it goes. Returns
    /// the data pointer, or `None` once a greater key or the end of the
    /// block proves the key absent.
    fn scan_block(&self, block: u64, key: &[u8], buffer: &mut [u8]) -> Result<Option<(u64, u32)>> {
        read_block(&self.key_file, block, buffer)?;

        let mut offset = 0usize;
        let mut prev_key: Vec<u8> = Vec::new();
        loop {
            let (entry_key, data_offset, data_len, next_offset) =
                decode_entry(buffer, offset, &prev_key)?;
            let Some(entry_key) = entry_key else {
                return Ok(None); // end of block
            };
            match self.compare.compare(&entry_key, key) {
                Ordering::Equal => return Ok(Some((data_offset, data_len))),
                Ordering::Greater => return Ok(None),
                Ordering::Less => {}
            }
            prev_key = entry_key;
            offset = next_offset;
        }
    }
}

/// Decodes the entry at `offset`, returning `(key, data_offset, data_len,
/// next_offset)`, with `key == None` at the end-of-block marker.
#[allow(clippy::type_complexity)]
fn decode_entry(
    buffer: &[u8],
    offset: usize,
    prev_key: &[u8],
) -> Result<(Option<Vec<u8>>, u64, u32, usize)> {
    if offset + 2 > BLOCK_SIZE {
        return Err(Error::InvalidKeyEncoding(
            "block is not terminated".to_string(),
        ));
    }
    let keylen = LittleEndian::read_u16(&buffer[offset..]);
    if keylen == END_OF_BLOCK {
        return Ok((None, 0, 0, offset));
    }
    let (prefix_len, tail_len) = codec::decode_key_len(keylen)?;
    let next_offset = offset + 2 + tail_len + 12;
    if next_offset > BLOCK_SIZE {
        return Err(Error::InvalidKeyEncoding(
            "entry overruns its block".to_string(),
        ));
    }
    let tail = &buffer[offset + 2..offset + 2 + tail_len];
    let key = codec::decode_key(tail, prev_key, prefix_len)?;
    let data_offset = LittleEndian::read_u64(&buffer[offset + 2 + tail_len..]);
    let data_len = LittleEndian::read_u32(&buffer[offset + 2 + tail_len + 8..]);
    Ok((Some(key), data_offset, data_len, next_offset))
}

/// Rebuilds the sparse index by reading the first key of every Nth block.
/// Returns `None` when a block read fails; lookups fall back to searching
/// the full block range.
fn load_key_index(key_file: &File, key_blocks: u64, interval: u64) -> Option<Vec<Vec<u8>>> {
    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut index = Vec::new();
    let mut block = 0u64;
    while block < key_blocks {
        if read_block(key_file, block, &mut buffer).is_err() {
            return None;
        }
        let keylen = LittleEndian::read_u16(&buffer);
        if keylen == END_OF_BLOCK {
            break;
        }
        let len = keylen as usize;
        if len == 0 || len > MAX_KEY_SIZE {
            return None;
        }
        index.push(buffer[2..2 + len].to_vec());
        block += interval;
    }
    Some(index)
}

/// Parses the segment id from the trailing filename component after the last
/// `.`, as in `{table}.keys.{id}`.
pub(crate) fn segment_id(path: &Path) -> u64 {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit('.').next())
        .and_then(|id| id.parse().ok())
        .unwrap_or(0)
}

fn read_block(file: &File, block: u64, buffer: &mut [u8]) -> Result<()> {
    read_exact_at(file, buffer, block * BLOCK_SIZE as u64)
}

#[cfg(unix)]
fn read_exact_at(file: &File, buffer: &mut [u8], offset: u64) -> Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buffer, offset).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ShortRead
        } else {
            err.into()
        }
    })
}

#[cfg(windows)]
fn read_exact_at(file: &File, buffer: &mut [u8], offset: u64) -> Result<()> {
    use std::os::windows::fs::FileExt;
    let mut done = 0usize;
    while done < buffer.len() {
        match file.seek_read(&mut buffer[done..], offset + done as u64) {
            Ok(0) => return Err(Error::ShortRead),
            Ok(n) => done += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Ordered iterator over a disk segment's entries within optional inclusive
/// bounds. Holds one block in memory at a time.
pub struct DiskSegmentIterator {
    segment: Arc<DiskSegment>,
    lower: Option<Vec<u8>>,
    upper: Option<Vec<u8>>,
    buffer: Vec<u8>,
    block: u64,
    offset: usize,
    prev_key: Vec<u8>,
    pending: Option<Entry>,
    finished: bool,
}

impl DiskSegmentIterator {
    fn finished(segment: Arc<DiskSegment>) -> Self {
        Self {
            segment,
            lower: None,
            upper: None,
            buffer: Vec::new(),
            block: 0,
            offset: 0,
            prev_key: Vec::new(),
            pending: None,
            finished: true,
        }
    }

    fn advance(&mut self) -> Result<Option<Entry>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let (key, data_offset, data_len, next_offset) =
                decode_entry(&self.buffer, self.offset, &self.prev_key)?;
            let Some(key) = key else {
                // End of block: move to the next one, resetting the
                // prefix-decompression state.
                self.block += 1;
                if self.block == self.segment.key_blocks {
                    self.finished = true;
                    return Ok(None);
                }
                read_block(&self.segment.key_file, self.block, &mut self.buffer)?;
                self.offset = 0;
                self.prev_key.clear();
                continue;
            };
            self.offset = next_offset;
            self.prev_key.clear();
            self.prev_key.extend_from_slice(&key);

            if let Some(lower) = &self.lower {
                if self.segment.compare.less(&key, lower) {
                    continue;
                }
            }
            if let Some(upper) = &self.upper {
                if self.segment.compare.less(upper, &key) {
                    self.finished = true;
                    return Ok(None);
                }
            }

            let value = if data_len == REMOVED_DATA_LEN {
                None
            } else {
                let mut value = vec![0u8; data_len as usize];
                read_exact_at(&self.segment.data_file, &mut value, data_offset)?;
                Some(value)
            };
            return Ok(Some((key, value)));
        }
    }
}

impl LookupIterator for DiskSegmentIterator {
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        self.advance()
    }

    fn peek_key(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pending.is_none() {
            self.pending = self.advance()?;
        }
        Ok(self.pending.as_ref().map(|(key, _)| key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::DefaultKeyCompare;
    use crate::segment::memory::MemorySegment;
    use crate::segment::writer::write_and_load_segment;
    use std::fs;

    fn write_segment(
        dir: &Path,
        id: u64,
        entries: &[(Vec<u8>, Option<Vec<u8>>)],
    ) -> Arc<DiskSegment> {
        let memory = MemorySegment::new(Arc::new(DefaultKeyCompare));
        for (key, value) in entries {
            match value {
                Some(value) => memory
                    .put(key.clone(), value.clone())
                    .expect("Put failed"),
                None => {
                    memory.remove(key).expect("Remove failed");
                }
            }
        }
        let key_path = dir.join(format!("t.keys.{id}"));
        let data_path = dir.join(format!("t.data.{id}"));
        let mut itr = memory.lookup(None, None);
        Arc::new(
            write_and_load_segment(
                &key_path,
                &data_path,
                &mut itr,
                Arc::new(DefaultKeyCompare),
                2,
            )
            .expect("Failed to write segment"),
        )
    }

    fn numbered_entries(count: u32) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        (0..count)
            .map(|i| {
                (
                    format!("key{:05}", i).into_bytes(),
                    Some(format!("v{}", i).into_bytes()),
                )
            })
            .collect()
    }

    #[test]
    fn test_get_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let segment = write_segment(
            dir.path(),
            1,
            &[
                (b"alpha".to_vec(), Some(b"1".to_vec())),
                (b"bravo".to_vec(), Some(b"2".to_vec())),
                (b"charlie".to_vec(), Some(b"".to_vec())),
            ],
        );

        assert_eq!(
            segment.get(b"alpha").expect("Get failed"),
            Some(Some(b"1".to_vec()))
        );
        assert_eq!(
            segment.get(b"bravo").expect("Get failed"),
            Some(Some(b"2".to_vec()))
        );
        // Empty values round-trip.
        assert_eq!(
            segment.get(b"charlie").expect("Get failed"),
            Some(Some(Vec::new()))
        );
        assert_eq!(segment.get(b"delta").expect("Get failed"), None);
        // Below the first key: the sparse index proves absence.
        assert_eq!(segment.get(b"aaaa").expect("Get failed"), None);
    }

    #[test]
    fn test_get_tombstone() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let segment = write_segment(
            dir.path(),
            1,
            &[
                (b"alpha".to_vec(), Some(b"1".to_vec())),
                (b"bravo".to_vec(), None),
            ],
        );

        assert_eq!(segment.get(b"bravo").expect("Get failed"), Some(None));
    }

    #[test]
    fn test_multi_block_get_every_key() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let entries = numbered_entries(10_000);
        let segment = write_segment(dir.path(), 1, &entries);
        assert!(segment.key_blocks() > 2);

        for (key, value) in entries.iter().step_by(97) {
            assert_eq!(
                segment.get(key).expect("Get failed"),
                Some(value.clone()),
                "Mismatch for key {:?}",
                String::from_utf8_lossy(key)
            );
        }
        assert_eq!(segment.get(b"key99999").expect("Get failed"), None);
    }

    #[test]
    fn test_bounded_scan() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let segment = write_segment(dir.path(), 1, &numbered_entries(10_000));

        let mut itr = segment
            .lookup(Some(b"key00100"), Some(b"key00102"))
            .expect("Failed to create iterator");
        let mut found = Vec::new();
        while let Some((key, value)) = itr.next_entry().expect("Iteration failed") {
            found.push((key, value.expect("Unexpected tombstone")));
        }
        assert_eq!(
            found,
            vec![
                (b"key00100".to_vec(), b"v100".to_vec()),
                (b"key00101".to_vec(), b"v101".to_vec()),
                (b"key00102".to_vec(), b"v102".to_vec()),
            ]
        );
    }

    #[test]
    fn test_full_scan_is_ordered_and_complete() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let entries = numbered_entries(10_000);
        let segment = write_segment(dir.path(), 1, &entries);

        let mut itr = segment
            .lookup(None, None)
            .expect("Failed to create iterator");
        let mut count = 0usize;
        let mut last: Option<Vec<u8>> = None;
        while let Some((key, _)) = itr.next_entry().expect("Iteration failed") {
            if let Some(last) = &last {
                assert!(key > *last, "Keys not strictly ascending");
            }
            last = Some(key);
            count += 1;
        }
        assert_eq!(count, entries.len());
    }

    #[test]
    fn test_scan_agrees_with_get() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let entries = numbered_entries(3_000);
        let segment = write_segment(dir.path(), 1, &entries);

        let mut itr = segment
            .clone()
            .lookup(None, None)
            .expect("Failed to create iterator");
        while let Some((key, value)) = itr.next_entry().expect("Iteration failed") {
            assert_eq!(segment.get(&key).expect("Get failed"), Some(value));
        }
    }

    #[test]
    fn test_prefix_compression_block_bytes() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_segment(
            dir.path(),
            1,
            &[
                (b"alpha".to_vec(), Some(b"x".to_vec())),
                (b"alphabet".to_vec(), Some(b"y".to_vec())),
            ],
        );

        let block = fs::read(dir.path().join("t.keys.1")).expect("Failed to read key file");
        assert_eq!(block.len(), BLOCK_SIZE);

        // First entry: uncompressed "alpha", value at offset 0, length 1.
        assert_eq!(LittleEndian::read_u16(&block[0..]), 5);
        assert_eq!(&block[2..7], b"alpha");
        assert_eq!(LittleEndian::read_u64(&block[7..]), 0);
        assert_eq!(LittleEndian::read_u32(&block[15..]), 1);

        // Second entry: prefix length 5, tail "bet".
        assert_eq!(LittleEndian::read_u16(&block[19..]), 0x8503);
        assert_eq!(&block[21..24], b"bet");
        assert_eq!(LittleEndian::read_u64(&block[24..]), 1);
        assert_eq!(LittleEndian::read_u32(&block[32..]), 1);

        // Then the end-of-block marker and zero padding.
        assert_eq!(LittleEndian::read_u16(&block[36..]), END_OF_BLOCK);
        assert!(block[38..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reopen_rebuilds_key_index() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let entries = numbered_entries(5_000);
        let written = write_segment(dir.path(), 1, &entries);
        let written_index = written
            .key_index()
            .expect("Writer must hand off an index")
            .to_vec();

        let reopened = DiskSegment::open(
            &dir.path().join("t.keys.1"),
            &dir.path().join("t.data.1"),
            None,
            Arc::new(DefaultKeyCompare),
            2,
        )
        .expect("Failed to reopen segment");

        assert_eq!(reopened.id(), 1);
        assert_eq!(
            reopened.key_index().expect("Expected a rebuilt index"),
            written_index.as_slice()
        );
        for (key, value) in entries.iter().step_by(131) {
            assert_eq!(reopened.get(key).expect("Get failed"), Some(value.clone()));
        }
    }

    #[test]
    fn test_truncated_key_file_fails_with_short_read() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let segment = write_segment(dir.path(), 1, &numbered_entries(5_000));
        let blocks = segment.key_blocks();
        drop(segment);

        let key_path = dir.path().join("t.keys.1");
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&key_path)
            .expect("Failed to open key file");
        file.set_len((blocks - 1) * BLOCK_SIZE as u64 + 50)
            .expect("Failed to truncate");
        drop(file);

        let reopened = Arc::new(
            DiskSegment::open(
                &key_path,
                &dir.path().join("t.data.1"),
                None,
                Arc::new(DefaultKeyCompare),
                2,
            )
            .expect("Failed to reopen segment"),
        );
        let mut itr = reopened
            .lookup(None, None)
            .expect("Failed to create iterator");
        let result = loop {
            match itr.next_entry() {
                Ok(Some(_)) => continue,
                other => break other,
            }
        };
        assert_eq!(result, Err(Error::ShortRead));
    }

    #[test]
    fn test_peek_key_is_idempotent() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let segment = write_segment(
            dir.path(),
            1,
            &[
                (b"alpha".to_vec(), Some(b"1".to_vec())),
                (b"bravo".to_vec(), Some(b"2".to_vec())),
            ],
        );

        let mut itr = segment
            .lookup(None, None)
            .expect("Failed to create iterator");
        assert_eq!(
            itr.peek_key().expect("Peek failed"),
            Some(b"alpha".to_vec())
        );
        assert_eq!(
            itr.peek_key().expect("Peek failed"),
            Some(b"alpha".to_vec())
        );
        let (key, _) = itr.next_entry().expect("Iteration failed").expect("Entry");
        assert_eq!(key, b"alpha");
        assert_eq!(
            itr.peek_key().expect("Peek failed"),
            Some(b"bravo".to_vec())
        );
    }

    #[test]
    fn test_scan_includes_tombstones() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let segment = write_segment(
            dir.path(),
            1,
            &[
                (b"alpha".to_vec(), Some(b"1".to_vec())),
                (b"bravo".to_vec(), None),
                (b"charlie".to_vec(), Some(b"3".to_vec())),
            ],
        );

        let mut itr = segment
            .lookup(None, None)
            .expect("Failed to create iterator");
        let mut entries = Vec::new();
        while let Some(entry) = itr.next_entry().expect("Iteration failed") {
            entries.push(entry);
        }
        assert_eq!(
            entries,
            vec![
                (b"alpha".to_vec(), Some(b"1".to_vec())),
                (b"bravo".to_vec(), None),
                (b"charlie".to_vec(), Some(b"3".to_vec())),
            ]
        );
    }

    #[test]
    fn test_segment_id_parsing() {
        assert_eq!(segment_id(Path::new("/db/accounts.keys.42")), 42);
        assert_eq!(segment_id(Path::new("accounts.data.7")), 7);
        assert_eq!(segment_id(Path::new("accounts.keys.x")), 0);
    }
}
