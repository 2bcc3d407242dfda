//! Segments are the building blocks of a table: an ordered set of key/value
//! entries, either mutable in memory (per transaction) or immutable on disk.
//! All of them speak the same iterator contract so that flushing, scanning
//! and compaction can treat them uniformly.

pub mod codec;
pub mod disk;
pub mod memory;
pub mod merge;
pub mod writer;

use std::sync::Arc;

use crate::error::{Error, Result};

use disk::DiskSegment;
use memory::MemorySegment;

/// A key paired with its value. `None` marks a tombstone: the key was removed
/// and hides any older value in the table.
pub type Entry = (Vec<u8>, Option<Vec<u8>>);

/// Ordered iteration over a segment's entries.
///
/// Tombstones are yielded like any other entry so that the merge and the
/// segment writer can see them; callers presenting data to users filter them
/// out. Exhaustion is signalled by `Ok(None)`; iterators are single-threaded.
pub trait LookupIterator: Send {
    /// Advances to the next entry, or returns `Ok(None)` when exhausted.
    fn next_entry(&mut self) -> Result<Option<Entry>>;

    /// Returns the next entry's key without consuming it. Repeated calls
    /// return the same key until `next_entry` is called.
    fn peek_key(&mut self) -> Result<Option<Vec<u8>>>;
}

/// A reference-counted handle to a segment in a table's list. Memory segments
/// accept writes until sealed; disk segments are immutable. Segment resources
/// are released when the last handle (and iterator) drops.
#[derive(Clone)]
pub enum SegmentHandle {
    Memory(Arc<MemorySegment>),
    Disk(Arc<DiskSegment>),
}

impl SegmentHandle {
    /// Looks the key up in this segment alone. `Ok(None)` means the segment
    /// has no entry for the key; `Ok(Some(None))` means it holds a tombstone.
    pub fn get(&self, key: &[u8]) -> Result<Option<Option<Vec<u8>>>> {
        match self {
            SegmentHandle::Memory(segment) => Ok(segment.get(key)),
            SegmentHandle::Disk(segment) => segment.get(key),
        }
    }

    /// Inserts or updates a key. Fails with `Error::ReadOnly` on disk
    /// segments.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        match self {
            SegmentHandle::Memory(segment) => segment.put(key, value),
            SegmentHandle::Disk(_) => Err(Error::ReadOnly),
        }
    }

    /// Records a tombstone for the key, returning the segment's own prior
    /// value. Fails with `Error::ReadOnly` on disk segments.
    pub fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            SegmentHandle::Memory(segment) => segment.remove(key),
            SegmentHandle::Disk(_) => Err(Error::ReadOnly),
        }
    }

    /// Returns an iterator over entries with `lower <= key <= upper`; either
    /// bound may be absent.
    pub fn lookup(
        &self,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
    ) -> Result<Box<dyn LookupIterator>> {
        match self {
            SegmentHandle::Memory(segment) => Ok(Box::new(segment.lookup(lower, upper))),
            SegmentHandle::Disk(segment) => Ok(Box::new(segment.clone().lookup(lower, upper)?)),
        }
    }

    /// The disk segment behind this handle, if it is one.
    pub fn as_disk(&self) -> Option<&Arc<DiskSegment>> {
        match self {
            SegmentHandle::Disk(segment) => Some(segment),
            SegmentHandle::Memory(_) => None,
        }
    }
}
