//! In-memory mutable segment backed by a concurrent skip list.
//!
//! Every transaction that writes owns one of these. The skip list supports
//! concurrent readers without locks, keeps entries in comparator order, and
//! stores tombstones as `None` values so that a removal can hide older values
//! in the table once the segment reaches the table's list. The segment is
//! sealed at commit; writes after sealing fail with `Error::ReadOnly`.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::compare::KeyCompare;
use crate::error::{Error, Result};

use super::{Entry, LookupIterator};

/// A skip-list key that delegates its ordering to the table's comparator.
struct MapKey {
    bytes: Vec<u8>,
    compare: Arc<dyn KeyCompare>,
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.compare.equal(&self.bytes, &other.bytes)
    }
}

impl Eq for MapKey {}

impl PartialOrd for MapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MapKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare.compare(&self.bytes, &other.bytes)
    }
}

/// In-memory sorted segment. Values are `Option<Vec<u8>>` with `None` marking
/// a tombstone.
pub struct MemorySegment {
    map: SkipMap<MapKey, Option<Vec<u8>>>,
    compare: Arc<dyn KeyCompare>,
    sealed: AtomicBool,
}

impl MemorySegment {
    pub fn new(compare: Arc<dyn KeyCompare>) -> Self {
        Self {
            map: SkipMap::new(),
            compare,
            sealed: AtomicBool::new(false),
        }
    }

    fn map_key(&self, bytes: Vec<u8>) -> MapKey {
        MapKey {
            bytes,
            compare: self.compare.clone(),
        }
    }

    fn insert(&self, key: Vec<u8>, value: Option<Vec<u8>>) -> Result<()> {
        if self.sealed.load(AtomicOrdering::SeqCst) {
            return Err(Error::ReadOnly);
        }
        self.map.insert(self.map_key(key), value);
        Ok(())
    }

    /// Inserts or updates a key-value pair.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.insert(key, Some(value))
    }

    /// Records a tombstone for the key and returns this segment's prior value
    /// for it, if any.
    pub fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let probe = self.map_key(key.to_vec());
        let prior = self.map.get(&probe).and_then(|entry| entry.value().clone());
        self.insert(key.to_vec(), None)?;
        Ok(prior)
    }

    /// Looks the key up in this segment alone. `None` means the key was never
    /// written here; `Some(None)` means it was removed here.
    pub fn get(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        let probe = self.map_key(key.to_vec());
        self.map.get(&probe).map(|entry| entry.value().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Seals the segment against further writes. Called when the owning
    /// transaction commits.
    pub fn seal(&self) {
        self.sealed.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(AtomicOrdering::SeqCst)
    }

    /// Returns an iterator over a snapshot of the entries with
    /// `lower <= key <= upper`, tombstones included. The snapshot is taken
    /// eagerly, so later writes to the segment do not affect it.
    pub fn lookup(&self, lower: Option<&[u8]>, upper: Option<&[u8]>) -> MemorySegmentIterator {
        let start = match lower {
            Some(key) => Bound::Included(self.map_key(key.to_vec())),
            None => Bound::Unbounded,
        };
        let end = match upper {
            Some(key) => Bound::Included(self.map_key(key.to_vec())),
            None => Bound::Unbounded,
        };
        let entries: Vec<Entry> = self
            .map
            .range((start, end))
            .map(|entry| (entry.key().bytes.clone(), entry.value().clone()))
            .collect();
        MemorySegmentIterator {
            entries: entries.into_iter().peekable(),
        }
    }
}

/// Snapshot iterator over a memory segment.
pub struct MemorySegmentIterator {
    entries: Peekable<std::vec::IntoIter<Entry>>,
}

impl LookupIterator for MemorySegmentIterator {
    fn next_entry(&mut self) -> Result<Option<Entry>> {
        Ok(self.entries.next())
    }

    fn peek_key(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.peek().map(|(key, _)| key.clone()))
    }
}
