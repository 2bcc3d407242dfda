//! K-way merge over segment iterators.
//!
//! Scans and compaction both need one ordered stream out of several sorted
//! segments. A min-heap holds the head entry of each source; the smallest key
//! wins, and when several sources hold the same key the newest one (lowest
//! source index) wins and the older duplicates are dropped as they surface.
//! Tombstones flow through the merge like any other entry; `TombstoneFilter`
//! strips them where the caller may (public scans, and compaction of the
//! oldest segments).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::compare::KeyCompare;
use crate::error::Result;

use super::{Entry, LookupIterator};

struct HeapEntry {
    key: Vec<u8>,
    value: Option<Vec<u8>>,
    source: usize,
    compare: Arc<dyn KeyCompare>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.compare.equal(&self.key, &other.key)
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on both fields: BinaryHeap is a max-heap, and the merge
        // must pop the smallest key, newest source first on equal keys.
        match self.compare.compare(&self.key, &other.key) {
            Ordering::Equal => self.source.cmp(&other.source).reverse(),
            order => order.reverse(),
        }
    }
}

/// Merges several ordered iterators into one ordered stream, yielding each
/// key once with the newest source's entry. Sources are given newest first.
pub struct MergeIterator {
    iterators: Vec<Box<dyn LookupIterator>>,
    heap: BinaryHeap<HeapEntry>,
    last_key: Option<Vec<u8>>,
    pending: Option<Entry>,
    compare: Arc<dyn KeyCompare>,
}

impl MergeIterator {
    pub fn new(
        mut iterators: Vec<Box<dyn LookupIterator>>,
        compare: Arc<dyn KeyCompare>,
    ) -> Result<Self> {
        let mut heap = BinaryHeap::new();
        for (source, iterator) in iterators.iter_mut().enumerate() {
            if let Some((key, value)) = iterator.next_entry()? {
                heap.push(HeapEntry {
                    key,
                    value,
                    source,
                    compare: compare.clone(),
                });
            }
        }
        Ok(Self {
            iterators,
            heap,
            last_key: None,
            pending: None,
            compare,
        })
    }

    fn refill(&mut self, source: usize) -> Result<()> {
        if let Some((key, value)) = self.iterators[source].next_entry()? {
            self.heap.push(HeapEntry {
                key,
                value,
                source,
                compare: self.compare.clone(),
            });
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<Entry>> {
        while let Some(entry) = self.heap.pop() {
            let HeapEntry {
                key, value, source, ..
            } = entry;
            self.refill(source)?;

            // An equal key from an older source was already yielded.
            if let Some(last) = &self.last_key {
                if self.compare.equal(last, &key) {
                    continue;
                }
            }
            self.last_key = Some(key.clone());
            return Ok(Some((key, value)));
        }
        Ok(None)
    }
}

impl LookupIterator for MergeIterator {
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

/// Drops tombstones from an entry stream. Applied to public scans, and to
/// compaction output when nothing older than the merged segments exists.
pub struct TombstoneFilter<I: LookupIterator> {
    inner: I,
    pending: Option<Entry>,
}

impl<I: LookupIterator> TombstoneFilter<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            pending: None,
        }
    }

    fn advance(&mut self) -> Result<Option<Entry>> {
        while let Some((key, value)) = self.inner.next_entry()? {
            if value.is_some() {
                return Ok(Some((key, value)));
            }
        }
        Ok(None)
    }
}

impl<I: LookupIterator> LookupIterator for TombstoneFilter<I> {
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

    fn memory_segment(entries: &[(&[u8], Option<&[u8]>)]) -> MemorySegment {
        let segment = MemorySegment::new(Arc::new(DefaultKeyCompare));
        for (key, value) in entries {
            match value {
                Some(value) => segment
                    .put(key.to_vec(), value.to_vec())
                    .expect("Put failed"),
                None => {
                    segment.remove(key).expect("Remove failed");
                }
            }
        }
        segment
    }

    fn collect(mut itr: impl LookupIterator) -> Vec<Entry> {
        let mut entries = Vec::new();
        while let Some(entry) = itr.next_entry().expect("Iteration failed") {
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn test_merge_interleaves_in_order() {
        let newer = memory_segment(&[(b"b", Some(b"2")), (b"d", Some(b"4"))]);
        let older = memory_segment(&[(b"a", Some(b"1")), (b"c", Some(b"3"))]);

        let merge = MergeIterator::new(
            vec![
                Box::new(newer.lookup(None, None)),
                Box::new(older.lookup(None, None)),
            ],
            Arc::new(DefaultKeyCompare),
        )
        .expect("Failed to create merge");

        let keys: Vec<Vec<u8>> = collect(merge).into_iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }

    #[test]
    fn test_newest_source_wins_equal_keys() {
        let newer = memory_segment(&[(b"k", Some(b"new"))]);
        let older = memory_segment(&[(b"k", Some(b"old")), (b"z", Some(b"9"))]);

        let merge = MergeIterator::new(
            vec![
                Box::new(newer.lookup(None, None)),
                Box::new(older.lookup(None, None)),
            ],
            Arc::new(DefaultKeyCompare),
        )
        .expect("Failed to create merge");

        assert_eq!(
            collect(merge),
            vec![
                (b"k".to_vec(), Some(b"new".to_vec())),
                (b"z".to_vec(), Some(b"9".to_vec())),
            ]
        );
    }

    #[test]
    fn test_tombstone_shadows_older_value() {
        let newer = memory_segment(&[(b"k", None)]);
        let older = memory_segment(&[(b"k", Some(b"old"))]);

        let merge = MergeIterator::new(
            vec![
                Box::new(newer.lookup(None, None)),
                Box::new(older.lookup(None, None)),
            ],
            Arc::new(DefaultKeyCompare),
        )
        .expect("Failed to create merge");

        // The tombstone wins and the old value never surfaces.
        assert_eq!(collect(merge), vec![(b"k".to_vec(), None)]);
    }

    #[test]
    fn test_tombstone_filter() {
        let newer = memory_segment(&[(b"a", None), (b"b", Some(b"2"))]);
        let older = memory_segment(&[(b"a", Some(b"1")), (b"c", None)]);

        let merge = MergeIterator::new(
            vec![
                Box::new(newer.lookup(None, None)),
                Box::new(older.lookup(None, None)),
            ],
            Arc::new(DefaultKeyCompare),
        )
        .expect("Failed to create merge");

        assert_eq!(
            collect(TombstoneFilter::new(merge)),
            vec![(b"b".to_vec(), Some(b"2".to_vec()))]
        );
    }

    #[test]
    fn test_three_way_merge_precedence() {
        let a = memory_segment(&[(b"k", Some(b"newest"))]);
        let b = memory_segment(&[(b"k", Some(b"middle"))]);
        let c = memory_segment(&[(b"k", Some(b"oldest"))]);

        let merge = MergeIterator::new(
            vec![
                Box::new(a.lookup(None, None)),
                Box::new(b.lookup(None, None)),
                Box::new(c.lookup(None, None)),
            ],
            Arc::new(DefaultKeyCompare),
        )
        .expect("Failed to create merge");

        assert_eq!(
            collect(merge),
            vec![(b"k".to_vec(), Some(b"newest".to_vec()))]
        );
    }

    #[test]
    fn test_peek_key_matches_next() {
        let newer = memory_segment(&[(b"b", Some(b"2"))]);
        let older = memory_segment(&[(b"a", Some(b"1"))]);

        let mut merge = MergeIterator::new(
            vec![
                Box::new(newer.lookup(None, None)),
                Box::new(older.lookup(None, None)),
            ],
            Arc::new(DefaultKeyCompare),
        )
        .expect("Failed to create merge");

        assert_eq!(merge.peek_key().expect("Peek failed"), Some(b"a".to_vec()));
        assert_eq!(merge.peek_key().expect("Peek failed"), Some(b"a".to_vec()));
        let (key, _) = merge
            .next_entry()
            .expect("Iteration failed")
            .expect("Entry");
        assert_eq!(key, b"a");
        assert_eq!(merge.peek_key().expect("Peek failed"), Some(b"b".to_vec()));
    }
}
