//! Per-table transactions.
//!
//! A transaction reads a consistent view of its table (its own writes first,
//! then the table's segments newest to oldest) and buffers writes in a
//! private memory segment created on first write. Committing seals that
//! segment, appends it to the table's segment list as the newest segment, and
//! hands it to a background writer that replaces it in place with the
//! published disk segment. Rolling back, or dropping the transaction without
//! committing, discards the buffered writes.

use std::sync::Arc;

use crate::db::{Core, InternalTable};
use crate::error::{Error, Result};
use crate::segment::codec::{MAX_KEY_SIZE, REMOVED_DATA_LEN};
use crate::segment::memory::MemorySegment;
use crate::segment::merge::{MergeIterator, TombstoneFilter};
use crate::segment::{LookupIterator, SegmentHandle};

/// A transaction on a single table. Obtained from `Database::begin`;
/// finished with [`commit`](Transaction::commit),
/// [`commit_sync`](Transaction::commit_sync) or
/// [`rollback`](Transaction::rollback). Dropping an unfinished transaction
/// rolls it back.
pub struct Transaction {
    core: Arc<Core>,
    table: Arc<InternalTable>,
    memory: Option<Arc<MemorySegment>>,
    done: bool,
}

impl Transaction {
    pub(crate) fn new(core: Arc<Core>, table: Arc<InternalTable>) -> Self {
        Self {
            core,
            table,
            memory: None,
            done: false,
        }
    }

    /// Returns the value for a key, or `None` when the key is absent or
    /// removed. The transaction's own writes win over committed data.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(memory) = &self.memory {
            if let Some(hit) = memory.get(key) {
                return Ok(hit);
            }
        }
        for segment in self.table.snapshot().iter().rev() {
            if let Some(hit) = segment.get(key)? {
                return Ok(hit);
            }
        }
        Ok(None)
    }

    /// Inserts or updates a key.
    pub fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        validate_value(&value)?;
        self.memory_segment().put(key.to_vec(), value)
    }

    /// Removes a key, returning its prior value as seen by this transaction.
    pub fn remove(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let prior = self.get(key)?;
        self.memory_segment().remove(key)?;
        Ok(prior)
    }

    /// Returns an ordered iterator over live entries with
    /// `lower <= key <= upper`; either bound may be absent. Removed keys do
    /// not appear.
    pub fn lookup(&self, lower: Option<&[u8]>, upper: Option<&[u8]>) -> Result<Scan> {
        let mut iterators: Vec<Box<dyn LookupIterator>> = Vec::new();
        if let Some(memory) = &self.memory {
            iterators.push(Box::new(memory.lookup(lower, upper)));
        }
        for segment in self.table.snapshot().iter().rev() {
            iterators.push(segment.lookup(lower, upper)?);
        }
        let merge = MergeIterator::new(iterators, self.table.compare.clone())?;
        Ok(Scan {
            inner: TombstoneFilter::new(merge),
        })
    }

    /// Commits the transaction. Its writes become immediately visible to new
    /// transactions; writing them to disk happens on a background thread.
    pub fn commit(mut self) -> Result<()> {
        self.finish(false)
    }

    /// Commits the transaction and waits until its writes are on disk.
    pub fn commit_sync(mut self) -> Result<()> {
        self.finish(true)
    }

    /// Discards the transaction's writes.
    pub fn rollback(mut self) -> Result<()> {
        self.done = true;
        self.memory = None;
        self.core.end_transaction();
        Ok(())
    }

    fn finish(&mut self, sync: bool) -> Result<()> {
        self.done = true;
        let result = match self.memory.take() {
            None => Ok(()), // read-only transaction
            Some(memory) => {
                memory.seal();
                // Allocating the id inside the critical section keeps id
                // order equal to commit order, whatever order the background
                // flushes run in.
                let id = {
                    let mut state = self.table.state.lock().unwrap();
                    let id = self.core.next_segment_id();
                    state.segments.push(SegmentHandle::Memory(memory.clone()));
                    id
                };
                if sync {
                    self.core.flush_segment(&self.table, &memory, id)
                } else {
                    self.spawn_flush(memory, id)
                }
            }
        };
        self.core.end_transaction();
        result
    }

    fn spawn_flush(&self, memory: Arc<MemorySegment>, id: u64) -> Result<()> {
        let core = self.core.clone();
        let table = self.table.clone();
        let handle = std::thread::Builder::new()
            .name("cinderdb-flush".to_string())
            .spawn(move || {
                if let Err(err) = core.flush_segment(&table, &memory, id) {
                    // The in-memory segment stays in the list; its data
                    // remains readable and close will not lose it silently.
                    tracing::error!(
                        table = %table.name,
                        error = %err,
                        "Background flush failed"
                    );
                }
            })?;
        self.core.track_writer(handle);
        Ok(())
    }

    fn memory_segment(&mut self) -> &Arc<MemorySegment> {
        let compare = self.table.compare.clone();
        self.memory
            .get_or_insert_with(|| Arc::new(MemorySegment::new(compare)))
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            self.core.end_transaction();
        }
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::EmptyKey);
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(Error::KeyTooLarge(key.len()));
    }
    Ok(())
}

// Values are bounded just below the removed-key sentinel: a length equal to
// it would read back as a tombstone, and anything longer cannot be encoded
// in the data-length field at all.
fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() >= REMOVED_DATA_LEN as usize {
        return Err(Error::ValueTooLarge(value.len()));
    }
    Ok(())
}

/// An ordered scan over a transaction's view of its table. Yields each live
/// key once with the newest value.
pub struct Scan {
    inner: TombstoneFilter<MergeIterator>,
}

impl Iterator for Scan {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next_entry() {
                Ok(Some((key, Some(value)))) => return Some(Ok((key, value))),
                Ok(Some((_, None))) => continue,
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
