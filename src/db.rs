//! Database lifecycle: open/create, segment loading, close and removal.
//!
//! A database is a directory holding a `lockfile` plus the committed segment
//! file pairs of its tables. Only one process may own a database at a time
//! (advisory lock on the lockfile); within the process, a single `Database`
//! value is shared across threads. All reads and writes go through
//! per-table transactions obtained with [`Database::begin`].
//!
//! Durability is rename-based: writers publish segments by renaming fully
//! written `.tmp` files into place. Finding a leftover `.tmp` file at open
//! therefore means a writer died mid-publish, and the open fails with
//! `Error::CorruptState` for an operator to resolve.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::compare::{DefaultKeyCompare, KeyCompare};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::flock::FileLock;
use crate::merger;
use crate::segment::disk::DiskSegment;
use crate::segment::memory::MemorySegment;
use crate::segment::writer::write_and_load_segment;
use crate::segment::SegmentHandle;
use crate::transaction::Transaction;

const LOCKFILE: &str = "lockfile";

/// Serializes database open, close and removal process-wide.
static DBLOCK: Mutex<()> = Mutex::new(());

/// A table definition: a name and the comparator ordering its keys.
#[derive(Clone)]
pub struct Table {
    pub name: String,
    pub compare: Arc<dyn KeyCompare>,
}

impl Table {
    /// A table ordered by the default lexicographic comparator.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compare: Arc::new(DefaultKeyCompare),
        }
    }

    /// A table ordered by a custom comparator.
    pub fn with_compare(name: impl Into<String>, compare: Arc<dyn KeyCompare>) -> Self {
        Self {
            name: name.into(),
            compare,
        }
    }
}

pub(crate) struct TableState {
    /// Segments oldest first; the newest occurrence of a key wins.
    pub segments: Vec<SegmentHandle>,
}

/// A table opened within a database: its definition plus the mutable segment
/// list. The lock covers the list only; segments themselves are read without
/// it.
pub(crate) struct InternalTable {
    pub name: String,
    pub compare: Arc<dyn KeyCompare>,
    pub state: Mutex<TableState>,
}

impl InternalTable {
    /// Clones the current segment list; the snapshot is then iterated
    /// lock-free since segments are immutable once listed.
    pub fn snapshot(&self) -> Vec<SegmentHandle> {
        self.state.lock().unwrap().segments.clone()
    }
}

/// Shared database state, held by the `Database` value, every transaction,
/// and the background workers.
pub(crate) struct Core {
    pub config: Config,
    pub tables: HashMap<String, Arc<InternalTable>>,
    open: AtomicBool,
    closing: AtomicBool,
    shutdown: Mutex<bool>,
    shutdown_signal: Condvar,
    next_segment_id: AtomicU64,
    transactions: AtomicUsize,
    lockfile: Mutex<Option<FileLock>>,
    writers: Mutex<Vec<JoinHandle<()>>>,
}

impl Core {
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Sleeps for the merge worker, waking early at shutdown. Returns true
    /// once the database is closing.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let shutdown = self.shutdown.lock().unwrap();
        if *shutdown {
            return true;
        }
        let (shutdown, _) = self
            .shutdown_signal
            .wait_timeout(shutdown, timeout)
            .unwrap();
        *shutdown
    }

    fn signal_shutdown(&self) {
        self.closing.store(true, Ordering::SeqCst);
        *self.shutdown.lock().unwrap() = true;
        self.shutdown_signal.notify_all();
    }

    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        if !self.open.load(Ordering::SeqCst) || self.closing.load(Ordering::SeqCst) {
            self.transactions.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Closed);
        }
        Ok(())
    }

    pub fn end_transaction(&self) {
        self.transactions.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn segment_paths(&self, table: &str, id: u64) -> (PathBuf, PathBuf) {
        (
            self.config.path.join(format!("{table}.keys.{id}")),
            self.config.path.join(format!("{table}.data.{id}")),
        )
    }

    /// Writes a sealed memory segment to disk and swaps it for the resulting
    /// disk segment in the table's list, preserving its position. An empty
    /// segment is simply dropped from the list; on any other error the
    /// placeholder stays and the commit is surfaced to the caller or log.
    ///
    /// The segment id was allocated at commit time, under the table lock, so
    /// ids follow commit order even when background flushes race.
    pub fn flush_segment(
        &self,
        table: &Arc<InternalTable>,
        memory: &Arc<MemorySegment>,
        id: u64,
    ) -> Result<()> {
        let (key_path, data_path) = self.segment_paths(&table.name, id);
        let mut itr = memory.lookup(None, None);
        let result = write_and_load_segment(
            &key_path,
            &data_path,
            &mut itr,
            table.compare.clone(),
            self.config.key_index_interval,
        );

        let mut state = table.state.lock().unwrap();
        let position = state.segments.iter().position(
            |segment| matches!(segment, SegmentHandle::Memory(m) if Arc::ptr_eq(m, memory)),
        );
        match result {
            Ok(segment) => {
                if let Some(position) = position {
                    state.segments[position] = SegmentHandle::Disk(Arc::new(segment));
                }
                tracing::info!(table = %table.name, segment = id, "Flushed memory segment");
                Ok(())
            }
            Err(Error::EmptySegment) => {
                if let Some(position) = position {
                    state.segments.remove(position);
                }
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Registers a background flush thread, reaping any that have finished.
    pub fn track_writer(&self, handle: JoinHandle<()>) {
        let mut writers = self.writers.lock().unwrap();
        let mut index = 0;
        while index < writers.len() {
            if writers[index].is_finished() {
                let _ = writers.swap_remove(index).join();
            } else {
                index += 1;
            }
        }
        writers.push(handle);
    }

    /// Waits for all outstanding background flushes.
    pub fn drain_writers(&self) {
        let handles: Vec<_> = self.writers.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

/// An open database. Obtained via [`Database::open`]; all data access goes
/// through [`Database::begin`].
pub struct Database {
    core: Arc<Core>,
    merge_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// Opens the database directory, loading every registered table's
    /// committed segments. Fails with `Error::NoDatabase` when the directory
    /// is missing and `create_if_missing` is not set, with `Error::InUse`
    /// when another owner holds the lockfile, and with `Error::CorruptState`
    /// when leftover `.tmp` files or half-published segment pairs are found.
    pub fn open(config: Config, tables: Vec<Table>) -> Result<Database> {
        let _guard = DBLOCK.lock().unwrap();

        let path = config.path.clone();
        if !path.is_dir() {
            if !config.create_if_missing || path.exists() {
                return Err(Error::NoDatabase);
            }
            fs::create_dir_all(&path)?;
        }

        let lockfile = FileLock::lock(path.join(LOCKFILE))?;

        let (max_id, mut segment_ids) = scan_segments(&path)?;

        let mut table_map = HashMap::new();
        for table in tables {
            validate_table_name(&table.name)?;
            let ids = segment_ids.remove(&table.name).unwrap_or_default();
            let mut segments = Vec::with_capacity(ids.len());
            for id in ids {
                let (key_path, data_path) = (
                    path.join(format!("{}.keys.{id}", table.name)),
                    path.join(format!("{}.data.{id}", table.name)),
                );
                let segment = DiskSegment::open(
                    &key_path,
                    &data_path,
                    None,
                    table.compare.clone(),
                    config.key_index_interval,
                )?;
                segments.push(SegmentHandle::Disk(Arc::new(segment)));
            }
            let internal = Arc::new(InternalTable {
                name: table.name.clone(),
                compare: table.compare,
                state: Mutex::new(TableState { segments }),
            });
            if table_map.insert(table.name.clone(), internal).is_some() {
                return Err(Error::InvalidTableName(format!(
                    "duplicate table {}",
                    table.name
                )));
            }
        }

        let core = Arc::new(Core {
            config,
            tables: table_map,
            open: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            shutdown: Mutex::new(false),
            shutdown_signal: Condvar::new(),
            next_segment_id: AtomicU64::new(max_id),
            transactions: AtomicUsize::new(0),
            lockfile: Mutex::new(Some(lockfile)),
            writers: Mutex::new(Vec::new()),
        });

        let worker = {
            let core = core.clone();
            std::thread::Builder::new()
                .name("cinderdb-merge".to_string())
                .spawn(move || merger::merge_worker(core))?
        };

        tracing::info!(
            path = %core.config.path.display(),
            tables = core.tables.len(),
            "Opened database"
        );

        Ok(Database {
            core,
            merge_worker: Mutex::new(Some(worker)),
        })
    }

    /// Starts a transaction on the given table.
    pub fn begin(&self, table: &str) -> Result<Transaction> {
        let internal = self
            .core
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?;
        self.core.begin_transaction()?;
        Ok(Transaction::new(self.core.clone(), internal))
    }

    /// Closes the database: drains background writers, compacts each table
    /// down to at most `max_segments` segments, closes all segments and
    /// releases the lockfile. Fails with `Error::HasOpenTransactions` while
    /// any transaction is outstanding.
    pub fn close(&self) -> Result<()> {
        self.close_with_merge(self.core.config.max_segments)
    }

    /// Like [`Database::close`], but compacting down to `segment_count`
    /// segments per table. A count of 0 skips the final merge.
    pub fn close_with_merge(&self, segment_count: usize) -> Result<()> {
        let _guard = DBLOCK.lock().unwrap();

        if !self.core.open.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        if self.core.transactions.load(Ordering::SeqCst) > 0 {
            return Err(Error::HasOpenTransactions);
        }

        self.core.signal_shutdown();
        if let Some(worker) = self.merge_worker.lock().unwrap().take() {
            let _ = worker.join();
        }
        self.core.drain_writers();

        if segment_count > 0 {
            merger::merge_all_tables(&self.core, segment_count);
        }

        for table in self.core.tables.values() {
            table.state.lock().unwrap().segments.clear();
        }

        *self.core.lockfile.lock().unwrap() = None;
        self.core.open.store(false, Ordering::SeqCst);

        tracing::info!(path = %self.core.config.path.display(), "Closed database");
        Ok(())
    }

    /// Deletes the database directory and all its files. The caller must be
    /// able to gain exclusive access; a live owner fails this with
    /// `Error::InUse`.
    pub fn remove(path: impl AsRef<Path>) -> Result<()> {
        let _guard = DBLOCK.lock().unwrap();

        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::NoDatabase);
        }
        let _lock = FileLock::lock(path.join(LOCKFILE))?;
        fs::remove_dir_all(path)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<Core> {
        &self.core
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Best-effort shutdown for databases dropped without close: stop the
        // worker, wait for writers, release the lock. No final merge.
        if self.core.open.load(Ordering::SeqCst) {
            self.core.signal_shutdown();
            if let Some(worker) = self.merge_worker.lock().unwrap().take() {
                let _ = worker.join();
            }
            self.core.drain_writers();
            *self.core.lockfile.lock().unwrap() = None;
            self.core.open.store(false, Ordering::SeqCst);
        }
    }
}

fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidTableName("name is empty".to_string()));
    }
    if name.contains(['.', '/', '\\']) {
        return Err(Error::InvalidTableName(format!(
            "{name} contains a path or separator character"
        )));
    }
    Ok(())
}

/// Scans the database directory for committed segment pairs. Fails on any
/// `.tmp` leftovers or a pair missing one side. Returns the highest segment
/// id seen (seeding the id allocator) and each table's ids, oldest first.
fn scan_segments(path: &Path) -> Result<(u64, HashMap<String, Vec<u64>>)> {
    let mut key_files: Vec<(String, u64)> = Vec::new();
    let mut data_files: Vec<(String, u64)> = Vec::new();
    let mut max_id = 0u64;

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".tmp") {
            return Err(Error::CorruptState(format!(
                "temporary segment file {name} present"
            )));
        }
        let Some((table, is_keys, id)) = parse_segment_name(&name)? else {
            continue;
        };
        max_id = max_id.max(id);
        if is_keys {
            key_files.push((table, id));
        } else {
            data_files.push((table, id));
        }
    }

    for (table, id) in &key_files {
        if !data_files.contains(&(table.clone(), *id)) {
            return Err(Error::CorruptState(format!(
                "segment {table}.keys.{id} has no data file"
            )));
        }
    }
    for (table, id) in &data_files {
        if !key_files.contains(&(table.clone(), *id)) {
            return Err(Error::CorruptState(format!(
                "segment {table}.data.{id} has no keys file"
            )));
        }
    }

    let mut ids_by_table: HashMap<String, Vec<u64>> = HashMap::new();
    for (table, id) in key_files {
        ids_by_table.entry(table).or_default().push(id);
    }
    for ids in ids_by_table.values_mut() {
        ids.sort_unstable();
    }

    Ok((max_id, ids_by_table))
}

/// Splits `{table}.keys.{id}` / `{table}.data.{id}` filenames. Returns `None`
/// for unrelated files such as the lockfile.
fn parse_segment_name(name: &str) -> Result<Option<(String, bool, u64)>> {
    let (table, is_keys, id) = if let Some((table, id)) = name.split_once(".keys.") {
        (table, true, id)
    } else if let Some((table, id)) = name.split_once(".data.") {
        (table, false, id)
    } else {
        return Ok(None);
    };
    let id = id.parse().map_err(|_| {
        Error::CorruptState(format!("segment file {name} has a malformed id"))
    })?;
    Ok(Some((table.to_string(), is_keys, id)))
}
