//! Background compaction of table segment lists.
//!
//! The merge worker is a plain thread that periodically scans every table.
//! While a table's segment count exceeds the configured threshold it merges
//! the two oldest segments into one and swaps the pair for the result under
//! the table's lock. Compaction failures are logged and retried on the next
//! pass; the writer has already removed any partial output.
//!
//! The merged pair always sits at the head of the list, so nothing older
//! exists that a tombstone would still need to hide: tombstones are dropped
//! during the merge. The output reuses the newer input's segment id, keeping
//! sort-by-id on reopen consistent with recency, and is renamed over the
//! newer input's files; only the older input's files need unlinking.

use std::fs;
use std::sync::Arc;

use crate::db::{Core, InternalTable};
use crate::error::{Error, Result};
use crate::segment::disk::DiskSegment;
use crate::segment::merge::{MergeIterator, TombstoneFilter};
use crate::segment::writer::write_and_load_segment;
use crate::segment::{LookupIterator, SegmentHandle};

/// Long-running worker loop; exits when the database starts closing.
pub(crate) fn merge_worker(core: Arc<Core>) {
    tracing::debug!("merge worker started");
    loop {
        if core.is_closing() {
            break;
        }
        merge_all_tables(&core, core.config.max_segments);
        if core.wait_for_shutdown(core.config.merge_interval) {
            break;
        }
    }
    tracing::debug!("merge worker stopped");
}

/// One compaction pass over every table, down to at most `max_segments`
/// segments each.
pub(crate) fn merge_all_tables(core: &Core, max_segments: usize) {
    for table in core.tables.values() {
        if let Err(err) = merge_table(core, table, max_segments) {
            tracing::error!(table = %table.name, error = %err, "Compaction failed");
        }
    }
}

fn merge_table(core: &Core, table: &Arc<InternalTable>, max_segments: usize) -> Result<()> {
    loop {
        let (first, second) = {
            let state = table.state.lock().unwrap();
            if state.segments.len() <= max_segments.max(1) {
                return Ok(());
            }
            match (&state.segments[0], &state.segments[1]) {
                (SegmentHandle::Disk(first), SegmentHandle::Disk(second)) => {
                    (first.clone(), second.clone())
                }
                // A flush is still pending on one of the oldest segments.
                _ => return Ok(()),
            }
        };

        match merge_segments(core, table, &first, &second) {
            Ok(merged) => {
                let merged_id = merged.id();
                {
                    let mut state = table.state.lock().unwrap();
                    // Only the merger reorders the list head; flushes swap
                    // their own placeholder in place and commits append.
                    debug_assert!(matches!(
                        &state.segments[0],
                        SegmentHandle::Disk(s) if Arc::ptr_eq(s, &first)
                    ));
                    state
                        .segments
                        .splice(0..2, [SegmentHandle::Disk(Arc::new(merged))]);
                }
                remove_segment_files(&first);
                tracing::info!(
                    table = %table.name,
                    first = first.id(),
                    second = second.id(),
                    merged = merged_id,
                    "Compacted segments"
                );
            }
            Err(Error::EmptySegment) => {
                // Every entry was a tombstone and was dropped: the pair
                // vanishes entirely.
                {
                    let mut state = table.state.lock().unwrap();
                    state.segments.drain(0..2);
                }
                remove_segment_files(&first);
                remove_segment_files(&second);
                tracing::info!(
                    table = %table.name,
                    first = first.id(),
                    second = second.id(),
                    "Compacted segments away entirely"
                );
            }
            Err(err) => return Err(err),
        }
    }
}

/// Merges two adjacent segments, newer one winning on equal keys, into a new
/// segment published under the newer one's id.
fn merge_segments(
    core: &Core,
    table: &InternalTable,
    first: &Arc<DiskSegment>,
    second: &Arc<DiskSegment>,
) -> Result<DiskSegment> {
    let (key_path, data_path) = core.segment_paths(&table.name, second.id());
    let iterators: Vec<Box<dyn LookupIterator>> = vec![
        Box::new(second.clone().lookup(None, None)?), // newest first
        Box::new(first.clone().lookup(None, None)?),
    ];
    let merge = MergeIterator::new(iterators, table.compare.clone())?;
    let mut input = TombstoneFilter::new(merge);
    write_and_load_segment(
        &key_path,
        &data_path,
        &mut input,
        table.compare.clone(),
        core.config.key_index_interval,
    )
}

fn remove_segment_files(segment: &DiskSegment) {
    for path in [segment.key_path(), segment.data_path()] {
        if let Err(err) = fs::remove_file(path) {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to delete replaced segment file"
            );
        }
    }
}
