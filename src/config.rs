use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a database instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory path for the database.
    pub path: PathBuf,

    /// Create the directory when it does not exist (default: false).
    pub create_if_missing: bool,

    /// Segment count a table may reach before the merge worker compacts its
    /// oldest segments (default: 8).
    pub max_segments: usize,

    /// Record the first key of every Nth key block in the sparse in-memory
    /// index (default: 2).
    pub key_index_interval: usize,

    /// How often the merge worker scans tables for compaction work
    /// (default: 100ms).
    pub merge_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./cinderdb"),
            create_if_missing: false,
            max_segments: 8,
            key_index_interval: 2,
            merge_interval: Duration::from_millis(100),
        }
    }
}

impl Config {
    /// Create a new config with the given directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create the database directory when missing.
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the per-table segment count threshold for compaction.
    pub fn max_segments(mut self, max: usize) -> Self {
        self.max_segments = max;
        self
    }

    /// Set the sparse key index interval.
    pub fn key_index_interval(mut self, interval: usize) -> Self {
        self.key_index_interval = interval.max(1);
        self
    }

    /// Set the merge worker scan interval.
    pub fn merge_interval(mut self, interval: Duration) -> Self {
        self.merge_interval = interval;
        self
    }
}
