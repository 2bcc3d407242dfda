//! cinderdb is an embedded, ordered key–value store.
//!
//! Each table is a log-structured merge tree with a single level: committed
//! data lives in immutable sorted segment file pairs on disk, writes buffer
//! in per-transaction memory segments, and a background worker compacts
//! adjacent segments when a table accumulates too many. Keys and values are
//! byte strings; deletion writes tombstones that hide older values until
//! compaction drops them.
//!
//! ```no_run
//! use cinderdb::{Config, Database, Table};
//!
//! let config = Config::new("./mydb").create_if_missing(true);
//! let db = Database::open(config, vec![Table::new("accounts")])?;
//!
//! let mut tx = db.begin("accounts")?;
//! tx.put(b"alice", b"100".to_vec())?;
//! tx.commit()?;
//!
//! let tx = db.begin("accounts")?;
//! assert_eq!(tx.get(b"alice")?, Some(b"100".to_vec()));
//! tx.rollback()?;
//!
//! db.close()?;
//! # Ok::<(), cinderdb::Error>(())
//! ```

pub mod compare;
pub mod config;
pub mod db;
pub mod error;
pub mod segment;
pub mod transaction;

mod flock;
mod merger;

pub use compare::{DefaultKeyCompare, KeyCompare};
pub use config::Config;
pub use db::{Database, Table};
pub use error::{Error, Result};
pub use transaction::{Scan, Transaction};
