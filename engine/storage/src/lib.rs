//! Capacity-bounded storage for self-play data.
//!
//! - [`EpisodeBuffer`]: in-memory replay buffer that keeps the smallest
//!   suffix of episodes holding at least a target number of samples.
//! - [`SqliteLog`]: single-file log whose total item cost is capped; safe to
//!   share between processes.
//! - [`LogDir`]: directory of atomically written entries whose total size
//!   on disk is capped.

mod log_dir;
mod replay;
mod sqlite;

pub use log_dir::{LogDir, LogDirEntry};
pub use replay::{EpisodeBuffer, ReplayError};
pub use sqlite::{LogItem, SqliteLog};

use thiserror::Error;

/// Errors from the persistent stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
