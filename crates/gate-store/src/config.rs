// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration for the embedded `SQLite` store.

use serde::Deserialize;
use std::path::PathBuf;

/// `SQLite` journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log (recommended; allows concurrent readers during a write).
    #[default]
    Wal,
    /// Legacy rollback journal.
    Delete,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` synchronous mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` on every commit (safest).
    #[default]
    Full,
    /// `fsync` at checkpoints only; safe under WAL.
    Normal,
}

impl SyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for a [`crate::SqliteStore`].
///
/// # Invariants
/// - `writer_queue_capacity`, `batch_max_ops`, `batch_max_bytes`, `batch_max_wait_ms`,
///   and `read_pool_size` must all be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds applied to every connection.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// Synchronous mode.
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Bounded capacity of the writer command queue.
    #[serde(default = "default_writer_queue_capacity")]
    pub writer_queue_capacity: usize,
    /// Number of read-only connections in the round-robin read pool.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_writer_queue_capacity() -> usize {
    256
}

const fn default_read_pool_size() -> usize {
    4
}

impl SqliteStoreConfig {
    /// Returns an in-memory-backed config suitable for tests.
    ///
    /// Each call returns a config pointing at a distinct anonymous temp file;
    /// `:memory:` cannot be shared across the writer thread and the read pool
    /// since each `rusqlite::Connection::open` would see an independent database.
    #[must_use]
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
            sync_mode: SyncMode::default(),
            writer_queue_capacity: default_writer_queue_capacity(),
            read_pool_size: default_read_pool_size(),
        }
    }

    /// Validates the runtime limits, returning a [`gate_error::ClaweeError`] on violation.
    pub(crate) fn validate(&self) -> Result<(), gate_error::ClaweeError> {
        use gate_error::{ClaweeError, ErrorCode};
        if self.writer_queue_capacity == 0 {
            return Err(ClaweeError::new(
                ErrorCode::ConfigMissingField,
                "writer_queue_capacity must be greater than zero",
            ));
        }
        if self.read_pool_size == 0 {
            return Err(ClaweeError::new(
                ErrorCode::ConfigMissingField,
                "read_pool_size must be greater than zero",
            ));
        }
        Ok(())
    }
}
