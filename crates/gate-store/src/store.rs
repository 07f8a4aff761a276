// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-writer `SQLite` store (SPEC_FULL §5 implementation note).
//!
//! All mutating access goes through one dedicated writer thread reached via a
//! bounded `mpsc` channel, so writers never contend on a connection mutex
//! across requests. Reads are served from a round-robin pool of read-only
//! connections opened against the same file. Callers supply their own schema
//! DDL and SQL; this crate only owns the connection lifecycle.

use crate::config::SqliteStoreConfig;
use gate_error::{ClaweeError, ErrorCode};
use rusqlite::{Connection, OpenFlags};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;

type WriteJob = Box<dyn FnOnce(&Connection) + Send>;

/// An embedded, single-writer `SQLite` store.
///
/// Cloning shares the writer channel and read pool; all clones address the
/// same underlying database file.
#[derive(Clone)]
pub struct SqliteStore {
    sender: SyncSender<WriteJob>,
    read_pool: Arc<Vec<Mutex<Connection>>>,
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteStore {
    /// Opens (creating if absent) the database at `config.path`, applies the
    /// configured pragmas, runs `schema` as idempotent DDL, and spawns the
    /// writer thread.
    ///
    /// `schema` statements run once, in order, inside a single transaction on
    /// the write connection before the writer thread starts serving commands.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if the database cannot be opened, pragmas
    /// cannot be applied, schema DDL fails, or the writer thread cannot be
    /// spawned.
    pub fn open(config: SqliteStoreConfig, schema: &[&str]) -> Result<Self, ClaweeError> {
        config.validate()?;

        let mut write_connection = open_connection(&config)?;
        {
            let tx = write_connection
                .transaction()
                .map_err(|e| db_error("failed to start schema transaction", &e))?;
            for statement in schema {
                tx.execute_batch(statement)
                    .map_err(|e| db_error("failed to apply schema statement", &e))?;
            }
            tx.commit().map_err(|e| db_error("failed to commit schema transaction", &e))?;
        }

        let mut read_pool = Vec::with_capacity(config.read_pool_size);
        for _ in 0..config.read_pool_size {
            read_pool.push(Mutex::new(open_read_connection(&config)?));
        }

        let (sender, receiver) = mpsc::sync_channel::<WriteJob>(config.writer_queue_capacity);
        thread::Builder::new()
            .name("gate-sqlite-writer".to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job(&write_connection);
                }
            })
            .map_err(|e| {
                ClaweeError::new(ErrorCode::BackendIo, "failed to spawn sqlite writer thread")
                    .with_context("cause", e.to_string())
            })?;

        Ok(Self {
            sender,
            read_pool: Arc::new(read_pool),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Submits `f` to the writer thread and blocks for its result.
    ///
    /// `f` runs with exclusive access to the single write connection; no
    /// other writer runs concurrently with it.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] with [`ErrorCode::BackendUnavailable`] if the
    /// writer queue is full or the writer thread has terminated, or whatever
    /// error `f` itself returns.
    pub fn write<F, R>(&self, f: F) -> Result<R, ClaweeError>
    where
        F: FnOnce(&Connection) -> Result<R, ClaweeError> + Send + 'static,
        R: Send + 'static,
    {
        let (response_tx, response_rx) = mpsc::channel();
        let job: WriteJob = Box::new(move |conn| {
            let _ = response_tx.send(f(conn));
        });
        match self.sender.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                return Err(ClaweeError::new(
                    ErrorCode::BackendUnavailable,
                    "sqlite writer queue is full; retry",
                ));
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(ClaweeError::new(
                    ErrorCode::BackendUnavailable,
                    "sqlite writer thread is not running",
                ));
            }
        }
        response_rx.recv().map_err(|_| {
            ClaweeError::new(ErrorCode::BackendUnavailable, "sqlite writer response channel closed")
        })?
    }

    /// Runs `f` against the next read-only connection in the round-robin pool.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if the pool mutex is poisoned or `f` itself
    /// returns an error.
    pub fn read<F, R>(&self, f: F) -> Result<R, ClaweeError>
    where
        F: FnOnce(&Connection) -> Result<R, ClaweeError>,
    {
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_pool.len();
        let guard = self.read_pool[index]
            .lock()
            .map_err(|_| ClaweeError::new(ErrorCode::BackendUnavailable, "sqlite read connection mutex poisoned"))?;
        f(&guard)
    }
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, ClaweeError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|e| db_error("failed to open sqlite write connection", &e))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn open_read_connection(config: &SqliteStoreConfig) -> Result<Connection, ClaweeError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|e| db_error("failed to open sqlite read connection", &e))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), ClaweeError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|e| db_error("failed to set journal_mode", &e))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|e| db_error("failed to set synchronous mode", &e))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|e| db_error("failed to set busy_timeout", &e))?;
    Ok(())
}

fn db_error(message: &str, cause: &rusqlite::Error) -> ClaweeError {
    ClaweeError::new(ErrorCode::BackendIo, message).with_context("cause", cause.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteStoreConfig;

    fn open_store(schema: &[&str]) -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let store = SqliteStore::open(SqliteStoreConfig::at_path(path), schema).unwrap();
        (store, dir)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (store, _dir) =
            open_store(&["CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT NOT NULL);"]);
        store
            .write(|conn| {
                conn.execute("INSERT INTO kv (k, v) VALUES (?1, ?2)", ("a", "1"))
                    .map(|_| ())
                    .map_err(|e| db_error("insert failed", &e))
            })
            .unwrap();
        let value: String = store
            .read(|conn| {
                conn.query_row("SELECT v FROM kv WHERE k = ?1", ["a"], |row| row.get(0))
                    .map_err(|e| db_error("select failed", &e))
            })
            .unwrap();
        assert_eq!(value, "1");
    }

    #[test]
    fn schema_statements_apply_before_first_write() {
        let (store, _dir) = open_store(&[
            "CREATE TABLE a (id INTEGER PRIMARY KEY);",
            "CREATE TABLE b (id INTEGER PRIMARY KEY);",
        ]);
        let count: i64 = store
            .read(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('a','b')",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| db_error("count failed", &e))
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn writer_error_propagates_to_caller() {
        let (store, _dir) = open_store(&["CREATE TABLE kv (k TEXT PRIMARY KEY);"]);
        let result: Result<(), ClaweeError> = store.write(|conn| {
            conn.execute("INSERT INTO missing_table (k) VALUES ('x')", [])
                .map(|_| ())
                .map_err(|e| db_error("insert failed", &e))
        });
        assert!(result.is_err());
    }

    #[test]
    fn read_pool_round_robins_across_connections() {
        let (store, _dir) =
            open_store(&["CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT NOT NULL);"]);
        store
            .write(|conn| {
                conn.execute("INSERT INTO kv (k, v) VALUES ('a', '1')", [])
                    .map(|_| ())
                    .map_err(|e| db_error("insert failed", &e))
            })
            .unwrap();
        for _ in 0..8 {
            let value: String = store
                .read(|conn| {
                    conn.query_row("SELECT v FROM kv WHERE k = 'a'", [], |row| row.get(0))
                        .map_err(|e| db_error("select failed", &e))
                })
                .unwrap();
            assert_eq!(value, "1");
        }
    }
}
