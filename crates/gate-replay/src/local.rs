// SPDX-License-Identifier: MIT OR Apache-2.0
//! Local embedded replay store: single-writer `INSERT OR IGNORE` with
//! opportunistic expiry sweeps (SPEC_FULL §4.5).

use crate::{EVENT_KEY_TTL_FLOOR, NONCE_TTL_FLOOR, ReplayStore, clamp_ttl};
use chrono::{DateTime, Duration, Utc};
use gate_error::{ClaweeError, ErrorCode};
use gate_store::{SqliteStore, SqliteStoreConfig};
use rusqlite::{Connection, params};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS replay_nonce (
    hash TEXT PRIMARY KEY,
    seen_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS replay_event_key (
    hash TEXT PRIMARY KEY,
    seen_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);
";

/// Single-writer `SQLite`-backed [`ReplayStore`].
#[derive(Clone)]
pub struct LocalReplayStore {
    db: SqliteStore,
}

impl LocalReplayStore {
    /// Opens (or creates) the replay database at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if the database cannot be opened or the schema
    /// cannot be applied.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, ClaweeError> {
        let db = SqliteStore::open(config, &[SCHEMA])?;
        Ok(Self { db })
    }

    fn register_in(&self, table: &'static str, hash: &str, ttl: Duration) -> Result<bool, ClaweeError> {
        let hash = hash.to_string();
        self.db.write(move |conn| {
            let now = Utc::now();
            sweep_expired(conn, table, now)?;
            try_insert(conn, table, &hash, now, now + ttl)
        })
    }
}

impl ReplayStore for LocalReplayStore {
    fn register_nonce(&self, hash: &str, ttl: Duration) -> Result<bool, ClaweeError> {
        self.register_in("replay_nonce", hash, clamp_ttl(ttl, NONCE_TTL_FLOOR, "nonce"))
    }

    fn register_event_key(&self, hash: &str, ttl: Duration) -> Result<bool, ClaweeError> {
        self.register_in("replay_event_key", hash, clamp_ttl(ttl, EVENT_KEY_TTL_FLOOR, "event_key"))
    }
}

fn sweep_expired(conn: &Connection, table: &'static str, now: DateTime<Utc>) -> Result<(), ClaweeError> {
    conn.execute(&format!("DELETE FROM {table} WHERE expires_at < ?1"), params![now.to_rfc3339()])
        .map_err(|e| db_error("failed to sweep expired replay rows", &e))?;
    Ok(())
}

fn try_insert(
    conn: &Connection,
    table: &'static str,
    hash: &str,
    seen_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<bool, ClaweeError> {
    let inserted = conn
        .execute(
            &format!("INSERT OR IGNORE INTO {table} (hash, seen_at, expires_at) VALUES (?1, ?2, ?3)"),
            params![hash, seen_at.to_rfc3339(), expires_at.to_rfc3339()],
        )
        .map_err(|e| db_error("failed to register replay hash", &e))?;
    Ok(inserted == 1)
}

fn db_error(message: &str, cause: &rusqlite::Error) -> ClaweeError {
    ClaweeError::new(ErrorCode::BackendIo, message).with_context("cause", cause.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (LocalReplayStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalReplayStore::open(SqliteStoreConfig::at_path(dir.path().join("replay.db"))).unwrap();
        (store, dir)
    }

    #[test]
    fn first_registration_of_a_nonce_succeeds() {
        let (store, _dir) = store();
        assert!(store.register_nonce("abc", Duration::seconds(5)).unwrap());
    }

    #[test]
    fn second_registration_of_the_same_nonce_is_a_replay() {
        let (store, _dir) = store();
        assert!(store.register_nonce("abc", Duration::seconds(5)).unwrap());
        assert!(!store.register_nonce("abc", Duration::seconds(5)).unwrap());
    }

    #[test]
    fn nonce_and_event_key_namespaces_are_independent() {
        let (store, _dir) = store();
        assert!(store.register_nonce("shared", Duration::seconds(5)).unwrap());
        assert!(store.register_event_key("shared", Duration::seconds(120)).unwrap());
    }

    #[test]
    fn sub_floor_ttl_is_clamped_up_to_the_namespace_floor() {
        let (store, _dir) = store();
        store.register_event_key("abc", Duration::milliseconds(1)).unwrap();
        let expires_at: String = store
            .db
            .read(|conn| {
                conn.query_row("SELECT expires_at FROM replay_event_key WHERE hash = 'abc'", [], |row| row.get(0))
                    .map_err(|e| db_error("select failed", &e))
            })
            .unwrap();
        let expires_at = DateTime::parse_from_rfc3339(&expires_at).unwrap();
        assert!(expires_at.signed_duration_since(Utc::now()) > Duration::seconds(30));
    }
}
