// SPDX-License-Identifier: MIT OR Apache-2.0
//! `SQLite`-backed [`ApprovalStore`] (SPEC_FULL §4.3).

use crate::record::{ApprovalRecord, ApprovalStatus};
use chrono::{DateTime, Duration, Utc};
use gate_catalog::ApprovalRequirement;
use gate_error::{ClaweeError, ErrorCode};
use gate_store::{SqliteStore, SqliteStoreConfig};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS approvals (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    status TEXT NOT NULL,
    required_approvals INTEGER NOT NULL,
    required_roles TEXT NOT NULL,
    approval_actors TEXT NOT NULL,
    approval_actor_roles TEXT NOT NULL,
    max_uses INTEGER NOT NULL,
    use_count INTEGER NOT NULL,
    last_used_at TEXT,
    request_fingerprint TEXT NOT NULL,
    reason TEXT NOT NULL,
    metadata TEXT NOT NULL,
    resolved_by TEXT,
    resolved_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_approvals_fingerprint ON approvals (request_fingerprint);
";

/// Approval records addressable by id or request fingerprint, persisted via [`gate_store::SqliteStore`].
#[derive(Clone)]
pub struct ApprovalStore {
    db: SqliteStore,
}

impl ApprovalStore {
    /// Opens (or creates) the approval database at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if the database cannot be opened or the schema
    /// cannot be applied.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, ClaweeError> {
        let db = SqliteStore::open(config, &[SCHEMA])?;
        Ok(Self { db })
    }

    /// Finds a pending record for `fingerprint`, or creates a fresh one.
    ///
    /// If a pending record already exists, it is *upgraded*: `required_approvals`
    /// and `max_uses` are raised to the max of old and requested, and
    /// `required_roles` is the union of old and requested (SPEC_FULL §4.2 step 5).
    /// Lazily expires any pending record whose `expires_at` has passed first.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] on backend failure.
    pub fn create_or_upgrade_pending(
        &self,
        fingerprint: &str,
        requirement: &ApprovalRequirement,
        reason: &str,
        metadata: Value,
        ttl: Duration,
    ) -> Result<ApprovalRecord, ClaweeError> {
        let fingerprint = fingerprint.to_string();
        let reason = reason.to_string();
        let required_approvals = requirement.required_approvals;
        let required_roles = requirement.required_roles.clone();
        let max_uses = 1u32;
        self.db.write(move |conn| {
            let now = Utc::now();
            expire_stale_pending(conn, now)?;

            let existing = find_pending_by_fingerprint(conn, &fingerprint)?;
            let record = match existing {
                Some(mut record) => {
                    record.required_approvals = record.required_approvals.max(required_approvals);
                    record.required_roles.extend(required_roles);
                    record.max_uses = record.max_uses.max(max_uses);
                    update_requirement(conn, &record)?;
                    record
                }
                None => {
                    let record = ApprovalRecord {
                        id: Uuid::new_v4(),
                        created_at: now,
                        expires_at: now + ttl,
                        status: ApprovalStatus::Pending,
                        required_approvals,
                        required_roles,
                        approval_actors: BTreeSet::new(),
                        approval_actor_roles: BTreeMap::new(),
                        max_uses,
                        use_count: 0,
                        last_used_at: None,
                        request_fingerprint: fingerprint.clone(),
                        reason: reason.clone(),
                        metadata,
                        resolved_by: None,
                        resolved_at: None,
                    };
                    insert_record(conn, &record)?;
                    record
                }
            };
            Ok(record)
        })
    }

    /// Records `actor`'s decision (approve or deny) against a pending record.
    ///
    /// Transitions `Pending -> Approved` once quorum and role coverage are
    /// met; transitions `Pending -> Denied` immediately on any deny. A record
    /// already in a terminal state is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if `id` does not exist or the backend fails.
    pub fn record_decision(&self, id: Uuid, actor: &str, role: &str, approve: bool) -> Result<ApprovalRecord, ClaweeError> {
        let actor = actor.to_string();
        let role = role.to_string();
        self.db.write(move |conn| {
            let now = Utc::now();
            expire_stale_pending(conn, now)?;
            let mut record = load_record(conn, id)?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            if approve {
                record.approval_actors.insert(actor.clone());
                record.approval_actor_roles.insert(actor.clone(), role);
                if record.quorum_satisfied() {
                    record.status = ApprovalStatus::Approved;
                    record.resolved_by = Some(actor);
                    record.resolved_at = Some(now);
                }
            } else {
                record.status = ApprovalStatus::Denied;
                record.resolved_by = Some(actor);
                record.resolved_at = Some(now);
            }
            persist_decision(conn, &record)?;
            Ok(record)
        })
    }

    /// Returns the most recent `Approved` record for `fingerprint` that is
    /// still consumable at the current time, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] on backend failure.
    pub fn find_valid_approved(&self, fingerprint: &str) -> Result<Option<ApprovalRecord>, ClaweeError> {
        let fingerprint = fingerprint.to_string();
        self.db.read(move |conn| {
            let now = Utc::now();
            let record = find_approved_by_fingerprint(conn, &fingerprint)?;
            Ok(record.filter(|r| r.is_consumable(&fingerprint, now)))
        })
    }

    /// Atomically consumes one use of an `Approved` record.
    ///
    /// Increments `use_count` iff `status = Approved`, `request_fingerprint`
    /// matches, the record has not expired, and `use_count < max_uses`.
    /// Returns whether the row was updated (SPEC_FULL §4.3).
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] on backend failure.
    pub fn consume_approved(&self, id: Uuid, fingerprint: &str) -> Result<bool, ClaweeError> {
        let fingerprint = fingerprint.to_string();
        self.db.write(move |conn| {
            let now = Utc::now();
            let updated = conn
                .execute(
                    "UPDATE approvals SET use_count = use_count + 1, last_used_at = ?1
                     WHERE id = ?2 AND status = 'approved' AND request_fingerprint = ?3
                       AND expires_at >= ?1 AND use_count < max_uses",
                    params![now.to_rfc3339(), id.to_string(), fingerprint],
                )
                .map_err(|e| db_error("failed to consume approval", &e))?;
            Ok(updated == 1)
        })
    }
}

fn expire_stale_pending(conn: &Connection, now: DateTime<Utc>) -> Result<(), ClaweeError> {
    conn.execute(
        "UPDATE approvals SET status = 'expired', resolved_at = ?1
         WHERE status = 'pending' AND expires_at < ?1",
        params![now.to_rfc3339()],
    )
    .map_err(|e| db_error("failed to lazily expire pending approvals", &e))?;
    Ok(())
}

fn insert_record(conn: &Connection, record: &ApprovalRecord) -> Result<(), ClaweeError> {
    conn.execute(
        "INSERT INTO approvals (
            id, created_at, expires_at, status, required_approvals, required_roles,
            approval_actors, approval_actor_roles, max_uses, use_count, last_used_at,
            request_fingerprint, reason, metadata, resolved_by, resolved_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        params![
            record.id.to_string(),
            record.created_at.to_rfc3339(),
            record.expires_at.to_rfc3339(),
            status_str(record.status),
            record.required_approvals,
            json_str(&record.required_roles)?,
            json_str(&record.approval_actors)?,
            json_str(&record.approval_actor_roles)?,
            record.max_uses,
            record.use_count,
            record.last_used_at.map(|t| t.to_rfc3339()),
            record.request_fingerprint,
            record.reason,
            record.metadata.to_string(),
            record.resolved_by,
            record.resolved_at.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(|e| db_error("failed to insert approval record", &e))?;
    Ok(())
}

fn update_requirement(conn: &Connection, record: &ApprovalRecord) -> Result<(), ClaweeError> {
    conn.execute(
        "UPDATE approvals SET required_approvals = ?1, required_roles = ?2, max_uses = ?3 WHERE id = ?4",
        params![
            record.required_approvals,
            json_str(&record.required_roles)?,
            record.max_uses,
            record.id.to_string(),
        ],
    )
    .map_err(|e| db_error("failed to upgrade pending approval", &e))?;
    Ok(())
}

fn persist_decision(conn: &Connection, record: &ApprovalRecord) -> Result<(), ClaweeError> {
    conn.execute(
        "UPDATE approvals SET status = ?1, approval_actors = ?2, approval_actor_roles = ?3,
            resolved_by = ?4, resolved_at = ?5 WHERE id = ?6",
        params![
            status_str(record.status),
            json_str(&record.approval_actors)?,
            json_str(&record.approval_actor_roles)?,
            record.resolved_by,
            record.resolved_at.map(|t| t.to_rfc3339()),
            record.id.to_string(),
        ],
    )
    .map_err(|e| db_error("failed to persist approval decision", &e))?;
    Ok(())
}

fn find_pending_by_fingerprint(conn: &Connection, fingerprint: &str) -> Result<Option<ApprovalRecord>, ClaweeError> {
    conn.query_row(
        "SELECT * FROM approvals WHERE request_fingerprint = ?1 AND status = 'pending' ORDER BY created_at DESC LIMIT 1",
        params![fingerprint],
        row_to_record,
    )
    .optional()
    .map_err(|e| db_error("failed to query pending approval", &e))
}

fn find_approved_by_fingerprint(conn: &Connection, fingerprint: &str) -> Result<Option<ApprovalRecord>, ClaweeError> {
    conn.query_row(
        "SELECT * FROM approvals WHERE request_fingerprint = ?1 AND status = 'approved' ORDER BY resolved_at DESC LIMIT 1",
        params![fingerprint],
        row_to_record,
    )
    .optional()
    .map_err(|e| db_error("failed to query approved approval", &e))
}

fn load_record(conn: &Connection, id: Uuid) -> Result<ApprovalRecord, ClaweeError> {
    conn.query_row(
        "SELECT * FROM approvals WHERE id = ?1",
        params![id.to_string()],
        row_to_record,
    )
    .map_err(|e| db_error("approval record not found", &e))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApprovalRecord> {
    let status: String = row.get("status")?;
    let required_roles: String = row.get("required_roles")?;
    let approval_actors: String = row.get("approval_actors")?;
    let approval_actor_roles: String = row.get("approval_actor_roles")?;
    let metadata: String = row.get("metadata")?;
    let last_used_at: Option<String> = row.get("last_used_at")?;
    let resolved_at: Option<String> = row.get("resolved_at")?;

    Ok(ApprovalRecord {
        id: parse_uuid(row.get::<_, String>("id")?),
        created_at: parse_timestamp(row.get::<_, String>("created_at")?),
        expires_at: parse_timestamp(row.get::<_, String>("expires_at")?),
        status: parse_status(&status),
        required_approvals: row.get("required_approvals")?,
        required_roles: parse_json(&required_roles),
        approval_actors: parse_json(&approval_actors),
        approval_actor_roles: parse_json(&approval_actor_roles),
        max_uses: row.get("max_uses")?,
        use_count: row.get("use_count")?,
        last_used_at: last_used_at.map(parse_timestamp),
        request_fingerprint: row.get("request_fingerprint")?,
        reason: row.get("reason")?,
        metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
        resolved_by: row.get("resolved_by")?,
        resolved_at: resolved_at.map(parse_timestamp),
    })
}

fn status_str(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Denied => "denied",
        ApprovalStatus::Expired => "expired",
    }
}

fn parse_status(s: &str) -> ApprovalStatus {
    match s {
        "approved" => ApprovalStatus::Approved,
        "denied" => ApprovalStatus::Denied,
        "expired" => ApprovalStatus::Expired,
        _ => ApprovalStatus::Pending,
    }
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_timestamp(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s).map(|t| t.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}

fn parse_json<T: serde::de::DeserializeOwned + Default>(s: &str) -> T {
    serde_json::from_str(s).unwrap_or_default()
}

fn json_str<T: serde::Serialize>(value: &T) -> Result<String, ClaweeError> {
    serde_json::to_string(value).map_err(|e| {
        ClaweeError::new(ErrorCode::Internal, "failed to serialize approval field").with_context("cause", e.to_string())
    })
}

fn db_error(message: &str, cause: &rusqlite::Error) -> ClaweeError {
    ClaweeError::new(ErrorCode::BackendIo, message).with_context("cause", cause.to_string())
}
