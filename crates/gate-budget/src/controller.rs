// SPDX-License-Identifier: MIT OR Apache-2.0
//! The budget controller (SPEC_FULL §4.2 step 6, §4.4).

use crate::state::{BudgetCaps, BudgetState, CostEvent, WindowSums};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use gate_catalog::PricingCatalog;
use gate_core::Decision;
use gate_error::{ClaweeError, ErrorCode};
use gate_store::{SqliteStore, SqliteStoreConfig};
use rusqlite::{Connection, OptionalExtension, params};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS budget_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    suspended INTEGER NOT NULL,
    reason TEXT,
    triggered_at TEXT,
    resumed_at TEXT,
    resumed_by TEXT,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS cost_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    model TEXT NOT NULL,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    usd_cost REAL NOT NULL,
    request_path TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cost_events_timestamp ON cost_events (timestamp);
";

/// Hourly/daily USD budget controller backed by [`gate_store::SqliteStore`].
#[derive(Clone)]
pub struct BudgetController {
    db: SqliteStore,
    caps: BudgetCaps,
}

impl BudgetController {
    /// Opens (or creates) the budget database at `config.path` with `caps`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if the database cannot be opened or the schema
    /// cannot be applied.
    pub fn open(config: SqliteStoreConfig, caps: BudgetCaps) -> Result<Self, ClaweeError> {
        let db = SqliteStore::open(config, &[SCHEMA])?;
        Ok(Self { db, caps })
    }

    /// Returns the current suspension state.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] on backend failure.
    pub fn state(&self) -> Result<BudgetState, ClaweeError> {
        self.db.read(load_or_default_state)
    }

    /// Pre-forward check (SPEC_FULL §4.2 step 6): estimates the cost of
    /// `(projected_input_tokens, projected_output_tokens)` against `model_id`
    /// via `pricing`, and blocks if already suspended or if the projection
    /// would cross either window cap. Projected checks never append a
    /// `cost_events` row.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if `pricing` has no entry for `model_id` or the
    /// backend fails.
    pub fn check_projected(
        &self,
        pricing: &PricingCatalog,
        model_id: &str,
        projected_input_tokens: u64,
        projected_output_tokens: u64,
    ) -> Result<Decision, ClaweeError> {
        let projected_cost = pricing.cost_usd(model_id, projected_input_tokens, projected_output_tokens)?;
        let caps = self.caps;
        self.db.write(move |conn| {
            let state = load_or_default_state(conn)?;
            if state.suspended {
                return Ok(Decision::block(state.reason.unwrap_or_else(|| "budget suspended".to_string())));
            }
            let now = Utc::now();
            let sums = window_sums(conn, now)?;
            if let Some(reason) = over_cap_reason(&sums, projected_cost, &caps) {
                suspend(conn, &reason, now)?;
                return Ok(Decision::block(reason));
            }
            Ok(Decision::allow())
        })
    }

    /// Post-forward check (SPEC_FULL §4.4): appends a `cost_events` row for
    /// the observed usage, then re-evaluates both window caps against the new
    /// sums, suspending if crossed.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if `pricing` has no entry for `model` or the
    /// backend fails.
    pub fn record_actual(
        &self,
        pricing: &PricingCatalog,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        request_path: &str,
    ) -> Result<Decision, ClaweeError> {
        let usd_cost = pricing.cost_usd(model, input_tokens, output_tokens)?;
        let event = CostEvent {
            timestamp: Utc::now(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            usd_cost,
            request_path: request_path.to_string(),
        };
        let caps = self.caps;
        self.db.write(move |conn| {
            insert_cost_event(conn, &event)?;
            let sums = window_sums(conn, event.timestamp)?;
            if let Some(reason) = over_cap_reason(&sums, 0.0, &caps) {
                suspend(conn, &reason, event.timestamp)?;
                return Ok(Decision::block(reason));
            }
            Ok(Decision::allow())
        })
    }

    /// Clears suspension. Only an explicit operator call may do this
    /// (SPEC_FULL §4.4); there is no automatic resume path.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] on backend failure.
    pub fn resume(&self, actor: &str) -> Result<(), ClaweeError> {
        let actor = actor.to_string();
        self.db.write(move |conn| {
            let now = Utc::now();
            ensure_row_exists(conn, now)?;
            conn.execute(
                "UPDATE budget_state SET suspended = 0, resumed_at = ?1, resumed_by = ?2, updated_at = ?1 WHERE id = 1",
                params![now.to_rfc3339(), actor],
            )
            .map_err(|e| db_error("failed to resume budget", &e))?;
            Ok(())
        })
    }
}

fn over_cap_reason(sums: &WindowSums, projection: f64, caps: &BudgetCaps) -> Option<String> {
    let projected_hourly = sums.hourly_usd + projection;
    let projected_daily = sums.daily_usd + projection;
    if projected_hourly > caps.hourly_usd_cap {
        return Some(format!(
            "hourly budget cap exceeded: {projected_hourly:.2} > {:.2} usd",
            caps.hourly_usd_cap
        ));
    }
    if projected_daily > caps.daily_usd_cap {
        return Some(format!(
            "daily budget cap exceeded: {projected_daily:.2} > {:.2} usd",
            caps.daily_usd_cap
        ));
    }
    None
}

fn window_sums(conn: &Connection, now: DateTime<Utc>) -> Result<WindowSums, ClaweeError> {
    let hourly_floor = now - Duration::minutes(60);
    let daily_floor = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now);

    let hourly_usd: f64 = conn
        .query_row(
            "SELECT COALESCE(SUM(usd_cost), 0.0) FROM cost_events WHERE timestamp >= ?1",
            params![hourly_floor.to_rfc3339()],
            |row| row.get(0),
        )
        .map_err(|e| db_error("failed to sum hourly cost events", &e))?;
    let daily_usd: f64 = conn
        .query_row(
            "SELECT COALESCE(SUM(usd_cost), 0.0) FROM cost_events WHERE timestamp >= ?1",
            params![daily_floor.to_rfc3339()],
            |row| row.get(0),
        )
        .map_err(|e| db_error("failed to sum daily cost events", &e))?;
    Ok(WindowSums { hourly_usd, daily_usd })
}

fn insert_cost_event(conn: &Connection, event: &CostEvent) -> Result<(), ClaweeError> {
    conn.execute(
        "INSERT INTO cost_events (timestamp, model, input_tokens, output_tokens, usd_cost, request_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.timestamp.to_rfc3339(),
            event.model,
            event.input_tokens,
            event.output_tokens,
            event.usd_cost,
            event.request_path,
        ],
    )
    .map_err(|e| db_error("failed to append cost event", &e))?;
    Ok(())
}

fn ensure_row_exists(conn: &Connection, now: DateTime<Utc>) -> Result<(), ClaweeError> {
    conn.execute(
        "INSERT OR IGNORE INTO budget_state (id, suspended, updated_at) VALUES (1, 0, ?1)",
        params![now.to_rfc3339()],
    )
    .map_err(|e| db_error("failed to initialize budget state row", &e))?;
    Ok(())
}

fn suspend(conn: &Connection, reason: &str, now: DateTime<Utc>) -> Result<(), ClaweeError> {
    ensure_row_exists(conn, now)?;
    conn.execute(
        "UPDATE budget_state SET suspended = 1, reason = ?1, triggered_at = ?2, updated_at = ?2 WHERE id = 1",
        params![reason, now.to_rfc3339()],
    )
    .map_err(|e| db_error("failed to suspend budget", &e))?;
    Ok(())
}

fn load_or_default_state(conn: &Connection) -> Result<BudgetState, ClaweeError> {
    let row = conn
        .query_row(
            "SELECT suspended, reason, triggered_at, resumed_at, resumed_by, updated_at FROM budget_state WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()
        .map_err(|e| db_error("failed to load budget state", &e))?;

    Ok(match row {
        Some((suspended, reason, triggered_at, resumed_at, resumed_by, updated_at)) => BudgetState {
            suspended: suspended != 0,
            reason,
            triggered_at: triggered_at.and_then(|t| parse_timestamp(&t)),
            resumed_at: resumed_at.and_then(|t| parse_timestamp(&t)),
            resumed_by,
            updated_at: parse_timestamp(&updated_at).unwrap_or_else(Utc::now),
        },
        None => BudgetState {
            suspended: false,
            reason: None,
            triggered_at: None,
            resumed_at: None,
            resumed_by: None,
            updated_at: Utc::now(),
        },
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc))
}

fn db_error(message: &str, cause: &rusqlite::Error) -> ClaweeError {
    ClaweeError::new(ErrorCode::BackendIo, message).with_context("cause", cause.to_string())
}
