// SPDX-License-Identifier: MIT OR Apache-2.0
//! Budget state and cost-event types (SPEC_FULL §3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The singleton suspension state of the budget controller.
///
/// # Invariants
///
/// Suspension is monotonic in the forward direction: only an explicit,
/// human-initiated [`crate::BudgetController::resume`] clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    /// Whether forwarding is currently suspended.
    pub suspended: bool,
    /// Reason the suspension was triggered, if suspended.
    pub reason: Option<String>,
    /// Timestamp the suspension was triggered.
    pub triggered_at: Option<DateTime<Utc>>,
    /// Timestamp an operator last cleared the suspension.
    pub resumed_at: Option<DateTime<Utc>>,
    /// Actor identity that last cleared the suspension.
    pub resumed_by: Option<String>,
    /// Timestamp of the most recent state change.
    pub updated_at: DateTime<Utc>,
}

/// Caps applied by the rolling-window budget checks (SPEC_FULL §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetCaps {
    /// Maximum USD spend in the trailing 60-minute window.
    pub hourly_usd_cap: f64,
    /// Maximum USD spend since the start of the current UTC day.
    pub daily_usd_cap: f64,
}

/// One observed model invocation's cost, appended to the `cost_events` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEvent {
    /// When the cost was recorded.
    pub timestamp: DateTime<Utc>,
    /// Model identifier billed.
    pub model: String,
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens consumed.
    pub output_tokens: u64,
    /// Computed USD cost for this event.
    pub usd_cost: f64,
    /// Request path the cost was attributed to.
    pub request_path: String,
}

/// The two rolling-sum windows the budget controller evaluates caps against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSums {
    /// Sum of `usd_cost` over the trailing 60-minute window.
    pub hourly_usd: f64,
    /// Sum of `usd_cost` since the start of the current UTC day.
    pub daily_usd: f64,
}
