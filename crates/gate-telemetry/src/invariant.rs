// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fixed catalog of eight runtime security invariants (SPEC_FULL §4.7), with
//! atomic pass/fail counters the gate pipeline feeds on every decision.

use chrono::{DateTime, Utc};
use gate_core::canonical::hash_canonical_json;
use gate_error::{ClaweeError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// The eight invariants, fixed by id and description, in catalog order.
pub const CATALOG: [(&str, &str); 8] = [
    ("INV-001-EGRESS-GATE", "outbound target resolves to an allowed destination"),
    ("INV-002-CAPABILITY-GATE", "requested tool/action is within capability rules"),
    ("INV-003-POLICY-GATE", "request contains no undetected critical/high-risk signal"),
    ("INV-004-MODEL-REGISTRY", "resolved model/modality is an approved, current registry entry"),
    ("INV-005-APPROVAL-QUORUM", "forwarded high-risk request carried a valid, quorum-satisfied approval"),
    ("INV-006-BUDGET-CAP", "forwarded request did not exceed hourly/daily budget caps"),
    ("INV-007-REPLAY-PROTECTION", "forwarded request's nonce/event-key had not been seen before"),
    ("INV-008-ATTESTATION-CHAIN", "the most recent exported attestation chain verifies intact"),
];

/// Most recent pass/fail outcome recorded for an invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvariantStatus {
    /// The invariant has never been checked.
    Unknown,
    /// The most recent check passed.
    Pass,
    /// The most recent check failed.
    Fail,
}

#[derive(Debug, Default)]
struct InvariantMeta {
    last_status: Option<InvariantStatus>,
    last_checked_at: Option<DateTime<Utc>>,
    last_failure_reason: Option<String>,
    last_failure_context: Option<Value>,
}

/// A point-in-time snapshot of one invariant's counters and last outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvariantState {
    /// Invariant id, e.g. `INV-003-POLICY-GATE`.
    pub id: String,
    /// Human-readable description from [`CATALOG`].
    pub description: String,
    /// Total number of passing checks recorded.
    pub passes: u64,
    /// Total number of failing checks recorded.
    pub failures: u64,
    /// Outcome of the most recent check.
    pub last_status: InvariantStatus,
    /// When the most recent check was recorded.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Reason attached to the most recent failing check.
    pub last_failure_reason: Option<String>,
    /// Structured context attached to the most recent failing check.
    pub last_failure_context: Option<Value>,
}

/// Thread-safe registry of the eight fixed invariants.
///
/// Counters are independent [`AtomicU64`] pairs so concurrent `check` calls
/// from different gates never contend on a shared lock for the hot path;
/// the less frequently read "last outcome" fields are behind a small mutex
/// per invariant.
#[derive(Debug)]
pub struct InvariantRegistry {
    passes: [AtomicU64; 8],
    failures: [AtomicU64; 8],
    meta: [Mutex<InvariantMeta>; 8],
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Creates a fresh registry with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            passes: std::array::from_fn(|_| AtomicU64::new(0)),
            failures: std::array::from_fn(|_| AtomicU64::new(0)),
            meta: std::array::from_fn(|_| Mutex::new(InvariantMeta::default())),
        }
    }

    /// Records a pass/fail outcome for the named invariant.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if `id` is not one of the eight catalog ids.
    pub fn check(
        &self,
        id: &str,
        passed: bool,
        reason: Option<String>,
        context: Option<Value>,
    ) -> Result<(), ClaweeError> {
        let index = ordinal(id)?;
        if passed {
            self.passes[index].fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures[index].fetch_add(1, Ordering::Relaxed);
        }
        let mut meta = self.meta[index].lock().expect("invariant meta lock poisoned");
        meta.last_status = Some(if passed { InvariantStatus::Pass } else { InvariantStatus::Fail });
        meta.last_checked_at = Some(Utc::now());
        if !passed {
            meta.last_failure_reason = reason;
            meta.last_failure_context = context;
        }
        Ok(())
    }

    /// Returns the current state of every invariant, in catalog order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<InvariantState> {
        CATALOG
            .iter()
            .enumerate()
            .map(|(index, (id, description))| {
                let meta = self.meta[index].lock().expect("invariant meta lock poisoned");
                InvariantState {
                    id: (*id).to_string(),
                    description: (*description).to_string(),
                    passes: self.passes[index].load(Ordering::Relaxed),
                    failures: self.failures[index].load(Ordering::Relaxed),
                    last_status: meta.last_status.unwrap_or(InvariantStatus::Unknown),
                    last_checked_at: meta.last_checked_at,
                    last_failure_reason: meta.last_failure_reason.clone(),
                    last_failure_context: meta.last_failure_context.clone(),
                }
            })
            .collect()
    }

    /// SHA-256 of the sorted canonical catalog of `(id, description)` pairs.
    ///
    /// Embedded in every conformance report as `invariant_catalog_hash` so a
    /// verifier can detect unauthorized catalog drift between builds.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] only if the catalog itself cannot be
    /// canonicalized, which cannot happen for this fixed, static data.
    pub fn definition_hash(&self) -> Result<String, ClaweeError> {
        let mut sorted: Vec<(&str, &str)> = CATALOG.to_vec();
        sorted.sort_unstable();
        Ok(hash_canonical_json(&sorted)?.value)
    }
}

fn ordinal(id: &str) -> Result<usize, ClaweeError> {
    CATALOG.iter().position(|(catalog_id, _)| *catalog_id == id).ok_or_else(|| {
        ClaweeError::new(ErrorCode::ConfigMissingField, "unknown security invariant id").with_context("id", id)
    })
}
