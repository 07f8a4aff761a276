// SPDX-License-Identifier: MIT OR Apache-2.0
//! The approval record and its state machine (SPEC_FULL §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Lifecycle state of an [`ApprovalRecord`].
///
/// Terminal states (`Approved`, `Denied`, `Expired`) are absorbing: once set,
/// no further transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting quorum; actors and roles may still accumulate.
    Pending,
    /// Quorum and role coverage satisfied.
    Approved,
    /// An authorized actor denied the request.
    Denied,
    /// `expires_at` passed while still pending.
    Expired,
}

impl ApprovalStatus {
    /// Returns whether this status is terminal (never transitions further).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A stored approval request, tracking actor decisions toward quorum.
///
/// # Invariants
///
/// `use_count <= max_uses`; once `status != Pending`, `approval_actors` and
/// `required_roles` are frozen; `expires_at > created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp; a pending record past this point is lazily expired.
    pub expires_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: ApprovalStatus,
    /// Number of distinct actor approvals required to reach `Approved`.
    pub required_approvals: u8,
    /// Roles that must all be represented among approving actors.
    pub required_roles: BTreeSet<String>,
    /// Actors who have approved so far.
    pub approval_actors: BTreeSet<String>,
    /// Role each approving actor acted under.
    pub approval_actor_roles: BTreeMap<String, String>,
    /// Maximum number of times an `Approved` record may be consumed.
    pub max_uses: u32,
    /// Number of times this record has been consumed via [`crate::ApprovalStore::consume_approved`].
    pub use_count: u32,
    /// Timestamp of the most recent successful consumption.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Canonical hash of the normalized request key fields this record guards.
    pub request_fingerprint: String,
    /// Human-readable reason the approval was requested.
    pub reason: String,
    /// Arbitrary caller-supplied context.
    pub metadata: Value,
    /// Actor who resolved the record (approved or denied it), once terminal.
    pub resolved_by: Option<String>,
    /// Timestamp the record became terminal.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    /// Returns whether `required_roles` is fully covered by the roles actors
    /// have acted under so far.
    #[must_use]
    pub fn roles_satisfied(&self) -> bool {
        let represented: BTreeSet<&String> = self.approval_actor_roles.values().collect();
        self.required_roles.iter().all(|role| represented.contains(role))
    }

    /// Returns whether quorum (actor count) and role coverage are both met.
    #[must_use]
    pub fn quorum_satisfied(&self) -> bool {
        self.approval_actors.len() >= usize::from(self.required_approvals) && self.roles_satisfied()
    }

    /// Returns whether this record, if `Approved`, is still usable at `now`
    /// for `fingerprint` — the check `consume_approved` performs atomically.
    #[must_use]
    pub fn is_consumable(&self, fingerprint: &str, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Approved
            && self.request_fingerprint == fingerprint
            && self.expires_at >= now
            && self.use_count < self.max_uses
    }
}
