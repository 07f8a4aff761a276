// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-replay
//!
//! Replay-protection store (SPEC_FULL §4.5): a uniform register-if-absent
//! contract over two namespaces, nonce and event-key, each with its own TTL
//! floor. All backends must preserve linearizable register-if-absent; one
//! that cannot must fail closed rather than risk a silent replay.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod local;

use chrono::Duration;
use gate_error::ClaweeError;

pub use local::LocalReplayStore;

/// TTL floor for event-key registrations (SPEC_FULL §4.5).
pub const EVENT_KEY_TTL_FLOOR: Duration = Duration::seconds(60);
/// TTL floor for nonce registrations (SPEC_FULL §4.5).
pub const NONCE_TTL_FLOOR: Duration = Duration::seconds(1);

/// Uniform replay-protection contract implemented by every backend.
///
/// A conforming backend MUST make `register_*` atomic and linearizable: two
/// concurrent registrations of the same hash resolve to exactly one `true`
/// (registered — caller may proceed) and the rest `false` (already present —
/// caller must treat this as a replay). A backend that cannot provide this
/// guarantee must refuse to serve rather than risk silently admitting a
/// replay (SPEC_FULL §4.5).
pub trait ReplayStore: Send + Sync {
    /// Registers `hash` in the nonce namespace if absent.
    ///
    /// `ttl` is clamped up to [`NONCE_TTL_FLOOR`] if supplied lower.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if the backend cannot serve the request at all
    /// (rather than risk an unlinearizable registration).
    fn register_nonce(&self, hash: &str, ttl: Duration) -> Result<bool, ClaweeError>;

    /// Registers `hash` in the event-key namespace if absent.
    ///
    /// `ttl` is clamped up to [`EVENT_KEY_TTL_FLOOR`] if supplied lower.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if the backend cannot serve the request at all
    /// (rather than risk an unlinearizable registration).
    fn register_event_key(&self, hash: &str, ttl: Duration) -> Result<bool, ClaweeError>;
}

/// Clamps `ttl` up to `floor` if it is shorter, logging the adjustment.
///
/// `namespace` identifies which registration this clamp applies to (`nonce`
/// or `event_key`) for the emitted event.
#[must_use]
pub fn clamp_ttl(ttl: Duration, floor: Duration, namespace: &str) -> Duration {
    if ttl < floor {
        tracing::warn!(
            requested_ttl = ttl.num_milliseconds(),
            floor = floor.num_milliseconds(),
            namespace,
            "replay registration ttl below namespace floor, clamping up"
        );
        floor
    } else {
        ttl
    }
}
