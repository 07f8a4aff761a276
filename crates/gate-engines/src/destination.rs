// SPDX-License-Identifier: MIT OR Apache-2.0
//! Channel destination policy gate (SPEC_FULL §4.8).

use gate_catalog::DestinationPolicy;
use gate_core::Decision;

/// Evaluates whether `destination` is permitted on `channel`.
#[must_use]
pub fn evaluate_destination(policy: &DestinationPolicy, channel: &str, destination: &str) -> Decision {
    if policy.permits(channel, destination) {
        Decision::allow()
    } else {
        Decision::block(format!("destination '{destination}' is not permitted on channel '{channel}'"))
    }
}
