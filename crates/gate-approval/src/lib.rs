// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-approval
//!
//! Approval state machine (SPEC_FULL §4.3): quorum- and role-gated
//! human-in-the-loop approvals, persisted via [`gate_store`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod record;
mod store;

pub use record::{ApprovalRecord, ApprovalStatus};
pub use store::ApprovalStore;
