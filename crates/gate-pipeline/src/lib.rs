// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-pipeline
//!
//! Composes the egress, capability, model registry, policy, approval, and
//! budget gates plus the replay-protection check into the fixed-order chain
//! described by SPEC_FULL §4.2, feeding the security invariant registry
//! (`gate-telemetry`) as it goes. [`PipelineDriver`] is constructed once at
//! process start from explicit dependencies — no global singletons
//! (SPEC_FULL §9) — and is safe to share across concurrent requests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod driver;
mod outcome;

pub use context::RequestContext;
pub use driver::PipelineDriver;
pub use outcome::{GateId, PipelineOutcome};
