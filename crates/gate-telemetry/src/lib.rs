// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-telemetry
//!
//! Security invariant registry (SPEC_FULL §4.7) and the `tracing` bootstrap
//! every binary built on the decision core shares (SPEC_FULL §2a).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod invariant;
mod logging;

pub use invariant::{CATALOG, InvariantRegistry, InvariantState, InvariantStatus};
pub use logging::{LogFormat, init_tracing};
