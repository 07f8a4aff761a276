// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-budget
//!
//! Hourly/daily USD budget controller (SPEC_FULL §4.2 step 6, §4.4):
//! rolling-window cost accounting, projected and actual cap checks, and
//! monotonic suspension persisted via [`gate_store`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod controller;
mod state;

pub use controller::BudgetController;
pub use state::{BudgetCaps, BudgetState, CostEvent, WindowSums};
