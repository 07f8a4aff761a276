// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-attest
//!
//! Attestation chain primitives (SPEC_FULL §4.6) for the three ledgers the
//! decision core keeps: approval decisions, audit actions, and conformance
//! reports. Each ledger's own record type lives with its own crate; this one
//! only knows how to hash-chain, sign, export, and verify whatever records
//! it is handed, so it stays decoupled from `gate-approval`, `gate-budget`,
//! and `gate-telemetry`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chain;
mod payload;
mod seal;

pub use chain::{AttestationEntry, ChainError, append_entry, build_chain, verify_chain};
pub use payload::{AttestationPayload, PayloadVerifyError, generate, sign_payload, verify_payload};
pub use seal::{SealEntry, SealVerifyError, export_sealed_snapshot, verify_sealed_chain};
