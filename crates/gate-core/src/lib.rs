// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Stable primitives shared by every crate in the clawee decision core: canonical
//! JSON serialization, the keyring/HMAC signing scheme, the shared newtype
//! identifiers, and the `Decision`/`RiskClass` vocabulary gates return.
//!
//! If you only take one dependency to talk to this core, take this one.

/// Canonical JSON serialization and content hashing.
pub mod canonical;
/// `Decision` and `RiskClass`, the vocabulary every gate returns.
pub mod decision;
/// Shared newtype identifiers (`Kid`, `ApprovalId`, `RequestFingerprint`, `InvariantId`).
pub mod identifiers;
/// Keyring storage and HMAC-SHA256 sign/verify operations.
pub mod signing;

pub use canonical::{GENESIS_HASH, HashAlgorithm, HashDigest, canonical_json_bytes, hash_bytes, hash_canonical_json};
pub use decision::{Decision, RiskClass};
pub use identifiers::{ApprovalId, InvariantId, Kid, RequestFingerprint};
pub use signing::{Keyring, Signature, SigningMode, sign, verify_any, verify_kid, verify_static};
