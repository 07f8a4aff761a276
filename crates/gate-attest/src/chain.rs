// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic hash-chained attestation entries (SPEC_FULL §4.6).
//!
//! Each entry's `entry_hash` commits to its own `record` and the previous
//! entry's `entry_hash`, so a chain can be re-verified from scratch without
//! any external index: tampering with or reordering any entry changes every
//! hash after it.

use gate_core::canonical::{GENESIS_HASH, hash_canonical_json};
use gate_error::ClaweeError;
use serde::{Deserialize, Serialize};

/// One link in an attestation chain.
///
/// `record` is the caller's payload (an approval decision, an audit action,
/// a conformance report, ...); `previous_hash` and `entry_hash` are the
/// chain-integrity fields layered on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationEntry<T> {
    /// `entry_hash` of the preceding entry, or [`GENESIS_HASH`] for the first.
    pub previous_hash: String,
    /// `hash_canonical_json` of `(previous_hash, record)`.
    pub entry_hash: String,
    /// The caller-supplied record this entry attests to.
    pub record: T,
}

/// Why a chain failed to verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The chain has no entries.
    #[error("attestation chain is empty")]
    Empty,
    /// An entry's `entry_hash` does not match its recomputed value.
    #[error("hash mismatch at chain index {index}")]
    HashMismatch {
        /// Index of the entry with the mismatched hash.
        index: usize,
    },
    /// An entry's `previous_hash` does not match the prior entry's `entry_hash`.
    #[error("broken link at chain index {index}")]
    BrokenLink {
        /// Index of the entry with the broken link.
        index: usize,
    },
}

/// Builds a fresh attestation chain from `records` in the given order.
///
/// The first entry's `previous_hash` is [`GENESIS_HASH`].
///
/// # Errors
///
/// Returns [`ClaweeError`] if any record cannot be canonicalized.
pub fn build_chain<T: Serialize>(records: Vec<T>) -> Result<Vec<AttestationEntry<T>>, ClaweeError> {
    let mut chain = Vec::with_capacity(records.len());
    let mut previous_hash = GENESIS_HASH.to_string();
    for record in records {
        let entry_hash = entry_hash(&previous_hash, &record)?;
        chain.push(AttestationEntry { previous_hash: previous_hash.clone(), entry_hash: entry_hash.clone(), record });
        previous_hash = entry_hash;
    }
    Ok(chain)
}

/// Appends `record` to an existing chain, returning the new entry.
///
/// # Errors
///
/// Returns [`ClaweeError`] if `record` cannot be canonicalized.
pub fn append_entry<T: Serialize>(
    previous: Option<&AttestationEntry<T>>,
    record: T,
) -> Result<AttestationEntry<T>, ClaweeError> {
    let previous_hash = previous.map_or_else(|| GENESIS_HASH.to_string(), |e| e.entry_hash.clone());
    let entry_hash = entry_hash(&previous_hash, &record)?;
    Ok(AttestationEntry { previous_hash, entry_hash, record })
}

/// Re-verifies every hash and link in `chain`.
///
/// # Errors
///
/// - [`ChainError::Empty`] if `chain` has no entries.
/// - [`ChainError::HashMismatch`] for the first entry whose stored
///   `entry_hash` does not match its recomputed value.
/// - [`ChainError::BrokenLink`] for the first entry whose `previous_hash`
///   does not match its predecessor's `entry_hash`.
pub fn verify_chain<T: Serialize>(chain: &[AttestationEntry<T>]) -> Result<(), ChainError> {
    if chain.is_empty() {
        return Err(ChainError::Empty);
    }
    let mut expected_previous = GENESIS_HASH.to_string();
    for (index, entry) in chain.iter().enumerate() {
        if entry.previous_hash != expected_previous {
            return Err(ChainError::BrokenLink { index });
        }
        let recomputed = entry_hash(&entry.previous_hash, &entry.record).map_err(|_| ChainError::HashMismatch { index })?;
        if recomputed != entry.entry_hash {
            return Err(ChainError::HashMismatch { index });
        }
        expected_previous = entry.entry_hash.clone();
    }
    Ok(())
}

fn entry_hash<T: Serialize>(previous_hash: &str, record: &T) -> Result<String, ClaweeError> {
    #[derive(Serialize)]
    struct Linked<'a, T> {
        previous_hash: &'a str,
        record: &'a T,
    }
    Ok(hash_canonical_json(&Linked { previous_hash, record })?.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_chain_links_genesis_first_entry() {
        let chain = build_chain(vec![json!({"a": 1})]).unwrap();
        assert_eq!(chain[0].previous_hash, GENESIS_HASH);
        assert!(verify_chain(&chain).is_ok());
    }

    #[test]
    fn build_chain_links_successive_entries() {
        let chain = build_chain(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]).unwrap();
        assert_eq!(chain[1].previous_hash, chain[0].entry_hash);
        assert_eq!(chain[2].previous_hash, chain[1].entry_hash);
        assert!(verify_chain(&chain).is_ok());
    }

    #[test]
    fn verify_chain_rejects_empty_chain() {
        let chain: Vec<AttestationEntry<serde_json::Value>> = Vec::new();
        assert_eq!(verify_chain(&chain), Err(ChainError::Empty));
    }

    #[test]
    fn verify_chain_detects_tampered_record() {
        let mut chain = build_chain(vec![json!({"a": 1}), json!({"a": 2})]).unwrap();
        chain[0].record = json!({"a": 999});
        assert_eq!(verify_chain(&chain), Err(ChainError::HashMismatch { index: 0 }));
    }

    #[test]
    fn verify_chain_detects_broken_link() {
        let mut chain = build_chain(vec![json!({"a": 1}), json!({"a": 2})]).unwrap();
        chain[1].previous_hash = "deadbeef".repeat(8);
        assert_eq!(verify_chain(&chain), Err(ChainError::BrokenLink { index: 1 }));
    }

    #[test]
    fn append_entry_extends_an_existing_chain() {
        let mut chain = build_chain(vec![json!({"a": 1})]).unwrap();
        let next = append_entry(chain.last(), json!({"a": 2})).unwrap();
        assert_eq!(next.previous_hash, chain[0].entry_hash);
        chain.push(next);
        assert!(verify_chain(&chain).is_ok());
    }

    #[test]
    fn append_entry_with_no_predecessor_uses_genesis() {
        let first = append_entry::<serde_json::Value>(None, json!({"a": 1})).unwrap();
        assert_eq!(first.previous_hash, GENESIS_HASH);
    }
}
