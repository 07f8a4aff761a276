// SPDX-License-Identifier: MIT OR Apache-2.0
//! Signed attestation payloads: a chain of entries plus a header committing
//! to the whole chain, optionally signed (SPEC_FULL §4.6).

use crate::chain::{AttestationEntry, ChainError, build_chain, verify_chain};
use chrono::{DateTime, Utc};
use gate_core::canonical::{GENESIS_HASH, canonical_json_bytes};
use gate_core::signing::{Keyring, Signature, sign, verify_kid};
use gate_error::{ClaweeError, ErrorCode};
use serde::{Deserialize, Serialize};

/// A hash-chained export of one attestation ledger (approval decisions,
/// audit actions, or conformance reports), optionally signed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationPayload<T> {
    /// When this payload was generated.
    pub generated_at: DateTime<Utc>,
    /// Lower bound of records included, if the caller scoped the export.
    pub since: Option<DateTime<Utc>>,
    /// Number of entries in `entries`.
    pub count: usize,
    /// The hash-chained records.
    pub entries: Vec<AttestationEntry<T>>,
    /// `entry_hash` of the last entry, or [`GENESIS_HASH`] if `entries` is empty.
    pub final_hash: String,
    /// Signature over the unsigned form of this payload, if signed.
    pub signature: Option<Signature>,
}

/// Why a payload failed to verify.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadVerifyError {
    /// The hash chain itself is broken or tampered.
    #[error("attestation chain invalid: {0}")]
    Chain(ChainError),
    /// `final_hash` does not match the last entry's `entry_hash`.
    #[error("final_hash does not match the last chain entry")]
    FinalHashMismatch,
    /// The payload carries no signature but one was required.
    #[error("payload is unsigned")]
    Unsigned,
    /// The signature does not verify against the supplied keyring.
    #[error("signature does not verify")]
    SignatureInvalid,
}

/// Builds an unsigned [`AttestationPayload`] from `records`, in order.
///
/// # Errors
///
/// Returns [`ClaweeError`] if any record cannot be canonicalized.
pub fn generate<T: Serialize>(records: Vec<T>, since: Option<DateTime<Utc>>) -> Result<AttestationPayload<T>, ClaweeError> {
    let count = records.len();
    let entries = build_chain(records)?;
    let final_hash = entries.last().map_or_else(|| GENESIS_HASH.to_string(), |e| e.entry_hash.clone());
    Ok(AttestationPayload { generated_at: Utc::now(), since, count, entries, final_hash, signature: None })
}

/// Signs `payload` in place with the keyring's active key.
///
/// The signature covers every field of `payload` except `signature` itself.
///
/// # Errors
///
/// Returns [`ClaweeError`] if the unsigned form cannot be canonicalized.
pub fn sign_payload<T: Serialize>(payload: &mut AttestationPayload<T>, keyring: &Keyring) -> Result<(), ClaweeError> {
    let bytes = unsigned_bytes(payload)?;
    payload.signature = Some(sign(&bytes, keyring));
    Ok(())
}

/// Verifies a payload's hash chain, `final_hash`, and (if present) signature.
///
/// `require_signature` controls whether an absent signature is itself a
/// failure; callers that only need chain integrity (e.g. reading an
/// in-progress, not-yet-sealed payload) may pass `false`.
///
/// # Errors
///
/// Returns [`ClaweeError`] if the unsigned form cannot be canonicalized.
pub fn verify_payload<T: Serialize>(
    payload: &AttestationPayload<T>,
    keyring: &Keyring,
    require_signature: bool,
) -> Result<(), PayloadVerifyError> {
    verify_chain(&payload.entries).map_err(PayloadVerifyError::Chain)?;

    let expected_final = payload.entries.last().map_or_else(|| GENESIS_HASH.to_string(), |e| e.entry_hash.clone());
    if payload.final_hash != expected_final {
        return Err(PayloadVerifyError::FinalHashMismatch);
    }

    match &payload.signature {
        Some(signature) => {
            let bytes = unsigned_bytes(payload).map_err(|_| PayloadVerifyError::SignatureInvalid)?;
            if verify_kid(&bytes, signature, keyring) {
                Ok(())
            } else {
                Err(PayloadVerifyError::SignatureInvalid)
            }
        }
        None if require_signature => Err(PayloadVerifyError::Unsigned),
        None => Ok(()),
    }
}

fn unsigned_bytes<T: Serialize>(payload: &AttestationPayload<T>) -> Result<Vec<u8>, ClaweeError> {
    #[derive(Serialize)]
    struct Unsigned<'a, T> {
        generated_at: DateTime<Utc>,
        since: Option<DateTime<Utc>>,
        count: usize,
        entries: &'a [AttestationEntry<T>],
        final_hash: &'a str,
    }
    canonical_json_bytes(&Unsigned {
        generated_at: payload.generated_at,
        since: payload.since,
        count: payload.count,
        entries: &payload.entries,
        final_hash: &payload.final_hash,
    })
}

impl From<ChainError> for ClaweeError {
    fn from(err: ChainError) -> Self {
        ClaweeError::new(ErrorCode::Internal, "attestation chain invalid").with_context("cause", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keyring() -> Keyring {
        Keyring::single("k1", "secret-1").unwrap()
    }

    #[test]
    fn generate_on_empty_records_yields_genesis_final_hash() {
        let payload = generate::<serde_json::Value>(Vec::new(), None).unwrap();
        assert_eq!(payload.final_hash, GENESIS_HASH);
        assert_eq!(payload.count, 0);
    }

    #[test]
    fn generate_then_verify_unsigned_round_trips() {
        let payload = generate(vec![json!({"a": 1}), json!({"a": 2})], None).unwrap();
        assert!(verify_payload(&payload, &keyring(), false).is_ok());
    }

    #[test]
    fn verify_payload_requires_signature_when_asked() {
        let payload = generate(vec![json!({"a": 1})], None).unwrap();
        assert_eq!(verify_payload(&payload, &keyring(), true), Err(PayloadVerifyError::Unsigned));
    }

    #[test]
    fn sign_then_verify_signed_payload_round_trips() {
        let mut payload = generate(vec![json!({"a": 1})], None).unwrap();
        sign_payload(&mut payload, &keyring()).unwrap();
        assert!(verify_payload(&payload, &keyring(), true).is_ok());
    }

    #[test]
    fn tampering_with_a_record_after_signing_fails_verification() {
        let mut payload = generate(vec![json!({"a": 1})], None).unwrap();
        sign_payload(&mut payload, &keyring()).unwrap();
        payload.entries[0].record = json!({"a": 999});
        assert!(verify_payload(&payload, &keyring(), true).is_err());
    }

    #[test]
    fn tampering_with_final_hash_fails_verification() {
        let mut payload = generate(vec![json!({"a": 1})], None).unwrap();
        payload.final_hash = "deadbeef".repeat(8);
        assert_eq!(verify_payload(&payload, &keyring(), false), Err(PayloadVerifyError::FinalHashMismatch));
    }

    #[test]
    fn wrong_keyring_fails_signature_verification() {
        let mut payload = generate(vec![json!({"a": 1})], None).unwrap();
        sign_payload(&mut payload, &keyring()).unwrap();
        let other = Keyring::single("k2", "other-secret").unwrap();
        assert_eq!(verify_payload(&payload, &other, true), Err(PayloadVerifyError::SignatureInvalid));
    }
}
