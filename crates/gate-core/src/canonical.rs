// SPDX-License-Identifier: MIT OR Apache-2.0
//! RFC 8785 JSON Canonicalization Scheme (JCS) and SHA-256 content hashing.
//!
//! Canonical form sorts object keys lexicographically at every level, preserves
//! array order, uses the shortest JSON numeric literal, and never emits
//! whitespace. It is the *only* input to any signature or fingerprint
//! computation and to any cross-process hash comparison (SPEC_FULL §4.1).

use gate_error::{ClaweeError, ErrorCode};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// 64 characters of ASCII `"0"`, the hex encoding of 32 zero bytes.
///
/// Used as the `previous_hash` of the first entry in any attestation chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hash algorithm identifier carried alongside a [`HashDigest`].
///
/// Only one variant exists today; the type is kept explicit (rather than
/// hard-coding SHA-256 everywhere) so a future algorithm migration does not
/// require changing every call site's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, the only supported algorithm.
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sha256")
    }
}

/// A tagged content digest: the algorithm plus its lowercase hex value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct HashDigest {
    /// Algorithm used to produce `value`.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Wraps a raw digest value as a SHA-256 [`HashDigest`].
    #[must_use]
    pub fn sha256(value: impl Into<String>) -> Self {
        Self { algorithm: HashAlgorithm::Sha256, value: value.into() }
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Serializes `value` to its canonical JCS byte representation.
///
/// # Errors
///
/// Returns [`ClaweeError`] with [`ErrorCode::ConfigCatalogUnparseable`] if
/// `value` cannot be represented as JSON, or the canonicalizer itself fails.
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ClaweeError> {
    serde_jcs::to_vec(value).map_err(|e| {
        ClaweeError::new(ErrorCode::ConfigCatalogUnparseable, "failed to canonicalize value")
            .with_context("cause", e.to_string())
    })
}

/// Computes the hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Canonicalizes `value` and returns its SHA-256 digest.
///
/// # Errors
///
/// Returns [`ClaweeError`] if `value` cannot be canonicalized.
pub fn hash_canonical_json<T: Serialize>(value: &T) -> Result<HashDigest, ClaweeError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(HashDigest::sha256(hash_bytes(&bytes)))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String cannot fail");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_form_sorts_keys() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json_bytes(&a).unwrap(), canonical_json_bytes(&b).unwrap());
    }

    #[test]
    fn canonical_form_is_whitespace_free() {
        let bytes = canonical_json_bytes(&json!({"a": 1})).unwrap();
        assert_eq!(bytes, br#"{"a":1}"#);
    }

    #[test]
    fn equal_canonical_forms_have_equal_fingerprints() {
        let a = json!({"z": [1, 2, 3], "a": "x"});
        let b = json!({"a": "x", "z": [1, 2, 3]});
        assert_eq!(hash_canonical_json(&a).unwrap(), hash_canonical_json(&b).unwrap());
    }

    #[test]
    fn genesis_hash_is_64_zero_chars() {
        assert_eq!(GENESIS_HASH.len(), 64);
        assert!(GENESIS_HASH.chars().all(|c| c == '0'));
    }

    #[test]
    fn hash_bytes_produces_64_hex_chars() {
        let h = hash_bytes(b"hello");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
