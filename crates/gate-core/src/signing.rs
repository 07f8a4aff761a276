// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyring storage and HMAC-SHA256 sign/verify (SPEC_FULL §4.1).

use crate::identifiers::Kid;
use gate_error::{ClaweeError, ErrorCode};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// A map from key id to secret with one designated *active* id.
///
/// Legacy single-key mode is represented as a degenerate keyring with exactly
/// one entry, which is also the active one.
///
/// # Invariants
///
/// `active_kid` is always a key in `keys`; `keys` is never empty. Both are
/// enforced by [`Keyring::new`]; there is no way to construct a `Keyring`
/// that violates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyring {
    active_kid: Kid,
    keys: BTreeMap<Kid, String>,
}

impl Keyring {
    /// Builds a keyring from an explicit key map and active id.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigKeyringMissingActive`] if `keys` is empty or
    /// `active_kid` is not a member of `keys`.
    pub fn new(keys: BTreeMap<Kid, String>, active_kid: Kid) -> Result<Self, ClaweeError> {
        if keys.is_empty() {
            return Err(ClaweeError::new(
                ErrorCode::ConfigKeyringMissingActive,
                "keyring must contain at least one key",
            ));
        }
        if !keys.contains_key(&active_kid) {
            return Err(ClaweeError::new(
                ErrorCode::ConfigKeyringMissingActive,
                format!("active kid '{active_kid}' is not present in the keyring"),
            )
            .with_context("active_kid", active_kid.as_str()));
        }
        Ok(Self { active_kid, keys })
    }

    /// Builds a degenerate single-key keyring (the legacy static-key path).
    ///
    /// # Errors
    ///
    /// Never fails; provided for symmetry with [`Keyring::new`] and to keep
    /// call sites uniform.
    pub fn single(kid: impl Into<Kid>, secret: impl Into<String>) -> Result<Self, ClaweeError> {
        let kid = kid.into();
        let mut keys = BTreeMap::new();
        keys.insert(kid.clone(), secret.into());
        Self::new(keys, kid)
    }

    /// The id of the key new signatures are produced under.
    #[must_use]
    pub fn active_kid(&self) -> &Kid {
        &self.active_kid
    }

    /// Looks up a secret by key id.
    #[must_use]
    pub fn secret(&self, kid: &Kid) -> Option<&str> {
        self.keys.get(kid).map(String::as_str)
    }

    /// The secret for the active key id.
    #[must_use]
    pub fn active_secret(&self) -> &str {
        self.keys.get(&self.active_kid).expect("active_kid invariant enforced at construction")
    }

    /// Returns a new keyring with `kid` added (or replaced) and left inactive.
    #[must_use]
    pub fn with_key(mut self, kid: impl Into<Kid>, secret: impl Into<String>) -> Self {
        self.keys.insert(kid.into(), secret.into());
        self
    }

    /// Returns a new keyring with a different active id.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigKeyringMissingActive`] if `kid` is not present.
    pub fn with_active(mut self, kid: impl Into<Kid>) -> Result<Self, ClaweeError> {
        let kid = kid.into();
        if !self.keys.contains_key(&kid) {
            return Err(ClaweeError::new(
                ErrorCode::ConfigKeyringMissingActive,
                format!("cannot activate unknown kid '{kid}'"),
            ));
        }
        self.active_kid = kid;
        Ok(self)
    }

    /// Returns a new keyring with `kid` removed.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigKeyringMissingActive`] if removing `kid`
    /// would leave the keyring empty or without its active key.
    pub fn without_key(mut self, kid: &Kid) -> Result<Self, ClaweeError> {
        if *kid == self.active_kid {
            return Err(ClaweeError::new(
                ErrorCode::ConfigKeyringMissingActive,
                "cannot remove the active kid from a keyring",
            ));
        }
        self.keys.remove(kid);
        if self.keys.is_empty() {
            return Err(ClaweeError::new(
                ErrorCode::ConfigKeyringMissingActive,
                "keyring must contain at least one key",
            ));
        }
        Ok(self)
    }
}

/// The signing mode a [`crate::canonical`] payload was verified under.
///
/// Recorded in every `SignedCatalog<T>` descriptor (SPEC_FULL §3) so readers
/// can tell which verification path produced the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// No signature was present or required.
    None,
    /// Legacy single hex-signature verified against a static key.
    Static,
    /// v2 `{kid, sig}` signature verified against a keyring.
    Keyring,
}

/// A `{kid, sig}` signature pair (SPEC_FULL §3, §4.1 "v2" scheme).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Id of the key the signature was produced under.
    pub kid: Kid,
    /// 64 lowercase hex characters (HMAC-SHA256 output).
    pub sig: String,
}

/// Signs `canonical` with the keyring's active key.
///
/// Returns a [`Signature`] naming the active kid.
#[must_use]
pub fn sign(canonical: &[u8], keyring: &Keyring) -> Signature {
    let sig = hmac_hex(keyring.active_secret().as_bytes(), canonical);
    Signature { kid: keyring.active_kid().clone(), sig }
}

/// Verifies `signature` against `canonical` using the named kid's secret.
///
/// Comparison is constant-time over the decoded signature bytes; signatures
/// of mismatched length after hex-decoding are rejected without comparing
/// bytes at all (SPEC_FULL §4.1).
///
/// Returns `false` (never panics) if `signature.kid` is unknown to `keyring`
/// or either hex string fails to decode.
#[must_use]
pub fn verify_kid(canonical: &[u8], signature: &Signature, keyring: &Keyring) -> bool {
    let Some(secret) = keyring.secret(&signature.kid) else { return false };
    constant_time_hex_eq(&hmac_hex(secret.as_bytes(), canonical), &signature.sig)
}

/// Verifies a legacy single hex signature against every key in the keyring.
///
/// Used only to accept legacy documents under a keyring during rotation
/// (SPEC_FULL §4.1). Returns the matching kid on success.
#[must_use]
pub fn verify_any(canonical: &[u8], sig_hex: &str, keyring: &Keyring) -> (bool, Option<Kid>) {
    for (kid, secret) in keyring_entries(keyring) {
        let expected = hmac_hex(secret.as_bytes(), canonical);
        if constant_time_hex_eq(&expected, sig_hex) {
            return (true, Some(kid.clone()));
        }
    }
    (false, None)
}

/// Verifies a legacy single hex signature against a bare static key.
///
/// This is the pre-keyring verification path: no kid is involved at all.
#[must_use]
pub fn verify_static(canonical: &[u8], sig_hex: &str, secret: &str) -> bool {
    constant_time_hex_eq(&hmac_hex(secret.as_bytes(), canonical), sig_hex)
}

fn keyring_entries(keyring: &Keyring) -> impl Iterator<Item = (&Kid, &String)> {
    keyring.keys.iter()
}

fn hmac_hex(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(message);
    let bytes = mac.finalize().into_bytes();
    let mut out = String::with_capacity(bytes.len() * 2);
    use std::fmt::Write;
    for b in bytes {
        write!(out, "{b:02x}").expect("writing to a String cannot fail");
    }
    out
}

/// Constant-time comparison of two equal-length lowercase hex strings.
///
/// Rejects (returns `false`) on length mismatch or invalid hex without
/// comparing any decoded bytes, matching the "reject on length mismatch"
/// requirement in SPEC_FULL §4.1.
fn constant_time_hex_eq(a_hex: &str, b_hex: &str) -> bool {
    let (Some(a), Some(b)) = (decode_hex(a_hex), decode_hex(b_hex)) else { return false };
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(&b).into()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyring() -> Keyring {
        Keyring::single("k1", "secret-1").unwrap()
    }

    #[test]
    fn sign_then_verify_kid_round_trips() {
        let kr = keyring();
        let canonical = br#"{"a":1}"#;
        let sig = sign(canonical, &kr);
        assert_eq!(sig.kid.as_str(), "k1");
        assert_eq!(sig.sig.len(), 64);
        assert!(verify_kid(canonical, &sig, &kr));
    }

    #[test]
    fn verify_kid_rejects_tampered_payload() {
        let kr = keyring();
        let sig = sign(b"original", &kr);
        assert!(!verify_kid(b"tampered", &sig, &kr));
    }

    #[test]
    fn verify_kid_rejects_unknown_kid() {
        let kr = keyring();
        let sig = Signature { kid: Kid::from("unknown"), sig: "a".repeat(64) };
        assert!(!verify_kid(b"payload", &sig, &kr));
    }

    #[test]
    fn constant_time_hex_eq_rejects_length_mismatch() {
        assert!(!constant_time_hex_eq("ab", "abcd"));
    }

    #[test]
    fn constant_time_hex_eq_rejects_invalid_hex() {
        assert!(!constant_time_hex_eq("zz", "00"));
    }

    #[test]
    fn key_rotation_old_signature_verifies_until_key_removed() {
        let kr = keyring();
        let canonical = br#"{"policy":"v1"}"#;
        let old_sig = sign(canonical, &kr);

        let rotated = kr.clone().with_key("k2", "secret-2").with_active("k2").unwrap();
        let new_sig = sign(canonical, &rotated);
        assert_ne!(old_sig.sig, new_sig.sig);
        assert!(verify_kid(canonical, &new_sig, &rotated));
        assert!(verify_kid(canonical, &old_sig, &rotated), "k1 still present, old signature verifies");

        let k1_removed = rotated.without_key(&Kid::from("k1")).unwrap();
        assert!(!verify_kid(canonical, &old_sig, &k1_removed), "k1 removed, old signature fails");
    }

    #[test]
    fn verify_any_finds_matching_kid_across_keyring() {
        let kr = Keyring::single("k1", "secret-1").unwrap().with_key("k2", "secret-2");
        let legacy_sig = hmac_hex(b"secret-2", b"legacy-doc");
        let (valid, matched) = verify_any(b"legacy-doc", &legacy_sig, &kr);
        assert!(valid);
        assert_eq!(matched, Some(Kid::from("k2")));
    }

    #[test]
    fn keyring_new_rejects_missing_active() {
        let mut keys = BTreeMap::new();
        keys.insert(Kid::from("k1"), "s".to_string());
        assert!(Keyring::new(keys, Kid::from("k2")).is_err());
    }

    #[test]
    fn verify_static_matches_plain_hmac() {
        let sig = hmac_hex(b"static-secret", b"doc-bytes");
        assert!(verify_static(b"doc-bytes", &sig, "static-secret"));
        assert!(!verify_static(b"doc-bytes", &sig, "wrong-secret"));
    }

    #[test]
    fn keyring_new_rejects_empty() {
        assert!(Keyring::new(BTreeMap::new(), Kid::from("k1")).is_err());
    }
}
