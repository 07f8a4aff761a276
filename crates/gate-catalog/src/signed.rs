// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic signed-catalog envelope, verification dispatch, and hot-reload handle.

use arc_swap::ArcSwap;
use gate_core::{Keyring, Kid, Signature as KeyringSignature, SigningMode, canonical_json_bytes, hash_canonical_json, sign, verify_any, verify_kid, verify_static};
use gate_error::{ClaweeError, ErrorCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// On-disk shape of a catalog document: the typed rules plus either a legacy
/// hex signature or a v2 `{kid,sig}` signature (SPEC_FULL §6 "File formats").
#[derive(Debug, Clone, Deserialize)]
struct RawEnvelope<T> {
    #[serde(flatten)]
    rules: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_v2: Option<KeyringSignature>,
}

/// Borrowing counterpart of [`RawEnvelope`] used only by [`save_catalog`].
#[derive(Serialize)]
struct SaveEnvelope<'a, T> {
    #[serde(flatten)]
    rules: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature_v2: Option<KeyringSignature>,
}

/// How a catalog document's signature should be checked.
#[derive(Clone, Copy)]
pub enum Verifier<'a> {
    /// No verification is performed; `signing_mode` is recorded as `none`.
    None,
    /// Legacy static-key HMAC verification.
    Static(&'a str),
    /// v2 keyring verification (accepts legacy documents during rotation).
    Keyring(&'a Keyring),
}

/// Normalized rules of type `T` plus their fingerprint and signing descriptor
/// (SPEC_FULL §3 `SignedCatalog<T>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedCatalog<T> {
    /// The normalized, typed rule set.
    pub rules: T,
    /// SHA-256 of the canonical payload.
    pub fingerprint: gate_core::HashDigest,
    /// Which verification path produced this snapshot.
    pub signing_mode: SigningMode,
    /// The kid that verified the document, when signing_mode is `keyring`.
    pub active_kid: Option<Kid>,
}

/// Parses, canonicalizes, and verifies a catalog document.
///
/// # Errors
///
/// - [`ErrorCode::ConfigCatalogUnparseable`] if `raw` is not valid JSON for `T`.
/// - [`ErrorCode::ConfigCatalogUnsigned`] if a signature is required but absent.
/// - [`ErrorCode::SignatureMismatch`] if a present signature fails verification.
pub fn load_catalog<T>(raw: &[u8], verifier: Verifier<'_>) -> Result<SignedCatalog<T>, ClaweeError>
where
    T: DeserializeOwned + Serialize,
{
    let envelope: RawEnvelope<T> = serde_json::from_slice(raw).map_err(|e| {
        ClaweeError::new(ErrorCode::ConfigCatalogUnparseable, "catalog document is not valid JSON")
            .with_context("cause", e.to_string())
    })?;

    let canonical = canonical_json_bytes(&envelope.rules)?;
    let fingerprint = hash_canonical_json(&envelope.rules)?;

    let (signing_mode, active_kid) = match verifier {
        Verifier::None => (SigningMode::None, None),
        Verifier::Static(secret) => {
            let Some(sig) = envelope.signature.as_deref() else {
                return Err(ClaweeError::new(ErrorCode::ConfigCatalogUnsigned, "catalog has no signature"));
            };
            if !verify_static(&canonical, sig, secret) {
                return Err(ClaweeError::new(ErrorCode::SignatureMismatch, "static signature verification failed"));
            }
            (SigningMode::Static, None)
        }
        Verifier::Keyring(keyring) => {
            if let Some(sig_v2) = &envelope.signature_v2 {
                if !verify_kid(&canonical, sig_v2, keyring) {
                    return Err(ClaweeError::new(
                        ErrorCode::SignatureMismatch,
                        "keyring signature verification failed",
                    )
                    .with_context("kid", sig_v2.kid.as_str()));
                }
                (SigningMode::Keyring, Some(sig_v2.kid.clone()))
            } else if let Some(sig) = envelope.signature.as_deref() {
                let (valid, matched_kid) = verify_any(&canonical, sig, keyring);
                if !valid {
                    return Err(ClaweeError::new(
                        ErrorCode::SignatureMismatch,
                        "legacy signature did not match any key in the keyring",
                    ));
                }
                (SigningMode::Keyring, matched_kid)
            } else {
                return Err(ClaweeError::new(ErrorCode::ConfigCatalogUnsigned, "catalog has no signature"));
            }
        }
    };

    Ok(SignedCatalog { rules: envelope.rules, fingerprint, signing_mode, active_kid })
}

/// Produces a signed catalog document's bytes for round-trip tests and tooling.
///
/// Not used by the pipeline itself (catalogs arrive pre-signed from the
/// out-of-scope ingress layer), but kept alongside the loader so
/// `load(save(C, K)) = C` (SPEC_FULL §8) is directly testable in this crate.
///
/// # Errors
///
/// Returns [`ClaweeError`] if `rules` cannot be canonicalized.
pub fn save_catalog<T: Serialize>(rules: &T, keyring: &Keyring) -> Result<Vec<u8>, ClaweeError> {
    let canonical = canonical_json_bytes(rules)?;
    let signature = sign(&canonical, keyring);
    let envelope = SaveEnvelope { rules, signature: None, signature_v2: Some(signature) };
    serde_json::to_vec(&envelope).map_err(|e| {
        ClaweeError::new(ErrorCode::Internal, "failed to serialize signed catalog").with_context("cause", e.to_string())
    })
}

/// A hot-reloadable snapshot handle for a loaded catalog (SPEC_FULL §5, §9).
///
/// Readers call [`CatalogHandle::current`] to obtain an `Arc` clone with no
/// lock; a reload publishes a brand-new snapshot via [`CatalogHandle::reload`]
/// rather than mutating the existing one in place, so no reader ever observes
/// a torn catalog.
pub struct CatalogHandle<T> {
    inner: ArcSwap<SignedCatalog<T>>,
}

impl<T> CatalogHandle<T> {
    /// Publishes the initial snapshot.
    pub fn new(initial: SignedCatalog<T>) -> Self {
        Self { inner: ArcSwap::from_pointee(initial) }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<SignedCatalog<T>> {
        self.inner.load_full()
    }

    /// Atomically publishes a new snapshot, replacing the old one.
    pub fn reload(&self, next: SignedCatalog<T>) {
        self.inner.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rules {
        high_risk_tools: Vec<String>,
    }

    #[test]
    fn round_trip_through_keyring_signing() {
        let kr = Keyring::single("k1", "secret").unwrap();
        let rules = Rules { high_risk_tools: vec!["bash".into()] };
        let doc = save_catalog(&rules, &kr).unwrap();

        let loaded: SignedCatalog<Rules> = load_catalog(&doc, Verifier::Keyring(&kr)).unwrap();
        assert_eq!(loaded.rules, rules);
        assert_eq!(loaded.signing_mode, SigningMode::Keyring);
        assert_eq!(loaded.active_kid, Some(Kid::from("k1")));
    }

    #[test]
    fn unsigned_document_rejected_under_keyring_verifier() {
        let kr = Keyring::single("k1", "secret").unwrap();
        let raw = br#"{"high_risk_tools":["bash"]}"#;
        let result: Result<SignedCatalog<Rules>, _> = load_catalog(raw, Verifier::Keyring(&kr));
        assert_eq!(result.unwrap_err().code, ErrorCode::ConfigCatalogUnsigned);
    }

    #[test]
    fn tampered_document_fails_signature_verification() {
        let kr = Keyring::single("k1", "secret").unwrap();
        let rules = Rules { high_risk_tools: vec!["bash".into()] };
        let doc = save_catalog(&rules, &kr).unwrap();
        let mut tampered: serde_json::Value = serde_json::from_slice(&doc).unwrap();
        tampered["high_risk_tools"] = serde_json::json!(["rm"]);
        let tampered_bytes = serde_json::to_vec(&tampered).unwrap();

        let result: Result<SignedCatalog<Rules>, _> = load_catalog(&tampered_bytes, Verifier::Keyring(&kr));
        assert_eq!(result.unwrap_err().code, ErrorCode::SignatureMismatch);
    }

    #[test]
    fn key_rotation_both_signatures_verify_while_old_kid_present() {
        let kr = Keyring::single("k1", "secret-1").unwrap();
        let rules = Rules { high_risk_tools: vec!["bash".into()] };
        let old_doc = save_catalog(&rules, &kr).unwrap();

        let rotated = kr.with_key("k2", "secret-2").with_active("k2").unwrap();
        let new_doc = save_catalog(&rules, &rotated).unwrap();

        let loaded_new: SignedCatalog<Rules> = load_catalog(&new_doc, Verifier::Keyring(&rotated)).unwrap();
        assert_eq!(loaded_new.active_kid, Some(Kid::from("k2")));

        let loaded_old: SignedCatalog<Rules> = load_catalog(&old_doc, Verifier::Keyring(&rotated)).unwrap();
        assert_eq!(loaded_old.active_kid, Some(Kid::from("k1")));
    }

    #[test]
    fn catalog_handle_reload_publishes_new_snapshot() {
        let kr = Keyring::single("k1", "secret").unwrap();
        let rules_v1 = Rules { high_risk_tools: vec!["bash".into()] };
        let doc_v1 = save_catalog(&rules_v1, &kr).unwrap();
        let snapshot_v1: SignedCatalog<Rules> = load_catalog(&doc_v1, Verifier::Keyring(&kr)).unwrap();
        let handle = CatalogHandle::new(snapshot_v1);
        assert_eq!(handle.current().rules.high_risk_tools, vec!["bash".to_string()]);

        let rules_v2 = Rules { high_risk_tools: vec!["bash".into(), "curl".into()] };
        let doc_v2 = save_catalog(&rules_v2, &kr).unwrap();
        let snapshot_v2: SignedCatalog<Rules> = load_catalog(&doc_v2, Verifier::Keyring(&kr)).unwrap();
        handle.reload(snapshot_v2);
        assert_eq!(handle.current().rules.high_risk_tools, vec!["bash".to_string(), "curl".to_string()]);
    }
}
