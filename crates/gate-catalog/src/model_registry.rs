// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ModelRegistry`: approved `(model_id, modality)` entries (SPEC_FULL §3, §4.2).

use crate::signed::{SignedCatalog, Verifier, load_catalog};
use chrono::{DateTime, Utc};
use gate_core::canonical_json_bytes;
use gate_core::signing::{verify_any, verify_static};
use gate_error::{ClaweeError, ErrorCode};
use serde::{Deserialize, Serialize};

/// The kind of model artifact an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Plain-text generation or chat models.
    Text,
    /// Image/video-capable models.
    Vision,
    /// Speech or other audio-capable models.
    Audio,
    /// Moderation/classification safety models.
    Safety,
    /// Embedding models.
    Embedding,
}

/// A single approved or rejected `(model_id, modality)` registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistryEntry {
    /// Upstream model identifier, or `"*"` for the wildcard fallback entry.
    pub model_id: String,
    /// Modality this entry covers.
    pub modality: Modality,
    /// Content hash of the model artifact this entry attests to.
    pub artifact_digest: String,
    /// Whether the model is currently approved for use.
    pub approved: bool,
    /// Start of the validity window; `None` means "always valid from genesis".
    pub valid_from: Option<DateTime<Utc>>,
    /// End of the validity window; `None` means "no expiry".
    pub valid_to: Option<DateTime<Utc>>,
    /// Signature over this entry's own canonical payload.
    pub signature: String,
}

/// The subset of [`ModelRegistryEntry`] fields an entry's own `signature`
/// covers (every field except the signature itself).
#[derive(Serialize)]
struct EntryPayload<'a> {
    model_id: &'a str,
    modality: Modality,
    artifact_digest: &'a str,
    approved: bool,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
}

impl ModelRegistryEntry {
    /// Whether this entry covers `at` within its validity window.
    #[must_use]
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.valid_from.is_none_or(|from| at >= from) && self.valid_to.is_none_or(|to| at < to)
    }

    /// Verifies this entry's own `signature` over its canonical payload
    /// (every field but `signature`), independent of the envelope signature
    /// covering the whole catalog document (SPEC_FULL §3 line 72).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::SignatureMismatch`] if `signature` is missing,
    /// malformed, or does not verify against `verifier`.
    pub fn verify_signature(&self, verifier: Verifier<'_>) -> Result<(), ClaweeError> {
        if matches!(verifier, Verifier::None) {
            return Ok(());
        }
        let payload = EntryPayload {
            model_id: &self.model_id,
            modality: self.modality,
            artifact_digest: &self.artifact_digest,
            approved: self.approved,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
        };
        let canonical = canonical_json_bytes(&payload)?;
        let verified = match verifier {
            Verifier::None => true,
            Verifier::Static(secret) => verify_static(&canonical, &self.signature, secret),
            Verifier::Keyring(keyring) => verify_any(&canonical, &self.signature, keyring).0,
        };
        if verified {
            Ok(())
        } else {
            Err(ClaweeError::new(ErrorCode::SignatureMismatch, "model registry entry signature verification failed")
                .with_context("model_id", self.model_id.clone()))
        }
    }
}

/// The full set of model registry entries, keyed by `(model_id, modality)`.
///
/// Multiple entries may share a `model_id` if they differ in modality or
/// validity window; lookups resolve the entry covering the query time, then
/// fall back to a `model_id = "*"` wildcard entry for the same modality.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRegistry {
    /// The flat entry list as loaded from the catalog document.
    pub entries: Vec<ModelRegistryEntry>,
}

impl ModelRegistry {
    /// Resolves the entry approving `model_id` for `modality` at time `at`.
    ///
    /// Returns `None` if no exact or wildcard entry covers `at`, or if the
    /// resolved entry exists but is not approved.
    #[must_use]
    pub fn resolve(&self, model_id: &str, modality: Modality, at: DateTime<Utc>) -> Option<&ModelRegistryEntry> {
        let exact = self
            .entries
            .iter()
            .find(|e| e.model_id == model_id && e.modality == modality && e.covers(at));
        let candidate = exact.or_else(|| {
            self.entries.iter().find(|e| e.model_id == "*" && e.modality == modality && e.covers(at))
        })?;
        candidate.approved.then_some(candidate)
    }

    /// Verifies every entry's own signature, failing on the first missing or
    /// invalid one (SPEC_FULL §4.2 step 3: "any single missing or invalid
    /// entry in the registry at load time fails the entire load").
    ///
    /// # Errors
    ///
    /// Returns the first [`ErrorCode::SignatureMismatch`] encountered.
    pub fn verify_entries(&self, verifier: Verifier<'_>) -> Result<(), ClaweeError> {
        for entry in &self.entries {
            entry.verify_signature(verifier)?;
        }
        Ok(())
    }
}

/// Loads a model registry document: verifies the envelope signature over the
/// whole document (as [`load_catalog`] does for any catalog type), then
/// verifies every entry's own per-entry signature, failing the entire load on
/// the first missing or invalid one.
///
/// # Errors
///
/// Returns whatever [`load_catalog`] returns for envelope-level failures, or
/// [`ErrorCode::SignatureMismatch`] for the first invalid entry.
pub fn load_model_registry(raw: &[u8], verifier: Verifier<'_>) -> Result<SignedCatalog<ModelRegistry>, ClaweeError> {
    let catalog = load_catalog::<ModelRegistry>(raw, verifier)?;
    catalog.rules.verify_entries(verifier)?;
    Ok(catalog)
}
