// SPDX-License-Identifier: MIT OR Apache-2.0
//! Model registry gate (SPEC_FULL §4.2 step 3).

use chrono::{DateTime, Utc};
use gate_catalog::{Modality, ModelRegistry};
use gate_core::Decision;

/// Evaluates whether `model_id`/`modality` is an approved, current registry entry.
#[must_use]
pub fn evaluate_model(registry: &ModelRegistry, model_id: &str, modality: Modality, at: DateTime<Utc>) -> Decision {
    match registry.resolve(model_id, modality, at) {
        Some(_) => Decision::allow(),
        None => Decision::block(format!("model '{model_id}' has no approved, current registry entry")),
    }
}
