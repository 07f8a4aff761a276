// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pass-through catalogs whose shape this workspace never inspects.
//!
//! The connector catalog and the control-tokens catalog are consumed only by
//! the out-of-scope ingress/connector layer (SPEC_FULL §9); this crate's job
//! is limited to verifying and fingerprinting them like any other catalog.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A verified catalog document whose internal schema this workspace does not
/// model — carried as an opaque JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueCatalog(pub Value);

impl OpaqueCatalog {
    /// Borrows the underlying JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for OpaqueCatalog {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_arbitrary_json_shape() {
        let original = json!({"connectors": [{"name": "slack", "endpoint": "https://hooks.example/"}]});
        let catalog: OpaqueCatalog = original.clone().into();
        let serialized = serde_json::to_value(&catalog).unwrap();
        assert_eq!(serialized, original);
    }
}
