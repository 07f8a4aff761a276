// SPDX-License-Identifier: MIT OR Apache-2.0
//! Newtype identifiers shared across the decision core.
//!
//! Each wraps a `String` and is `#[serde(transparent)]` so it serializes as a
//! bare JSON string — the wire shape catalogs, approval records, and
//! attestation entries already use.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps `value` as a
            #[doc = concat!("[`", stringify!($name), "`].")]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(Kid, "Identifier of a key within a [`crate::Keyring`].");
string_id!(ApprovalId, "UUID-shaped identifier of an approval record.");
string_id!(RequestFingerprint, "Canonical hash of the request fields that uniquely identify an approvable operation.");
string_id!(InvariantId, "Fixed catalog id of a security invariant, e.g. `INV-003-POLICY-GATE`.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_as_a_bare_string() {
        let id = ApprovalId::new("approval-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"approval-1\"");
        let back: ApprovalId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_matches_as_str() {
        let kid = Kid::from("k1");
        assert_eq!(kid.as_str(), "k1");
        assert_eq!(kid.to_string(), "k1");
    }
}
