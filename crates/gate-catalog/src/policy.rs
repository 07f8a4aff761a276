// SPDX-License-Identifier: MIT OR Apache-2.0
//! `PolicyRules`: the fixed schema the policy engine gate evaluates against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Three sets of lowercase strings driving the policy engine (SPEC_FULL §3, §4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRules {
    /// Tool names that, if requested, emit a `high-risk-tool:<name>` signal.
    #[serde(default)]
    pub high_risk_tools: BTreeSet<String>,
    /// Substrings whose presence in the request body emits a
    /// `critical-pattern:<p>` signal and forces a `block` decision.
    #[serde(default)]
    pub critical_patterns: BTreeSet<String>,
    /// Substrings whose presence emits a `high-risk-pattern:<p>` signal.
    #[serde(default)]
    pub high_risk_patterns: BTreeSet<String>,
}

impl PolicyRules {
    /// Normalizes a freshly-deserialized rule set: lowercases every entry.
    ///
    /// Catalog authors may supply mixed-case strings; the policy engine
    /// always compares against a lowercased request body (SPEC_FULL §4.2), so
    /// normalization happens once here rather than on every evaluation.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            high_risk_tools: lower(self.high_risk_tools),
            critical_patterns: lower(self.critical_patterns),
            high_risk_patterns: lower(self.high_risk_patterns),
        }
    }
}

fn lower(set: BTreeSet<String>) -> BTreeSet<String> {
    set.into_iter().map(|s| s.to_lowercase()).collect()
}
