// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ApprovalPolicy`: default quorum plus override maps (SPEC_FULL §3, §4.2).

use gate_core::RiskClass;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Required quorum and role coverage for a matched approval requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequirement {
    /// Minimum distinct approving actors, 1..=5.
    pub required_approvals: u8,
    /// Roles that must each be represented among the approving actors.
    #[serde(default)]
    pub required_roles: BTreeSet<String>,
}

/// Default approval requirement plus risk-class/tool-name/`channel:action` overrides.
///
/// Resolution merges every matching override with the default by taking the
/// union of required roles and the max of required approvals (SPEC_FULL §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    /// Baseline requirement applied when nothing more specific matches.
    pub default: ApprovalRequirement,
    /// Overrides keyed by risk class.
    #[serde(default)]
    pub by_risk_class: BTreeMap<RiskClass, ApprovalRequirement>,
    /// Overrides keyed by tool name.
    #[serde(default)]
    pub by_tool: BTreeMap<String, ApprovalRequirement>,
    /// Overrides keyed by `"<channel>:<action>"`.
    #[serde(default)]
    pub by_channel_action: BTreeMap<String, ApprovalRequirement>,
}

impl ApprovalPolicy {
    /// Merges the default requirement with every override that matches the
    /// given risk class, tool name, and `channel:action` key.
    ///
    /// Merge rule: union of required roles, max of required approvals.
    #[must_use]
    pub fn resolve(&self, risk_class: RiskClass, tool: &str, channel_action: &str) -> ApprovalRequirement {
        let mut merged = self.default.clone();
        for candidate in [
            self.by_risk_class.get(&risk_class),
            self.by_tool.get(tool),
            self.by_channel_action.get(channel_action),
        ]
        .into_iter()
        .flatten()
        {
            merged.required_approvals = merged.required_approvals.max(candidate.required_approvals);
            merged.required_roles.extend(candidate.required_roles.iter().cloned());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(approvals: u8, roles: &[&str]) -> ApprovalRequirement {
        ApprovalRequirement {
            required_approvals: approvals,
            required_roles: roles.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn no_override_returns_default() {
        let policy = ApprovalPolicy {
            default: requirement(1, &["on-call"]),
            by_risk_class: BTreeMap::new(),
            by_tool: BTreeMap::new(),
            by_channel_action: BTreeMap::new(),
        };
        let resolved = policy.resolve(RiskClass::Low, "read_file", "email:send");
        assert_eq!(resolved, requirement(1, &["on-call"]));
    }

    #[test]
    fn risk_class_override_raises_approvals_and_unions_roles() {
        let mut by_risk_class = BTreeMap::new();
        by_risk_class.insert(RiskClass::Critical, requirement(3, &["security"]));
        let policy = ApprovalPolicy {
            default: requirement(1, &["on-call"]),
            by_risk_class,
            by_tool: BTreeMap::new(),
            by_channel_action: BTreeMap::new(),
        };
        let resolved = policy.resolve(RiskClass::Critical, "rm", "cli:exec");
        assert_eq!(resolved.required_approvals, 3);
        assert!(resolved.required_roles.contains("on-call"));
        assert!(resolved.required_roles.contains("security"));
    }

    #[test]
    fn multiple_overrides_take_max_approvals_and_union_all_roles() {
        let mut by_tool = BTreeMap::new();
        by_tool.insert("rm".to_string(), requirement(2, &["sre"]));
        let mut by_channel_action = BTreeMap::new();
        by_channel_action.insert("cli:exec".to_string(), requirement(5, &["security"]));
        let policy = ApprovalPolicy {
            default: requirement(1, &["on-call"]),
            by_risk_class: BTreeMap::new(),
            by_tool,
            by_channel_action,
        };
        let resolved = policy.resolve(RiskClass::High, "rm", "cli:exec");
        assert_eq!(resolved.required_approvals, 5);
        assert_eq!(resolved.required_roles.len(), 3);
    }
}
