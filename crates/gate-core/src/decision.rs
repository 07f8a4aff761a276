// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Decision`/`RiskClass` vocabulary every gate in the pipeline returns.

use serde::{Deserialize, Serialize};

/// Risk classification attached to a policy decision (SPEC_FULL §3 `PolicyDecision`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskClass {
    /// No risk signals were matched.
    Low,
    /// Reserved for future fine-grained tiers between low and high.
    Medium,
    /// At least one high-risk signal (tool, pattern, modality, or path) matched.
    High,
    /// At least one critical-pattern signal matched.
    Critical,
}

/// Outcome of a single gate evaluation (SPEC_FULL §4.2).
///
/// A gate never returns an `Err` for a policy denial — a deny is a decision,
/// not an exception (SPEC_FULL §7). `Err(ClaweeError)` is reserved for
/// transient backend failures, which the pipeline converts to a fail-closed
/// [`Decision::Block`] at its own boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The request may proceed to the next gate / be forwarded.
    Allow {
        /// Risk class assessed for this request, if the gate computes one.
        #[serde(skip_serializing_if = "Option::is_none")]
        risk_class: Option<RiskClass>,
    },
    /// The request is blocked outright; pipeline short-circuits.
    Block {
        /// Risk class driving the block, if applicable.
        #[serde(skip_serializing_if = "Option::is_none")]
        risk_class: Option<RiskClass>,
        /// Ordered signals that led to the block (SPEC_FULL §4.2).
        #[serde(default)]
        matched_signals: Vec<String>,
        /// Human-readable reason.
        reason: String,
    },
    /// The request is suspended pending human approval; pipeline short-circuits.
    RequireApproval {
        /// Risk class driving the approval requirement.
        risk_class: RiskClass,
        /// Ordered signals that led to requiring approval.
        #[serde(default)]
        matched_signals: Vec<String>,
        /// Human-readable reason.
        reason: String,
    },
}

impl Decision {
    /// Builds an [`Decision::Allow`] with no risk class recorded.
    #[must_use]
    pub fn allow() -> Self {
        Self::Allow { risk_class: None }
    }

    /// Builds an [`Decision::Allow`] carrying the assessed risk class.
    #[must_use]
    pub fn allow_with_risk(risk_class: RiskClass) -> Self {
        Self::Allow { risk_class: Some(risk_class) }
    }

    /// Builds an [`Decision::Block`] with the given reason and no signals.
    #[must_use]
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Block { risk_class: None, matched_signals: Vec::new(), reason: reason.into() }
    }

    /// Builds an [`Decision::Block`] carrying risk class and matched signals.
    #[must_use]
    pub fn block_with_signals(
        risk_class: RiskClass,
        matched_signals: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Block { risk_class: Some(risk_class), matched_signals, reason: reason.into() }
    }

    /// Builds a [`Decision::RequireApproval`].
    #[must_use]
    pub fn require_approval(
        risk_class: RiskClass,
        matched_signals: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::RequireApproval { risk_class, matched_signals, reason: reason.into() }
    }

    /// `true` if this decision allows the pipeline to continue to the next gate.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// The reason string, if this decision is a block or approval requirement.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow { .. } => None,
            Self::Block { reason, .. } | Self::RequireApproval { reason, .. } => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_is_allow() {
        assert!(Decision::allow().is_allow());
        assert!(!Decision::block("nope").is_allow());
    }

    #[test]
    fn block_carries_reason() {
        let d = Decision::block("denied by policy");
        assert_eq!(d.reason(), Some("denied by policy"));
    }

    #[test]
    fn risk_class_ordering_matches_severity() {
        assert!(RiskClass::Low < RiskClass::Medium);
        assert!(RiskClass::Medium < RiskClass::High);
        assert!(RiskClass::High < RiskClass::Critical);
    }

    #[test]
    fn serializes_with_tagged_decision_field() {
        let json = serde_json::to_value(Decision::allow()).unwrap();
        assert_eq!(json["decision"], "allow");
    }
}
