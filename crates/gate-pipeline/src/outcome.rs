// SPDX-License-Identifier: MIT OR Apache-2.0
//! The result of one pipeline evaluation (SPEC_FULL §4.2).

use gate_core::Decision;
use serde::{Deserialize, Serialize};

/// Which of the fixed-order gates produced a [`PipelineOutcome`]'s decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    /// Step 1: runtime egress gate.
    Egress,
    /// Step 2: capability gate.
    Capability,
    /// Step 3: model registry gate.
    Model,
    /// Step 4: policy engine.
    Policy,
    /// Step 5: approval gate.
    Approval,
    /// Step 6: budget controller (projected check).
    Budget,
    /// Step 7: replay-protection check immediately preceding forward.
    Replay,
}

impl GateId {
    /// The security invariant id this gate feeds, if any.
    ///
    /// `Policy` does not map onto `INV-003-POLICY-GATE` directly when it
    /// hands off to `Approval` — see [`crate::PipelineDriver::evaluate`] for
    /// the exact feeding rule.
    #[must_use]
    pub fn invariant_id(self) -> &'static str {
        match self {
            Self::Egress => "INV-001-EGRESS-GATE",
            Self::Capability => "INV-002-CAPABILITY-GATE",
            Self::Model => "INV-004-MODEL-REGISTRY",
            Self::Policy => "INV-003-POLICY-GATE",
            Self::Approval => "INV-005-APPROVAL-QUORUM",
            Self::Budget => "INV-006-BUDGET-CAP",
            Self::Replay => "INV-007-REPLAY-PROTECTION",
        }
    }
}

/// The outcome of a complete pipeline evaluation: either every gate passed
/// and the request may be forwarded, or some gate short-circuited it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// The decision of the gate that determined this outcome.
    pub decision: Decision,
    /// Which gate produced `decision`. `None` only if `decision` is an
    /// `Allow` reached after every gate ran (the nominal forward path).
    pub gate: Option<GateId>,
    /// The request's canonical fingerprint, computed once evaluation reaches
    /// the approval gate or later.
    pub request_fingerprint: Option<String>,
}

impl PipelineOutcome {
    /// `true` if this outcome allows the ingress layer to forward the request.
    #[must_use]
    pub fn should_forward(&self) -> bool {
        self.decision.is_allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_outcome_allows() {
        let outcome = PipelineOutcome { decision: Decision::allow(), gate: None, request_fingerprint: Some("fp".to_string()) };
        assert!(outcome.should_forward());
    }

    #[test]
    fn blocked_outcome_does_not_forward() {
        let outcome =
            PipelineOutcome { decision: Decision::block("nope"), gate: Some(GateId::Egress), request_fingerprint: None };
        assert!(!outcome.should_forward());
    }

    #[test]
    fn every_gate_has_a_distinct_invariant_id() {
        let ids = [
            GateId::Egress,
            GateId::Capability,
            GateId::Model,
            GateId::Policy,
            GateId::Approval,
            GateId::Budget,
            GateId::Replay,
        ];
        let mut invariant_ids: Vec<&str> = ids.iter().map(|g| g.invariant_id()).collect();
        invariant_ids.sort_unstable();
        invariant_ids.dedup();
        assert_eq!(invariant_ids.len(), ids.len());
    }
}
