// SPDX-License-Identifier: MIT OR Apache-2.0
//! Policy engine gate: signal extraction and risk tie-break (SPEC_FULL §4.2 step 4).

use gate_core::{Decision, RiskClass};
use gate_catalog::PolicyRules;

/// The fields of an inbound request the policy engine inspects.
#[derive(Debug, Clone)]
pub struct PolicyRequest<'a> {
    /// Request body, inspected case-insensitively against the rule sets.
    pub body: &'a str,
    /// Request path.
    pub path: &'a str,
    /// HTTP-style method; only relevant to the `admin`/`system` path signal.
    pub method: &'a str,
    /// Tool names the request asks to invoke.
    pub tool_names: &'a [String],
    /// Modalities involved in the request; `"text"` never emits a signal.
    pub modalities: &'a [String],
}

/// Evaluates the policy engine against `request` using `rules`.
///
/// Emits signals in the order: `critical-pattern:<p>`, `high-risk-tool:<name>`,
/// `high-risk-pattern:<p>`, `high-risk-path:admin-system`, `modality:<m>`.
/// Any `critical-pattern` forces `block` at `critical`; otherwise any
/// `high-risk-*` signal forces `require_approval` at `high`; otherwise `allow`
/// at `low` (SPEC_FULL §4.2 step 4).
#[must_use]
pub fn evaluate_policy(rules: &PolicyRules, request: &PolicyRequest<'_>) -> Decision {
    let lower_body = request.body.to_lowercase();
    let mut signals = Vec::new();

    for pattern in &rules.critical_patterns {
        if lower_body.contains(pattern.as_str()) {
            signals.push(format!("critical-pattern:{pattern}"));
        }
    }
    for tool in request.tool_names {
        let lower_tool = tool.to_lowercase();
        if rules.high_risk_tools.contains(&lower_tool) {
            signals.push(format!("high-risk-tool:{lower_tool}"));
        }
    }
    for pattern in &rules.high_risk_patterns {
        if lower_body.contains(pattern.as_str()) {
            signals.push(format!("high-risk-pattern:{pattern}"));
        }
    }
    let lower_path = request.path.to_lowercase();
    if (lower_path.contains("admin") || lower_path.contains("system")) && request.method != "GET" {
        signals.push("high-risk-path:admin-system".to_string());
    }
    for modality in request.modalities {
        if modality != "text" {
            signals.push(format!("modality:{modality}"));
        }
    }

    let has_critical = signals.iter().any(|s| s.starts_with("critical-pattern:"));
    let has_high_risk = signals.iter().any(|s| s.starts_with("high-risk-") || s.starts_with("modality:"));

    if has_critical {
        Decision::block_with_signals(RiskClass::Critical, signals, "critical pattern matched")
    } else if has_high_risk {
        Decision::require_approval(RiskClass::High, signals, "high-risk signal matched")
    } else {
        Decision::allow_with_risk(RiskClass::Low)
    }
}
