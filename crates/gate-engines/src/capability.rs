// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability gate: per-channel tool and action allow/deny (SPEC_FULL §4.2 step 2).

use gate_catalog::CapabilityRules;
use gate_core::Decision;

/// Evaluates whether `action` may be performed on `channel` under `rules`.
///
/// Denylist always wins over allowlist; an action absent from both lists
/// falls back to the scope's configured [`gate_catalog::Mode`]. Called once
/// per request, ahead of the per-tool [`evaluate_capability`] loop.
#[must_use]
pub fn evaluate_action(rules: &CapabilityRules, channel: &str, action: &str) -> Decision {
    if rules.permits_action(channel, action) {
        Decision::allow()
    } else {
        Decision::block(format!("action '{action}' is not permitted on channel '{channel}'"))
    }
}

/// Evaluates whether `tool` may be used on `channel` under `rules`.
///
/// Denylist always wins over allowlist; a tool absent from both lists falls
/// back to the scope's configured [`gate_catalog::Mode`].
#[must_use]
pub fn evaluate_capability(rules: &CapabilityRules, channel: &str, tool: &str) -> Decision {
    if rules.permits(channel, tool) {
        Decision::allow()
    } else {
        Decision::block(format!("tool '{tool}' is not permitted on channel '{channel}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_catalog::{Mode, ScopeRules};
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    fn rules() -> CapabilityRules {
        CapabilityRules {
            default: ScopeRules {
                mode: Mode::DenyAll,
                allow_tools: ["read_file".to_string()].into_iter().collect(),
                deny_tools: BTreeSet::new(),
                allow_actions: ["chat.complete".to_string(), "tool.execute".to_string()].into_iter().collect(),
                deny_actions: BTreeSet::new(),
            },
            channel_overrides: BTreeMap::new(),
        }
    }

    #[test]
    fn allowed_tool_passes() {
        assert!(evaluate_capability(&rules(), "email", "read_file").is_allow());
    }

    #[test]
    fn tool_outside_allowlist_is_blocked() {
        let decision = evaluate_capability(&rules(), "email", "write_file");
        assert!(!decision.is_allow());
        assert!(decision.reason().unwrap().contains("write_file"));
    }

    #[test]
    fn allowed_action_passes() {
        assert!(evaluate_action(&rules(), "email", "tool.execute").is_allow());
    }

    #[test]
    fn action_outside_allowlist_is_blocked() {
        let decision = evaluate_action(&rules(), "email", "admin.override");
        assert!(!decision.is_allow());
        assert!(decision.reason().unwrap().contains("admin.override"));
    }
}
