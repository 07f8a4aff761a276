// SPDX-License-Identifier: MIT OR Apache-2.0
//! `CapabilityRules`: per-scope tool/action allow/deny lists (SPEC_FULL §3, §4.2).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Whether a [`ScopeRules`] entry allows everything not denied, or denies
/// everything not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Everything is permitted except entries in the deny sets.
    AllowAll,
    /// Nothing is permitted except entries in the allow sets.
    DenyAll,
}

/// Allow/deny tool and action sets for one capability scope.
///
/// `mode` governs tools and actions independently of one another; each has
/// its own allow/deny sets, but both fall back to the same default posture
/// when a name appears in neither of its sets. Deny always takes precedence
/// over allow, regardless of `mode` (SPEC_FULL §4.2 "denylist beats
/// allowlist").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRules {
    /// Default posture when neither allow nor deny names the tool/action.
    pub mode: Mode,
    /// Tool names explicitly permitted.
    #[serde(default)]
    pub allow_tools: BTreeSet<String>,
    /// Tool names explicitly forbidden; wins over `allow_tools` on overlap.
    #[serde(default)]
    pub deny_tools: BTreeSet<String>,
    /// Action names explicitly permitted (e.g. `"tool.execute"`).
    #[serde(default)]
    pub allow_actions: BTreeSet<String>,
    /// Action names explicitly forbidden; wins over `allow_actions` on overlap.
    #[serde(default)]
    pub deny_actions: BTreeSet<String>,
}

impl ScopeRules {
    /// Evaluates whether `tool` is permitted under these rules.
    #[must_use]
    pub fn permits(&self, tool: &str) -> bool {
        permits_in(&self.mode, &self.allow_tools, &self.deny_tools, tool)
    }

    /// Evaluates whether `action` is permitted under these rules.
    #[must_use]
    pub fn permits_action(&self, action: &str) -> bool {
        permits_in(&self.mode, &self.allow_actions, &self.deny_actions, action)
    }
}

fn permits_in(mode: &Mode, allow: &BTreeSet<String>, deny: &BTreeSet<String>, name: &str) -> bool {
    let name = name.to_lowercase();
    if deny.contains(&name) {
        return false;
    }
    if allow.contains(&name) {
        return true;
    }
    matches!(mode, Mode::AllowAll)
}

/// A default [`ScopeRules`] plus per-channel overrides.
///
/// A channel without an explicit override inherits `default` in full
/// (SPEC_FULL §4.2); overrides replace the entire scope, they do not merge
/// with `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRules {
    /// Rules applied when a channel has no override.
    pub default: ScopeRules,
    /// Per-channel replacements for `default`.
    #[serde(default)]
    pub channel_overrides: BTreeMap<String, ScopeRules>,
}

impl CapabilityRules {
    /// Evaluates whether `tool` is permitted on `channel`.
    #[must_use]
    pub fn permits(&self, channel: &str, tool: &str) -> bool {
        self.scope(channel).permits(tool)
    }

    /// Evaluates whether `action` is permitted on `channel`.
    #[must_use]
    pub fn permits_action(&self, channel: &str, action: &str) -> bool {
        self.scope(channel).permits_action(action)
    }

    fn scope(&self, channel: &str) -> &ScopeRules {
        self.channel_overrides.get(channel).unwrap_or(&self.default)
    }
}
