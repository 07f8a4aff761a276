// SPDX-License-Identifier: MIT OR Apache-2.0
//! `DestinationPolicy`: per-channel regex allow/deny lists (SPEC_FULL §4.8).

use crate::capability::Mode;
use gate_error::{ClaweeError, ErrorCode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw, on-disk regex pattern lists for one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationRulesSource {
    /// Default posture when no pattern in either list matches.
    pub mode: Mode,
    /// Patterns explicitly permitted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Patterns explicitly forbidden; wins over `allow` on overlap.
    #[serde(default)]
    pub deny: Vec<String>,
}

/// Compiled allow/deny regex lists for one channel.
///
/// Evaluation order (SPEC_FULL §4.8): a deny match always wins; otherwise
/// under [`Mode::DenyAll`] an allow match is required, and under
/// [`Mode::AllowAll`] everything is permitted unless an allowlist is
/// configured and nothing in it matches.
pub struct CompiledDestinationRules {
    mode: Mode,
    allow: Vec<Regex>,
    deny: Vec<Regex>,
}

impl CompiledDestinationRules {
    /// Compiles every pattern in `source`; fails the whole load on the first
    /// invalid pattern (SPEC_FULL §4.8 "compilation... must be total").
    pub fn compile(source: &DestinationRulesSource) -> Result<Self, ClaweeError> {
        Ok(Self {
            mode: source.mode,
            allow: compile_all(&source.allow)?,
            deny: compile_all(&source.deny)?,
        })
    }

    /// Evaluates whether `destination` is permitted under these rules.
    #[must_use]
    pub fn permits(&self, destination: &str) -> bool {
        if self.deny.iter().any(|re| re.is_match(destination)) {
            return false;
        }
        let allow_matches = self.allow.iter().any(|re| re.is_match(destination));
        match self.mode {
            Mode::DenyAll => allow_matches,
            Mode::AllowAll => self.allow.is_empty() || allow_matches,
        }
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, ClaweeError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                ClaweeError::new(ErrorCode::ConfigCatalogUnparseable, "invalid destination policy regex")
                    .with_context("pattern", p.clone())
                    .with_context("cause", e.to_string())
            })
        })
        .collect()
}

/// A default channel's rules plus per-channel overrides, both compiled.
pub struct DestinationPolicy {
    default: CompiledDestinationRules,
    channel_overrides: BTreeMap<String, CompiledDestinationRules>,
}

impl DestinationPolicy {
    /// Compiles a full destination policy from its raw source document.
    pub fn compile(
        default: &DestinationRulesSource,
        channel_overrides: &BTreeMap<String, DestinationRulesSource>,
    ) -> Result<Self, ClaweeError> {
        let default = CompiledDestinationRules::compile(default)?;
        let channel_overrides = channel_overrides
            .iter()
            .map(|(channel, source)| Ok((channel.clone(), CompiledDestinationRules::compile(source)?)))
            .collect::<Result<_, ClaweeError>>()?;
        Ok(Self { default, channel_overrides })
    }

    /// Evaluates whether `destination` is permitted on `channel`.
    #[must_use]
    pub fn permits(&self, channel: &str, destination: &str) -> bool {
        self.channel_overrides.get(channel).unwrap_or(&self.default).permits(destination)
    }
}
