// SPDX-License-Identifier: MIT OR Apache-2.0
//! The inbound fields the gate pipeline inspects, and the request fingerprint
//! derived from them (SPEC_FULL §4.2 step 5).

use gate_catalog::Modality;
use gate_core::canonical::hash_canonical_json;
use gate_error::ClaweeError;
use serde::Serialize;
use std::net::IpAddr;

/// Everything one pipeline evaluation needs, gathered by the out-of-scope
/// ingress layer before calling [`crate::PipelineDriver::evaluate`].
///
/// DNS resolution of `target_host` is the caller's responsibility
/// (`gate_engines::egress` takes already-resolved addresses); `resolved_ips`
/// is empty when `target_host` is itself a literal IP.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Upstream hostname this request would egress to.
    pub target_host: String,
    /// Addresses `target_host` resolved to, or empty for a literal IP.
    pub resolved_ips: Vec<IpAddr>,
    /// Channel the request arrived on (e.g. `"slack"`, `"cli"`).
    pub channel: String,
    /// Action being performed, e.g. `"tool.execute"`, `"chat.complete"`.
    pub action: String,
    /// Tool names this request would invoke, if any.
    pub tool_names: Vec<String>,
    /// Upstream model identifier.
    pub model_id: String,
    /// Modality of the model call.
    pub modality: Modality,
    /// Request path (as seen by the policy engine).
    pub path: String,
    /// HTTP-style method.
    pub method: String,
    /// Request body, inspected by the policy engine.
    pub body: String,
    /// Modalities present in the request body (policy-engine signal set;
    /// distinct from `modality`, which targets the model registry).
    pub modalities: Vec<String>,
    /// Nonce to register against replay, if the channel supplies one.
    pub nonce: Option<String>,
    /// Idempotency event key to register against replay, if supplied instead
    /// of (or alongside) a nonce.
    pub event_key: Option<String>,
    /// Estimated input tokens, for the pre-forward budget projection.
    pub projected_input_tokens: u64,
    /// Estimated output tokens, for the pre-forward budget projection.
    pub projected_output_tokens: u64,
}

/// The normalized subset of [`RequestContext`] that identifies "the same
/// approvable operation" across retries (SPEC_FULL §3 `request_fingerprint`).
#[derive(Serialize)]
struct FingerprintFields<'a> {
    channel: &'a str,
    action: &'a str,
    tool_names: Vec<&'a str>,
    model_id: &'a str,
    modality: Modality,
    path: &'a str,
    method: &'a str,
    body: &'a str,
}

impl RequestContext {
    /// Returns the `"<channel>:<action>"` key used to look up approval and
    /// capability overrides.
    #[must_use]
    pub fn channel_action(&self) -> String {
        format!("{}:{}", self.channel, self.action)
    }

    /// The tool name used to key per-tool approval/capability overrides: the
    /// first requested tool, or `""` for tool-less requests.
    #[must_use]
    pub fn primary_tool(&self) -> &str {
        self.tool_names.first().map_or("", String::as_str)
    }

    /// Computes the canonical request fingerprint: `H(canonical(normalized
    /// request key fields))`. Tool names are sorted so two requests naming
    /// the same tools in a different order fingerprint identically.
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] only if the fields cannot be canonicalized,
    /// which does not happen for this fixed, well-formed shape.
    pub fn fingerprint(&self) -> Result<String, ClaweeError> {
        let mut tool_names: Vec<&str> = self.tool_names.iter().map(String::as_str).collect();
        tool_names.sort_unstable();
        let fields = FingerprintFields {
            channel: &self.channel,
            action: &self.action,
            tool_names,
            model_id: &self.model_id,
            modality: self.modality,
            path: &self.path,
            method: &self.method,
            body: &self.body,
        };
        Ok(hash_canonical_json(&fields)?.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RequestContext {
        RequestContext {
            target_host: "api.example.com".to_string(),
            resolved_ips: Vec::new(),
            channel: "cli".to_string(),
            action: "tool.execute".to_string(),
            tool_names: vec!["bash".to_string(), "curl".to_string()],
            model_id: "gpt-x".to_string(),
            modality: Modality::Text,
            path: "/chat".to_string(),
            method: "POST".to_string(),
            body: "hello".to_string(),
            modalities: vec!["text".to_string()],
            nonce: None,
            event_key: None,
            projected_input_tokens: 100,
            projected_output_tokens: 100,
        }
    }

    #[test]
    fn fingerprint_is_stable_across_calls() {
        let context = context();
        assert_eq!(context.fingerprint().unwrap(), context.fingerprint().unwrap());
    }

    #[test]
    fn fingerprint_is_order_independent_in_tool_names() {
        let mut reordered = context();
        reordered.tool_names = vec!["curl".to_string(), "bash".to_string()];
        assert_eq!(context().fingerprint().unwrap(), reordered.fingerprint().unwrap());
    }

    #[test]
    fn fingerprint_changes_with_body() {
        let mut other = context();
        other.body = "goodbye".to_string();
        assert_ne!(context().fingerprint().unwrap(), other.fingerprint().unwrap());
    }

    #[test]
    fn channel_action_joins_with_colon() {
        assert_eq!(context().channel_action(), "cli:tool.execute");
    }

    #[test]
    fn primary_tool_is_empty_when_no_tools_requested() {
        let mut no_tools = context();
        no_tools.tool_names.clear();
        assert_eq!(no_tools.primary_tool(), "");
    }
}
