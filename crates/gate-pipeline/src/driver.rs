// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`PipelineDriver`]: the fixed-order gate chain (SPEC_FULL §4.2).
//!
//! Every dependency is constructor-injected; there are no global singletons
//! (SPEC_FULL §9). A gate that returns a non-allow [`Decision`] short-circuits
//! the remaining gates — the invariant registry is only updated for gates
//! that actually ran (SPEC_FULL §4.2, §4.7).

use crate::context::RequestContext;
use crate::outcome::{GateId, PipelineOutcome};
use chrono::{Duration, Utc};
use gate_approval::ApprovalStore;
use gate_budget::BudgetController;
use gate_catalog::{ApprovalPolicy, CapabilityRules, CatalogHandle, ModelRegistry, PolicyRules, PricingCatalog};
use gate_core::canonical::hash_bytes;
use gate_core::{Decision, RiskClass};
use gate_engines::egress::EgressRules;
use gate_engines::policy::PolicyRequest;
use gate_engines::{evaluate_action, evaluate_capability, evaluate_egress, evaluate_model, evaluate_policy};
use gate_error::ClaweeError;
use gate_replay::{EVENT_KEY_TTL_FLOOR, NONCE_TTL_FLOOR, ReplayStore};
use gate_telemetry::InvariantRegistry;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Constructor-injected dependencies composing the gate pipeline.
///
/// Catalogs arrive pre-loaded (and individually hot-reloadable via their
/// [`CatalogHandle`]); stores and the invariant registry are long-lived,
/// process-scoped resources the caller owns and passes in (SPEC_FULL §9).
pub struct PipelineDriver {
    policy_catalog: CatalogHandle<PolicyRules>,
    capability_catalog: CatalogHandle<CapabilityRules>,
    model_registry_catalog: CatalogHandle<ModelRegistry>,
    approval_policy_catalog: CatalogHandle<ApprovalPolicy>,
    pricing_catalog: CatalogHandle<PricingCatalog>,
    egress_rules: EgressRules,
    approval_store: ApprovalStore,
    approval_ttl: Duration,
    budget_controller: BudgetController,
    replay_store: Arc<dyn ReplayStore>,
    invariants: Arc<InvariantRegistry>,
}

impl PipelineDriver {
    /// Assembles a pipeline driver from its constructor-injected dependencies.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy_catalog: CatalogHandle<PolicyRules>,
        capability_catalog: CatalogHandle<CapabilityRules>,
        model_registry_catalog: CatalogHandle<ModelRegistry>,
        approval_policy_catalog: CatalogHandle<ApprovalPolicy>,
        pricing_catalog: CatalogHandle<PricingCatalog>,
        egress_rules: EgressRules,
        approval_store: ApprovalStore,
        approval_ttl: Duration,
        budget_controller: BudgetController,
        replay_store: Arc<dyn ReplayStore>,
        invariants: Arc<InvariantRegistry>,
    ) -> Self {
        Self {
            policy_catalog,
            capability_catalog,
            model_registry_catalog,
            approval_policy_catalog,
            pricing_catalog,
            egress_rules,
            approval_store,
            approval_ttl,
            budget_controller,
            replay_store,
            invariants,
        }
    }

    /// Returns the invariant registry this driver feeds, for exposing a
    /// `/security/invariants` style surface alongside the pipeline.
    #[must_use]
    pub fn invariants(&self) -> &Arc<InvariantRegistry> {
        &self.invariants
    }

    /// Runs the fixed-order gate chain against `context` (SPEC_FULL §4.2).
    ///
    /// Returns as soon as a gate produces a non-allow decision; later gates
    /// do not run and their invariants are not touched. Backend failures
    /// from `gate-approval`, `gate-budget`, or `gate-replay` are converted to
    /// a fail-closed [`Decision::Block`] at this boundary rather than
    /// propagated (SPEC_FULL §7).
    pub fn evaluate(&self, context: &RequestContext) -> PipelineOutcome {
        // Step 1: runtime egress.
        let egress_decision = evaluate_egress(&context.target_host, &context.resolved_ips, &self.egress_rules);
        self.record(GateId::Egress, &egress_decision);
        if !egress_decision.is_allow() {
            return short_circuit(GateId::Egress, egress_decision);
        }

        // Step 2: capability gate. Every request's action is checked against
        // the channel's action allow/deny lists; a tool-executing action is
        // additionally checked per tool it names.
        let capability_decision = self.evaluate_capability_step(context);
        self.record(GateId::Capability, &capability_decision);
        if !capability_decision.is_allow() {
            return short_circuit(GateId::Capability, capability_decision);
        }

        // Step 3: model registry.
        let model_decision = evaluate_model(&self.model_registry_catalog.current().rules, &context.model_id, context.modality, Utc::now());
        self.record(GateId::Model, &model_decision);
        if !model_decision.is_allow() {
            return short_circuit(GateId::Model, model_decision);
        }

        // Step 4: policy engine.
        let policy_request = PolicyRequest {
            body: &context.body,
            path: &context.path,
            method: &context.method,
            tool_names: &context.tool_names,
            modalities: &context.modalities,
        };
        let policy_decision = evaluate_policy(&self.policy_catalog.current().rules, &policy_request);
        self.record(GateId::Policy, &policy_decision);
        if let Decision::Block { .. } = policy_decision {
            return short_circuit(GateId::Policy, policy_decision);
        }

        // Step 5: approval gate. Only runs when the policy engine required
        // approval; an outright policy allow skips it, and its invariant is
        // left untouched for this request (SPEC_FULL §4.2 "a gate that was
        // skipped... does not affect its invariant").
        if let Decision::RequireApproval { risk_class, matched_signals, .. } = policy_decision {
            let fingerprint = match context.fingerprint() {
                Ok(fingerprint) => fingerprint,
                Err(err) => return fail_closed(GateId::Approval, &self.invariants, &err),
            };
            let approval_decision = self.evaluate_approval_step(context, risk_class, &matched_signals, &fingerprint);
            self.record(GateId::Approval, &approval_decision);
            if !approval_decision.is_allow() {
                return PipelineOutcome {
                    decision: approval_decision,
                    gate: Some(GateId::Approval),
                    request_fingerprint: Some(fingerprint),
                };
            }
        }

        // Step 6: budget controller, projected check.
        let budget_decision = match self.budget_controller.check_projected(
            &self.pricing_catalog.current().rules,
            &context.model_id,
            context.projected_input_tokens,
            context.projected_output_tokens,
        ) {
            Ok(decision) => decision,
            Err(err) => return fail_closed(GateId::Budget, &self.invariants, &err),
        };
        self.record(GateId::Budget, &budget_decision);
        if !budget_decision.is_allow() {
            return short_circuit(GateId::Budget, budget_decision);
        }

        // Step 7: replay protection, immediately preceding forward.
        let replay_decision = match self.evaluate_replay_step(context) {
            Ok(decision) => decision,
            Err(err) => return fail_closed(GateId::Replay, &self.invariants, &err),
        };
        if let Some(decision) = replay_decision {
            self.record(GateId::Replay, &decision);
            if !decision.is_allow() {
                return short_circuit(GateId::Replay, decision);
            }
        }

        let fingerprint = context.fingerprint().ok();
        PipelineOutcome { decision: Decision::allow(), gate: None, request_fingerprint: fingerprint }
    }

    /// Records an upstream response's actual token usage against the budget
    /// controller (SPEC_FULL §4.2 step 7, post-forward; §4.4).
    ///
    /// # Errors
    ///
    /// Returns [`ClaweeError`] if `model_id` has no pricing entry or the
    /// backend fails. Unlike the pre-forward gates, this call happens after
    /// the request was already forwarded, so the caller — not this method —
    /// decides how to react to a crossed cap on the next request.
    pub fn record_actual(
        &self,
        model_id: &str,
        input_tokens: u64,
        output_tokens: u64,
        request_path: &str,
    ) -> Result<Decision, ClaweeError> {
        let decision =
            self.budget_controller.record_actual(&self.pricing_catalog.current().rules, model_id, input_tokens, output_tokens, request_path)?;
        self.record(GateId::Budget, &decision);
        Ok(decision)
    }

    fn evaluate_capability_step(&self, context: &RequestContext) -> Decision {
        let rules = self.capability_catalog.current();

        let action_decision = evaluate_action(&rules.rules, &context.channel, &context.action);
        if !action_decision.is_allow() {
            return action_decision;
        }

        if context.action != "tool.execute" || context.tool_names.is_empty() {
            return Decision::allow();
        }
        for tool in &context.tool_names {
            let decision = evaluate_capability(&rules.rules, &context.channel, tool);
            if !decision.is_allow() {
                return decision;
            }
        }
        Decision::allow()
    }

    fn evaluate_approval_step(
        &self,
        context: &RequestContext,
        risk_class: RiskClass,
        matched_signals: &[String],
        fingerprint: &str,
    ) -> Decision {
        let requirement = self.approval_policy_catalog.current().rules.resolve(risk_class, context.primary_tool(), &context.channel_action());

        match self.approval_store.find_valid_approved(fingerprint) {
            Ok(Some(record)) => match self.approval_store.consume_approved(record.id, fingerprint) {
                Ok(true) => return Decision::allow_with_risk(risk_class),
                Ok(false) => {}
                Err(err) => return fail_closed_decision(&err),
            },
            Ok(None) => {}
            Err(err) => return fail_closed_decision(&err),
        }

        let metadata = json!({
            "channel": context.channel,
            "action": context.action,
            "tool_names": context.tool_names,
        });
        let reason = format!("high-risk request requires {} approval(s)", requirement.required_approvals);
        match self.approval_store.create_or_upgrade_pending(fingerprint, &requirement, &reason, metadata, self.approval_ttl) {
            Ok(record) => Decision::require_approval(
                risk_class,
                matched_signals.to_vec(),
                format!("awaiting approval: {}/{} approvals recorded", record.approval_actors.len(), record.required_approvals),
            ),
            Err(err) => fail_closed_decision(&err),
        }
    }

    fn evaluate_replay_step(&self, context: &RequestContext) -> Result<Option<Decision>, ClaweeError> {
        if let Some(nonce) = &context.nonce {
            let registered = self.replay_store.register_nonce(&hash_bytes(nonce.as_bytes()), NONCE_TTL_FLOOR)?;
            if !registered {
                return Ok(Some(Decision::block("nonce has already been seen")));
            }
        }
        if let Some(event_key) = &context.event_key {
            let registered = self.replay_store.register_event_key(&hash_bytes(event_key.as_bytes()), EVENT_KEY_TTL_FLOOR)?;
            if !registered {
                return Ok(Some(Decision::block("event key has already been seen")));
            }
        }
        if context.nonce.is_none() && context.event_key.is_none() {
            return Ok(None);
        }
        Ok(Some(Decision::allow()))
    }

    fn record(&self, gate: GateId, decision: &Decision) {
        let passed = decision.is_allow();
        let reason = decision.reason().map(ToString::to_string);
        debug!(target: "clawee.pipeline", gate = ?gate, passed, "gate evaluated");
        if let Err(err) = self.invariants.check(gate.invariant_id(), passed, reason, None) {
            debug!(target: "clawee.pipeline", %err, "failed to record invariant check");
        }
    }
}


fn short_circuit(gate: GateId, decision: Decision) -> PipelineOutcome {
    PipelineOutcome { decision, gate: Some(gate), request_fingerprint: None }
}

fn fail_closed_decision(err: &ClaweeError) -> Decision {
    Decision::block(format!("backend unavailable: {}", err.message))
}

fn fail_closed(gate: GateId, invariants: &InvariantRegistry, err: &ClaweeError) -> PipelineOutcome {
    let decision = fail_closed_decision(err);
    let _ = invariants.check(gate.invariant_id(), false, Some(decision.reason().unwrap_or_default().to_string()), None);
    PipelineOutcome { decision, gate: Some(gate), request_fingerprint: None }
}
