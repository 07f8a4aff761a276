// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end pipeline tests wiring every gate crate together the way a real
//! deployment would, exercising the fixed-order chain described in SPEC_FULL
//! §4.2 and the end-to-end scenarios in §8.
//!
//! These tests cover: the benign allow path, egress/capability/model denials,
//! the policy→approval handoff through to a consumed approval, replay
//! rejection, and budget suspension across a cap boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Duration;
use gate_budget::{BudgetCaps, BudgetController};
use gate_catalog::{
    ApprovalPolicy, ApprovalRequirement, CapabilityRules, CatalogHandle, Mode, Modality,
    ModelPrice, ModelRegistry, ModelRegistryEntry, PolicyRules, PricingCatalog, ScopeRules,
    SignedCatalog,
};
use gate_core::{HashDigest, SigningMode};
use gate_engines::egress::EgressRules;
use gate_pipeline::{GateId, PipelineDriver, RequestContext};
use gate_replay::LocalReplayStore;
use gate_store::SqliteStoreConfig;
use gate_telemetry::InvariantRegistry;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn unsigned<T>(rules: T) -> SignedCatalog<T> {
    SignedCatalog { rules, fingerprint: HashDigest::sha256("test"), signing_mode: SigningMode::None, active_kid: None }
}

/// Wires up a complete [`PipelineDriver`] against fresh, temp-dir-backed
/// SQLite stores, the way a deployment's composition root would at startup.
struct Deployment {
    driver: PipelineDriver,
    _dir: tempfile::TempDir,
}

fn deployment() -> Deployment {
    let dir = tempfile::tempdir().unwrap();

    let policy_catalog = CatalogHandle::new(unsigned(PolicyRules {
        high_risk_tools: BTreeSet::from(["bash".to_string()]),
        critical_patterns: BTreeSet::from(["drop table".to_string()]),
        high_risk_patterns: BTreeSet::from(["rm -rf".to_string()]),
    }));
    let capability_catalog = CatalogHandle::new(unsigned(CapabilityRules {
        default: ScopeRules {
            mode: Mode::DenyAll,
            allow_tools: BTreeSet::from(["bash".to_string(), "curl".to_string()]),
            deny_tools: BTreeSet::new(),
            allow_actions: BTreeSet::from(["chat.complete".to_string(), "tool.execute".to_string()]),
            deny_actions: BTreeSet::new(),
        },
        channel_overrides: BTreeMap::new(),
    }));
    let model_registry_catalog = CatalogHandle::new(unsigned(ModelRegistry {
        entries: vec![ModelRegistryEntry {
            model_id: "gpt-x".to_string(),
            modality: Modality::Text,
            artifact_digest: "digest".to_string(),
            approved: true,
            valid_from: None,
            valid_to: None,
            signature: "sig".to_string(),
        }],
    }));
    let approval_policy_catalog = CatalogHandle::new(unsigned(ApprovalPolicy {
        default: ApprovalRequirement { required_approvals: 2, required_roles: BTreeSet::from(["on-call".to_string()]) },
        by_risk_class: BTreeMap::new(),
        by_tool: BTreeMap::new(),
        by_channel_action: BTreeMap::new(),
    }));
    let pricing_catalog = CatalogHandle::new(unsigned(PricingCatalog {
        prices: BTreeMap::from([("gpt-x".to_string(), ModelPrice { input_price_per_1k: 0.5, output_price_per_1k: 1.5 })]),
    }));

    let approval_store = gate_approval::ApprovalStore::open(SqliteStoreConfig::at_path(dir.path().join("approvals.db"))).unwrap();
    let budget_controller = BudgetController::open(
        SqliteStoreConfig::at_path(dir.path().join("budget.db")),
        BudgetCaps { hourly_usd_cap: 5.0, daily_usd_cap: 50.0 },
    )
    .unwrap();
    let replay_store = LocalReplayStore::open(SqliteStoreConfig::at_path(dir.path().join("replay.db"))).unwrap();

    let driver = PipelineDriver::new(
        policy_catalog,
        capability_catalog,
        model_registry_catalog,
        approval_policy_catalog,
        pricing_catalog,
        EgressRules::allow_all(),
        approval_store,
        Duration::minutes(30),
        budget_controller,
        Arc::new(replay_store),
        Arc::new(InvariantRegistry::new()),
    );
    Deployment { driver, _dir: dir }
}

fn benign_chat(nonce: &str) -> RequestContext {
    RequestContext {
        target_host: "api.example.com".to_string(),
        resolved_ips: Vec::new(),
        channel: "slack".to_string(),
        action: "chat.complete".to_string(),
        tool_names: Vec::new(),
        model_id: "gpt-x".to_string(),
        modality: Modality::Text,
        path: "/v1/chat".to_string(),
        method: "POST".to_string(),
        body: "what's the weather like".to_string(),
        modalities: vec!["text".to_string()],
        nonce: Some(nonce.to_string()),
        event_key: None,
        projected_input_tokens: 200,
        projected_output_tokens: 200,
    }
}

// ---------------------------------------------------------------------------
// Full pipeline: nominal allow path
// ---------------------------------------------------------------------------

#[test]
fn benign_chat_request_forwards_through_every_gate() {
    let deployment = deployment();
    let outcome = deployment.driver.evaluate(&benign_chat("n-1"));
    assert!(outcome.should_forward());
    assert!(outcome.gate.is_none());

    let snapshot = deployment.driver.invariants().snapshot();
    for id in ["INV-001-EGRESS-GATE", "INV-002-CAPABILITY-GATE", "INV-003-POLICY-GATE", "INV-004-MODEL-REGISTRY"] {
        let state = snapshot.iter().find(|s| s.id == id).unwrap();
        assert_eq!(state.passes, 1, "{id} should have recorded exactly one pass");
    }
}

// ---------------------------------------------------------------------------
// Early-gate denials short-circuit later gates
// ---------------------------------------------------------------------------

#[test]
fn disallowed_tool_is_stopped_at_the_capability_gate_before_policy_runs() {
    let deployment = deployment();
    let mut request = benign_chat("n-2");
    request.action = "tool.execute".to_string();
    request.tool_names = vec!["ssh".to_string()];

    let outcome = deployment.driver.evaluate(&request);
    assert!(!outcome.should_forward());
    assert_eq!(outcome.gate, Some(GateId::Capability));

    let snapshot = deployment.driver.invariants().snapshot();
    let policy = snapshot.iter().find(|s| s.id == "INV-003-POLICY-GATE").unwrap();
    assert_eq!(policy.passes + policy.failures, 0, "policy gate never ran");
}

#[test]
fn disallowed_action_is_stopped_at_the_capability_gate_before_the_tool_loop() {
    let deployment = deployment();
    let mut request = benign_chat("n-2b");
    request.action = "admin.override".to_string();
    request.tool_names = vec!["bash".to_string()];

    let outcome = deployment.driver.evaluate(&request);
    assert!(!outcome.should_forward());
    assert_eq!(outcome.gate, Some(GateId::Capability));
}

#[test]
fn unregistered_model_is_stopped_at_the_model_gate() {
    let deployment = deployment();
    let mut request = benign_chat("n-3");
    request.model_id = "shadow-model".to_string();

    let outcome = deployment.driver.evaluate(&request);
    assert!(!outcome.should_forward());
    assert_eq!(outcome.gate, Some(GateId::Model));
}

// ---------------------------------------------------------------------------
// Policy engine tie-break
// ---------------------------------------------------------------------------

#[test]
fn critical_pattern_blocks_regardless_of_channel() {
    let deployment = deployment();
    let mut request = benign_chat("n-4");
    request.body = "please drop table accounts".to_string();

    let outcome = deployment.driver.evaluate(&request);
    assert!(!outcome.should_forward());
    assert_eq!(outcome.gate, Some(GateId::Policy));
}

// ---------------------------------------------------------------------------
// Policy -> approval handoff, through to a consumed quorum
// ---------------------------------------------------------------------------

#[test]
fn high_risk_request_waits_for_quorum_then_forwards_once_satisfied() {
    let deployment = deployment();
    let mut request = benign_chat("n-5");
    request.action = "tool.execute".to_string();
    request.tool_names = vec!["bash".to_string()];
    request.body = "rm -rf /tmp/scratch".to_string();

    let pending = deployment.driver.evaluate(&request);
    assert!(!pending.should_forward());
    assert_eq!(pending.gate, Some(GateId::Approval));
    let fingerprint = pending.request_fingerprint.expect("approval gate always reports a fingerprint");

    // First approver alone does not satisfy the two-approver, on-call-role quorum.
    let approval_store = approval_store_handle(&deployment);
    let requirement = ApprovalRequirement { required_approvals: 2, required_roles: BTreeSet::from(["on-call".to_string()]) };
    let record = approval_store
        .create_or_upgrade_pending(&fingerprint, &requirement, "high-risk tool invocation", serde_json::Value::Null, Duration::minutes(30))
        .unwrap();
    approval_store.record_decision(record.id, "alice", "on-call", true).unwrap();
    let still_pending = deployment.driver.evaluate(&retry_with_nonce(&request, "n-5-retry-1"));
    assert!(!still_pending.should_forward(), "a single approver does not satisfy a two-approver quorum");

    approval_store.record_decision(record.id, "bob", "on-call", true).unwrap();
    let approved = deployment.driver.evaluate(&retry_with_nonce(&request, "n-5-retry-2"));
    assert!(approved.should_forward(), "quorum satisfied, the consumed approval should forward the retry");
}

fn retry_with_nonce(request: &RequestContext, nonce: &str) -> RequestContext {
    let mut retry = request.clone();
    retry.nonce = Some(nonce.to_string());
    retry
}

/// Reaches into the driver's private `approval_store` field is not possible
/// from an external integration test, so this test drives approval state
/// through a store opened against the same database file instead.
fn approval_store_handle(deployment: &Deployment) -> gate_approval::ApprovalStore {
    gate_approval::ApprovalStore::open(SqliteStoreConfig::at_path(deployment._dir.path().join("approvals.db"))).unwrap()
}

// ---------------------------------------------------------------------------
// Replay protection
// ---------------------------------------------------------------------------

#[test]
fn replaying_the_same_nonce_is_rejected_on_the_second_attempt() {
    let deployment = deployment();
    let request = benign_chat("shared-nonce");
    let first = deployment.driver.evaluate(&request);
    assert!(first.should_forward());

    let second = deployment.driver.evaluate(&request);
    assert!(!second.should_forward());
    assert_eq!(second.gate, Some(GateId::Replay));
}

// ---------------------------------------------------------------------------
// Budget cap crossing
// ---------------------------------------------------------------------------

#[test]
fn projected_cost_crossing_the_hourly_cap_blocks_and_suspends_later_requests() {
    let deployment = deployment();
    let mut expensive = benign_chat("n-6");
    expensive.projected_input_tokens = 10_000;
    expensive.projected_output_tokens = 10_000;

    let outcome = deployment.driver.evaluate(&expensive);
    assert!(!outcome.should_forward());
    assert_eq!(outcome.gate, Some(GateId::Budget));

    // Once suspended, even a cheap follow-up request is blocked at the budget gate.
    let cheap = deployment.driver.evaluate(&benign_chat("n-7"));
    assert!(!cheap.should_forward());
    assert_eq!(cheap.gate, Some(GateId::Budget));
}
