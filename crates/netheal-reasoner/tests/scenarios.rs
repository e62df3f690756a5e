//! Reasoner scenarios against the recorded telemetry timeline.

use async_trait::async_trait;
use netheal_core::{
    Decision, DecisionSource, EngineConfig, EngineError, ReasonerKind, RemediationAction,
    TelemetryRecord,
};
use netheal_reasoner::{
    build_reasoner, ModelBackedReasoner, ModelClient, ModelError, Reasoner, RuleBasedReasoner,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TIMELINE_PATH: &str = "fixtures/telemetry_timeline.json";

fn timeline() -> Vec<TelemetryRecord> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = std::path::Path::new(&manifest_dir).parent().unwrap().parent().unwrap();
    let raw = std::fs::read_to_string(workspace_root.join(TIMELINE_PATH)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn incident_for(resource: &str) -> TelemetryRecord {
    timeline()
        .into_iter()
        .find(|r| r.is_incident() && r.resource_id().unwrap() == resource)
        .unwrap()
}

/// Replies with a canned string and counts calls
struct StubClient {
    reply: String,
    calls: AtomicUsize,
}

impl StubClient {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: reply.to_string(), calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ModelClient for StubClient {
    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

struct DownClient;

#[async_trait]
impl ModelClient for DownClient {
    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::Unavailable("connection refused".to_string()))
    }
}

struct SlowClient;

#[async_trait]
impl ModelClient for SlowClient {
    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("{\"action\": \"load_balancing\", \"confidence\": 0.99}".to_string())
    }
}

fn rule_decision(record: &TelemetryRecord) -> Decision {
    RuleBasedReasoner::default().decide(record).unwrap()
}

// =============================================================================
// Rule-based scenarios
// =============================================================================

#[test]
fn test_timeline_parses() {
    let records = timeline();
    assert_eq!(records.len(), 7);
    for record in &records {
        record.validate().unwrap();
    }
}

#[test]
fn test_congested_cell_from_timeline() {
    let decision = rule_decision(&incident_for("cell-A01"));

    assert_eq!(decision.root_cause, "congestion");
    assert_eq!(decision.recommended_action, RemediationAction::LoadBalancing);
    assert!(decision.confidence >= 0.85);
    assert!(decision.can_auto_execute);
    assert_eq!(decision.rollback_window_min, 5);
    assert_eq!(decision.source, DecisionSource::RuleBased);
}

#[test]
fn test_degraded_link_from_timeline() {
    let decision = rule_decision(&incident_for("transport-link-B17"));
    assert_eq!(decision.recommended_action, RemediationAction::TrafficSteering);
}

#[test]
fn test_satellite_beam_is_recommendation_only() {
    let decision = rule_decision(&incident_for("sat-beam-07"));

    assert_eq!(decision.root_cause, "satellite link degradation");
    assert_eq!(decision.recommended_action, RemediationAction::TrafficSteering);
    assert!(decision.confidence < 0.85);
    assert!(!decision.can_auto_execute);
}

#[test]
fn test_normal_records_rejected() {
    let reasoner = RuleBasedReasoner::default();
    for record in timeline().iter().filter(|r| !r.is_incident()) {
        assert!(matches!(reasoner.decide(record), Err(EngineError::InvalidInput(_))));
    }
}

#[test]
fn test_decision_json_contract() {
    let decision = rule_decision(&incident_for("cell-A01"));
    let json = serde_json::to_value(&decision).unwrap();

    assert_eq!(json["recommended_action"], "load_balancing");
    assert_eq!(json["expected_impact"]["latency_ms_reduction"], "20.0%");
    assert_eq!(json["expected_impact"]["packet_loss_reduction"], "15.0%");
    assert_eq!(json["expected_impact"]["energy_kwh_reduction"], "15.0%");
    assert_eq!(json["can_auto_execute"], true);
    assert_eq!(json["rollback_window_min"], 5);
}

#[test]
fn test_relaxed_profile_auto_executes_more() {
    let strict = RuleBasedReasoner::from_config(&EngineConfig::default());
    let relaxed = RuleBasedReasoner::from_config(&EngineConfig::relaxed());
    let record = TelemetryRecord::ran("cell-C03").with_utilization(87.5).incident();

    let s = strict.decide(&record).unwrap();
    let r = relaxed.decide(&record).unwrap();
    assert_eq!(s.confidence, 0.81);
    assert_eq!(s.confidence, r.confidence);
    assert!(!s.can_auto_execute);
    assert!(r.can_auto_execute);
    assert_eq!(r.rollback_window_min, 20);
}

// =============================================================================
// Model-backed scenarios
// =============================================================================

#[tokio::test]
async fn test_model_reply_drives_decision() {
    let client = StubClient::new(
        "```json\n{\"action\": \"traffic_steering\", \"root_cause\": \"fiber cut\", \"confidence\": 0.93, \"reasoning\": \"loss spike\"}\n```",
    );
    let reasoner = ModelBackedReasoner::new(client.clone(), &EngineConfig::default());

    let decision = reasoner.analyze(&incident_for("transport-link-B17")).await.unwrap();
    assert_eq!(decision.root_cause, "fiber cut");
    assert_eq!(decision.recommended_action, RemediationAction::TrafficSteering);
    assert_eq!(decision.confidence, 0.93);
    assert!(decision.can_auto_execute);
    assert_eq!(decision.source, DecisionSource::ModelBacked);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_model_root_cause_defaults_to_rules() {
    let client = StubClient::new("{\"action\": \"load_balancing\", \"confidence\": 0.7}");
    let reasoner = ModelBackedReasoner::new(client, &EngineConfig::default());

    let decision = reasoner.analyze(&incident_for("cell-A01")).await.unwrap();
    assert_eq!(decision.root_cause, "congestion");
    assert!(!decision.can_auto_execute);
}

#[tokio::test]
async fn test_model_none_never_auto_executes() {
    let client = StubClient::new("{\"action\": \"none\", \"confidence\": 0.99}");
    let reasoner = ModelBackedReasoner::new(client, &EngineConfig::default());

    let decision = reasoner.analyze(&incident_for("cell-A01")).await.unwrap();
    assert_eq!(decision.recommended_action, RemediationAction::None);
    assert!(!decision.can_auto_execute);
}

#[tokio::test]
async fn test_falls_back_when_model_down() {
    let reasoner = ModelBackedReasoner::new(Arc::new(DownClient), &EngineConfig::default());
    let record = incident_for("cell-A01");

    let decision = reasoner.analyze(&record).await.unwrap();
    assert_eq!(decision, rule_decision(&record));
    assert_eq!(decision.source, DecisionSource::RuleBased);
}

#[tokio::test]
async fn test_falls_back_on_unparseable_reply() {
    let client = StubClient::new("Reboot the cell, I am very sure.");
    let reasoner = ModelBackedReasoner::new(client, &EngineConfig::default());
    let record = incident_for("transport-link-B17");

    let decision = reasoner.analyze(&record).await.unwrap();
    assert_eq!(decision, rule_decision(&record));
}

#[tokio::test]
async fn test_falls_back_on_timeout() {
    let reasoner = ModelBackedReasoner::new(Arc::new(SlowClient), &EngineConfig::default())
        .with_timeout(Duration::from_millis(20));
    let record = incident_for("cell-A01");

    let decision = reasoner.analyze(&record).await.unwrap();
    assert_eq!(decision.source, DecisionSource::RuleBased);
}

#[tokio::test]
async fn test_model_reasoner_still_validates_input() {
    let client = StubClient::new("{\"action\": \"load_balancing\", \"confidence\": 0.9}");
    let reasoner = ModelBackedReasoner::new(client.clone(), &EngineConfig::default());
    let normal = timeline().into_iter().find(|r| !r.is_incident()).unwrap();

    assert!(matches!(reasoner.analyze(&normal).await, Err(EngineError::InvalidInput(_))));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Selection by configuration
// =============================================================================

#[tokio::test]
async fn test_build_reasoner_by_kind() {
    let config = EngineConfig::default();
    assert_eq!(build_reasoner(&config, None).unwrap().name(), "rule_based");

    let config = EngineConfig { reasoner: ReasonerKind::ModelBacked, ..EngineConfig::default() };
    let stub = StubClient::new("{\"action\": \"none\", \"confidence\": 0.1}");
    let reasoner = build_reasoner(&config, Some(stub)).unwrap();
    assert_eq!(reasoner.name(), "model_backed");

    assert!(matches!(build_reasoner(&config, None), Err(EngineError::Config(_))));
}
