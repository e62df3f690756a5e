//! Rule-based reasoner
use crate::confidence::ConfidenceModel;
use crate::gate::{DecisionGate, Diagnosis};
use crate::rule::{RuleMatch, RuleTable};
use crate::{ensure_incident, Reasoner};
use async_trait::async_trait;
use netheal_core::{Decision, DecisionSource, EngineConfig, RemediationAction, Result, TelemetryRecord};
use tracing::{debug, info};

/// Deterministic reasoner driven by a rule table
#[derive(Debug, Clone)]
pub struct RuleBasedReasoner {
    rules: RuleTable,
    confidence: ConfidenceModel,
    gate: DecisionGate,
}

impl RuleBasedReasoner {
    pub fn new(rules: RuleTable, gate: DecisionGate) -> Self {
        Self {
            rules,
            confidence: ConfidenceModel::default(),
            gate,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(RuleTable::default(), DecisionGate::from_config(config))
    }

    pub fn with_confidence_model(mut self, model: ConfidenceModel) -> Self {
        self.confidence = model;
        self
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// The winning rule for a record, without gating
    pub fn diagnose(&self, record: &TelemetryRecord) -> Option<RuleMatch<'_>> {
        self.rules.select(record)
    }

    /// Synchronous form of `analyze`; the rule path never awaits
    pub fn decide(&self, record: &TelemetryRecord) -> Result<Decision> {
        ensure_incident(record)?;

        let diagnosis = match self.rules.select(record) {
            Some(m) => {
                let confidence = self.confidence.score(&m);
                debug!(rule = %m.rule.id, confidence, "rule matched");
                Diagnosis::new(m.rule.root_cause.clone(), m.rule.action, confidence)
                    .with_reasoning(m.explain())
            }
            None => Diagnosis::new("unknown", RemediationAction::None, 0.0)
                .with_reasoning("No remediation rule matched the record"),
        };

        let decision = self
            .gate
            .finalize(diagnosis.from_source(DecisionSource::RuleBased));

        info!(
            resource = record.resource_id().unwrap_or("?"),
            action = %decision.recommended_action,
            confidence = decision.confidence,
            auto = decision.can_auto_execute,
            "decision produced"
        );
        Ok(decision)
    }
}

impl Default for RuleBasedReasoner {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[async_trait]
impl Reasoner for RuleBasedReasoner {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn analyze(&self, record: &TelemetryRecord) -> Result<Decision> {
        self.decide(record)
    }
}
