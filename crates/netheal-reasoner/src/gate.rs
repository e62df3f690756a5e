//! Decision gate
//!
//! Turns a raw diagnosis into a `Decision`. Every reasoner variant goes
//! through the same gate, so the auto-execute invariant
//! (`can_auto_execute ⇒ confidence ≥ threshold`) holds for all decisions.

use crate::confidence::round_confidence;
use netheal_core::{
    ActionParameters, Decision, DecisionSource, EngineConfig, ExpectedImpact, RemediationAction,
};
use tracing::debug;

/// Raw output of a reasoner before gating
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub root_cause: String,
    pub action: RemediationAction,
    pub confidence: f64,
    pub reasoning: String,
    pub source: DecisionSource,
}

impl Diagnosis {
    pub fn new(root_cause: impl Into<String>, action: RemediationAction, confidence: f64) -> Self {
        Self {
            root_cause: root_cause.into(),
            action,
            confidence,
            reasoning: String::new(),
            source: DecisionSource::RuleBased,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn from_source(mut self, source: DecisionSource) -> Self {
        self.source = source;
        self
    }
}

/// Applies confidence thresholds and stamps the rollback window
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionGate {
    pub auto_execute_threshold: f64,
    pub min_confidence_for_recommendation: f64,
    pub rollback_window_min: u32,
}

impl DecisionGate {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            auto_execute_threshold: config.auto_execute_threshold,
            min_confidence_for_recommendation: config.min_confidence_for_recommendation,
            rollback_window_min: config.default_rollback_window_min,
        }
    }

    pub fn finalize(&self, diagnosis: Diagnosis) -> Decision {
        let confidence = round_confidence(diagnosis.confidence);

        if diagnosis.action.is_none() {
            return Decision {
                root_cause: diagnosis.root_cause,
                recommended_action: RemediationAction::None,
                expected_impact: ExpectedImpact::default(),
                confidence,
                can_auto_execute: false,
                rollback_window_min: self.rollback_window_min,
                parameters: ActionParameters::Empty,
                reasoning: diagnosis.reasoning,
                source: diagnosis.source,
            };
        }

        if confidence < self.min_confidence_for_recommendation {
            debug!(
                root_cause = %diagnosis.root_cause,
                confidence,
                min = self.min_confidence_for_recommendation,
                "diagnosis too weak to recommend an action"
            );
            let reasoning = format!(
                "{} (confidence {:.2} below recommendation minimum {:.2}; withholding {})",
                diagnosis.reasoning, confidence, self.min_confidence_for_recommendation, diagnosis.action
            );
            return Decision {
                root_cause: diagnosis.root_cause,
                recommended_action: RemediationAction::None,
                expected_impact: ExpectedImpact::default(),
                confidence,
                can_auto_execute: false,
                rollback_window_min: self.rollback_window_min,
                parameters: ActionParameters::Empty,
                reasoning,
                source: diagnosis.source,
            };
        }

        let parameters = ActionParameters::for_action(diagnosis.action);
        let expected_impact = parameters.expected_impact();
        let can_auto_execute = confidence >= self.auto_execute_threshold;

        Decision {
            root_cause: diagnosis.root_cause,
            recommended_action: diagnosis.action,
            expected_impact,
            confidence,
            can_auto_execute,
            rollback_window_min: self.rollback_window_min,
            parameters,
            reasoning: diagnosis.reasoning,
            source: diagnosis.source,
        }
    }
}

impl Default for DecisionGate {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_execute_at_threshold() {
        let gate = DecisionGate::default();
        let d = gate.finalize(Diagnosis::new("congestion", RemediationAction::LoadBalancing, 0.85));
        assert!(d.can_auto_execute);
        assert_eq!(d.rollback_window_min, 5);
        assert_eq!(d.parameters, ActionParameters::for_action(RemediationAction::LoadBalancing));

        let d = gate.finalize(Diagnosis::new("congestion", RemediationAction::LoadBalancing, 0.84));
        assert!(!d.can_auto_execute);
        assert_eq!(d.recommended_action, RemediationAction::LoadBalancing);
    }

    #[test]
    fn test_below_recommendation_minimum() {
        let gate = DecisionGate::default();
        let d = gate.finalize(Diagnosis::new("path degradation", RemediationAction::TrafficSteering, 0.4));
        assert_eq!(d.recommended_action, RemediationAction::None);
        assert_eq!(d.root_cause, "path degradation");
        assert_eq!(d.confidence, 0.4);
        assert!(!d.can_auto_execute);
    }

    #[test]
    fn test_none_never_auto_executes() {
        let gate = DecisionGate::default();
        let d = gate.finalize(Diagnosis::new("unknown", RemediationAction::None, 1.0));
        assert!(!d.can_auto_execute);
    }

    #[test]
    fn test_invariant_over_confidence_grid() {
        let gate = DecisionGate::from_config(&EngineConfig::relaxed());
        let actions = [
            RemediationAction::TrafficSteering,
            RemediationAction::LoadBalancing,
            RemediationAction::HealthAssessment,
            RemediationAction::None,
        ];
        for action in actions {
            for i in 0..=100 {
                let d = gate.finalize(Diagnosis::new("x", action, f64::from(i) / 100.0));
                if d.can_auto_execute {
                    assert!(d.confidence >= gate.auto_execute_threshold);
                    assert!(!d.recommended_action.is_none());
                }
            }
        }
    }
}
