//! Action drivers
//!
//! A driver turns an operation into an effect on the network. The simulated
//! driver models the effect as the decision's expected impact applied to
//! the before-snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netheal_core::{Operation, Result, TelemetryRecord};

#[async_trait]
pub trait ActionDriver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Perform the operation and return the resulting snapshot
    async fn apply(
        &self,
        operation: &Operation,
        before: &TelemetryRecord,
        now: DateTime<Utc>,
    ) -> Result<TelemetryRecord>;

    /// Undo a previously applied operation
    async fn revert(&self, _operation: &Operation) -> Result<()> {
        Ok(())
    }
}

/// Deterministic effect model used in labs and dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedDriver;

/// The modeled after-snapshot for an operation
pub fn modeled_effect(operation: &Operation, before: &TelemetryRecord, now: DateTime<Utc>) -> TelemetryRecord {
    let mut after = operation.expected_impact.apply_to(before, operation.action);
    if operation.action.mutates_network() {
        after.timestamp = now;
    }
    after
}

#[async_trait]
impl ActionDriver for SimulatedDriver {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn apply(
        &self,
        operation: &Operation,
        before: &TelemetryRecord,
        now: DateTime<Utc>,
    ) -> Result<TelemetryRecord> {
        Ok(modeled_effect(operation, before, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use netheal_core::{ActionParameters, Decision, DecisionSource, RecordStatus, RemediationAction};

    fn operation(action: RemediationAction) -> Operation {
        let parameters = ActionParameters::for_action(action);
        let decision = Decision {
            root_cause: "test".to_string(),
            recommended_action: action,
            expected_impact: parameters.expected_impact(),
            confidence: 0.9,
            can_auto_execute: true,
            rollback_window_min: 5,
            parameters,
            reasoning: String::new(),
            source: DecisionSource::RuleBased,
        };
        Operation::attempt(&decision, "cell-A01", Utc::now())
    }

    #[tokio::test]
    async fn test_load_balancing_effect() {
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 8, 6, 0).unwrap();
        let before = TelemetryRecord::ran("cell-A01")
            .with_latency(310.0)
            .with_packet_loss(5.8)
            .with_utilization(91.0)
            .with_energy(3.9)
            .incident();

        let after = SimulatedDriver
            .apply(&operation(RemediationAction::LoadBalancing), &before, now)
            .await
            .unwrap();

        assert_eq!(after.latency_ms, 248.0);
        assert_eq!(after.utilization_pct, 68.25);
        assert_eq!(after.status, RecordStatus::Optimized);
        assert_eq!(after.timestamp, now);
    }

    #[tokio::test]
    async fn test_health_assessment_is_read_only() {
        let before = TelemetryRecord::ran("cell-A01").with_energy(6.2).incident();
        let after = SimulatedDriver
            .apply(&operation(RemediationAction::HealthAssessment), &before, Utc::now())
            .await
            .unwrap();
        assert_eq!(after, before);
    }
}
