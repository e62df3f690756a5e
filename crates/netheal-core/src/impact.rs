//! Action parameters and their modeled impact
//!
//! Each remediation carries a small set of parameters. The expected impact
//! is a fixed linear function of those parameters, and the simulated driver
//! applies exactly that impact to the before-snapshot.

use crate::data_model::{RecordStatus, RemediationAction, TelemetryRecord};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Percentage reduction, rendered on the wire as `"28.0%"`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct ImpactPct(pub f64);

impl ImpactPct {
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Multiplier applied to a metric (`28%` → `0.72`)
    pub fn factor(&self) -> f64 {
        (1.0 - self.0 / 100.0).clamp(0.0, 1.0)
    }
}

impl fmt::Display for ImpactPct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Serialize for ImpactPct {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ImpactPct {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PctVisitor;

        impl<'de> Visitor<'de> for PctVisitor {
            type Value = ImpactPct;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a percentage string like \"28%\" or a number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ImpactPct, E> {
                v.trim()
                    .trim_end_matches('%')
                    .trim()
                    .parse::<f64>()
                    .map(ImpactPct)
                    .map_err(|_| E::custom(format!("invalid percentage: {}", v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<ImpactPct, E> {
                Ok(ImpactPct(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ImpactPct, E> {
                Ok(ImpactPct(v as f64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ImpactPct, E> {
                Ok(ImpactPct(v as f64))
            }
        }

        deserializer.deserialize_any(PctVisitor)
    }
}

/// Estimated KPI improvement of a remediation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExpectedImpact {
    pub latency_ms_reduction: ImpactPct,
    pub packet_loss_reduction: ImpactPct,
    pub energy_kwh_reduction: ImpactPct,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_reduction: Option<ImpactPct>,
}

/// Parameters handed to the action driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionParameters {
    TrafficSteering {
        steering_percentage: u32,
        backup_path_priority: String,
    },
    LoadBalancing {
        load_reduction_pct: u32,
        target_utilization: u32,
    },
    #[default]
    Empty,
}

impl ActionParameters {
    /// Standard parameters for an action
    pub fn for_action(action: RemediationAction) -> Self {
        match action {
            RemediationAction::TrafficSteering => ActionParameters::TrafficSteering {
                steering_percentage: 40,
                backup_path_priority: "high".to_string(),
            },
            RemediationAction::LoadBalancing => ActionParameters::LoadBalancing {
                load_reduction_pct: 25,
                target_utilization: 70,
            },
            RemediationAction::HealthAssessment | RemediationAction::None => ActionParameters::Empty,
        }
    }

    /// Whether these parameters belong to the given action
    pub fn matches(&self, action: RemediationAction) -> bool {
        matches!(
            (self, action),
            (ActionParameters::TrafficSteering { .. }, RemediationAction::TrafficSteering)
                | (ActionParameters::LoadBalancing { .. }, RemediationAction::LoadBalancing)
                | (ActionParameters::Empty, RemediationAction::HealthAssessment)
                | (ActionParameters::Empty, RemediationAction::None)
        )
    }

    pub fn expected_impact(&self) -> ExpectedImpact {
        match self {
            ActionParameters::TrafficSteering { steering_percentage, .. } => {
                let steer = f64::from(*steering_percentage);
                ExpectedImpact {
                    latency_ms_reduction: ImpactPct(round1(steer * 0.7)),
                    packet_loss_reduction: ImpactPct(round1(steer * 0.8)),
                    energy_kwh_reduction: ImpactPct(0.0),
                    utilization_reduction: None,
                }
            }
            ActionParameters::LoadBalancing { load_reduction_pct, .. } => {
                let load = f64::from(*load_reduction_pct);
                ExpectedImpact {
                    latency_ms_reduction: ImpactPct(round1(load * 0.8)),
                    packet_loss_reduction: ImpactPct(round1(load * 0.6)),
                    energy_kwh_reduction: ImpactPct(round1(load * 0.6)),
                    utilization_reduction: Some(ImpactPct(load)),
                }
            }
            ActionParameters::Empty => ExpectedImpact::default(),
        }
    }
}

impl ExpectedImpact {
    /// Every reduction must be a finite percentage within 0-100
    pub fn validate(&self) -> crate::error::Result<()> {
        let fields = [
            ("latency_ms_reduction", Some(self.latency_ms_reduction)),
            ("packet_loss_reduction", Some(self.packet_loss_reduction)),
            ("energy_kwh_reduction", Some(self.energy_kwh_reduction)),
            ("utilization_reduction", self.utilization_reduction),
        ];
        for (name, pct) in fields {
            if let Some(ImpactPct(v)) = pct {
                if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                    return Err(crate::error::EngineError::invalid(format!(
                        "{} must be within 0-100%, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply this impact to a snapshot, producing the post-action state.
    ///
    /// Read-only actions return the snapshot unchanged.
    pub fn apply_to(&self, before: &TelemetryRecord, action: RemediationAction) -> TelemetryRecord {
        let mut after = before.clone();
        if !action.mutates_network() {
            return after;
        }

        after.latency_ms = round2(before.latency_ms * self.latency_ms_reduction.factor());
        after.packet_loss = round2(before.packet_loss * self.packet_loss_reduction.factor());
        after.energy_kwh = round2(before.energy_kwh * self.energy_kwh_reduction.factor());
        if let Some(util) = self.utilization_reduction {
            after.utilization_pct = round2(before.utilization_pct * util.factor());
        }
        after.status = RecordStatus::Optimized;
        after
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traffic_steering_impact() {
        let impact = ActionParameters::for_action(RemediationAction::TrafficSteering).expected_impact();
        assert_eq!(impact.latency_ms_reduction, ImpactPct(28.0));
        assert_eq!(impact.packet_loss_reduction, ImpactPct(32.0));
        assert_eq!(impact.energy_kwh_reduction, ImpactPct(0.0));
    }

    #[test]
    fn test_load_balancing_impact() {
        let impact = ActionParameters::for_action(RemediationAction::LoadBalancing).expected_impact();
        assert_eq!(impact.energy_kwh_reduction, ImpactPct(15.0));
        assert_eq!(impact.utilization_reduction, Some(ImpactPct(25.0)));
    }

    #[test]
    fn test_impact_wire_format() {
        let impact = ActionParameters::for_action(RemediationAction::TrafficSteering).expected_impact();
        let json = serde_json::to_value(&impact).unwrap();
        assert_eq!(json["latency_ms_reduction"], "28.0%");
        assert!(json.get("utilization_reduction").is_none());

        let parsed: ExpectedImpact = serde_json::from_str(
            r#"{"latency_ms_reduction": "28%", "packet_loss_reduction": 32, "energy_kwh_reduction": "0%"}"#,
        )
        .unwrap();
        assert_eq!(parsed.latency_ms_reduction, ImpactPct(28.0));
        assert_eq!(parsed.packet_loss_reduction, ImpactPct(32.0));
    }

    #[test]
    fn test_apply_load_balancing() {
        let before = TelemetryRecord::ran("cell-A01")
            .with_latency(310.0)
            .with_packet_loss(5.8)
            .with_utilization(91.0)
            .with_energy(3.9)
            .incident();
        let params = ActionParameters::for_action(RemediationAction::LoadBalancing);
        let after = params
            .expected_impact()
            .apply_to(&before, RemediationAction::LoadBalancing);

        assert_eq!(after.utilization_pct, 68.25);
        assert!(after.latency_ms < before.latency_ms);
        assert!(after.energy_kwh < before.energy_kwh);
        assert_eq!(after.status, RecordStatus::Optimized);
        assert_eq!(after.cell_id, before.cell_id);
    }

    #[test]
    fn test_impact_bounds() {
        let parsed: ExpectedImpact = serde_json::from_str(
            r#"{"latency_ms_reduction": "NaN%", "packet_loss_reduction": "10%", "energy_kwh_reduction": "0%"}"#,
        )
        .unwrap();
        assert!(parsed.validate().is_err());

        let mut impact = ActionParameters::for_action(RemediationAction::LoadBalancing).expected_impact();
        assert!(impact.validate().is_ok());
        impact.utilization_reduction = Some(ImpactPct(140.0));
        assert!(impact.validate().is_err());
        impact.utilization_reduction = Some(ImpactPct(-5.0));
        assert!(impact.validate().is_err());
    }

    #[test]
    fn test_health_assessment_is_read_only() {
        let before = TelemetryRecord::ran("cell-C03").with_energy(6.0).incident();
        let after = ExpectedImpact::default().apply_to(&before, RemediationAction::HealthAssessment);
        assert_eq!(after, before);
    }

    #[test]
    fn test_parameters_match_action() {
        let params = ActionParameters::for_action(RemediationAction::LoadBalancing);
        assert!(params.matches(RemediationAction::LoadBalancing));
        assert!(!params.matches(RemediationAction::TrafficSteering));
    }
}
