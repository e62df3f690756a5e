//! Confidence scoring for rule matches
//!
//! Confidence starts at the rule's base value when a trigger sits exactly on
//! its threshold and climbs linearly to 1.0 as the strongest trigger reaches
//! saturation. Each additional fired trigger adds a small corroboration
//! bonus. The result is rounded to two decimals so identical input always
//! reports the identical value.

use crate::rule::RuleMatch;

/// Confidence calculator with configurable weights
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceModel {
    /// Added per fired trigger beyond the first
    pub corroboration_bonus: f64,
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self { corroboration_bonus: 0.05 }
    }
}

impl ConfidenceModel {
    pub fn score(&self, m: &RuleMatch<'_>) -> f64 {
        let base = m.rule.base_confidence.clamp(0.0, 1.0);
        let corroboration = m.fired.len().saturating_sub(1) as f64 * self.corroboration_bonus;
        let raw = base + (1.0 - base) * m.max_excess() + corroboration;
        round_confidence(raw)
    }
}

/// Clamp to 0.0-1.0 and round to two decimals
pub fn round_confidence(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.0;
    }
    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleTable;
    use netheal_core::TelemetryRecord;

    fn score(record: &TelemetryRecord) -> f64 {
        let table = RuleTable::default();
        let m = table.select(record).expect("rule should match");
        ConfidenceModel::default().score(&m)
    }

    #[test]
    fn test_threshold_gives_base_confidence() {
        let record = TelemetryRecord::ran("c1").with_utilization(85.5).incident();
        assert_eq!(score(&record), 0.76);
    }

    #[test]
    fn test_saturates_at_one() {
        let record = TelemetryRecord::ran("c1").with_utilization(100.0).incident();
        assert_eq!(score(&record), 1.0);
    }

    #[test]
    fn test_monotonic_in_violation() {
        let mut last = 0.0;
        for util in (86..=100).map(f64::from) {
            let c = score(&TelemetryRecord::ran("c1").with_utilization(util).incident());
            assert!(c >= last, "confidence dropped at utilization {}", util);
            last = c;
        }

        let mut last = 0.0;
        for latency in (201..=500).step_by(7).map(f64::from) {
            let c = score(&TelemetryRecord::transport("l1").with_latency(latency).incident());
            assert!(c >= last, "confidence dropped at latency {}", latency);
            last = c;
        }
    }

    #[test]
    fn test_corroboration_bonus() {
        let single = TelemetryRecord::transport("l1").with_latency(270.0).incident();
        let both = single.clone().with_packet_loss(3.5);
        assert!(score(&both) > score(&single));
    }

    #[test]
    fn test_deterministic() {
        let record = TelemetryRecord::transport("l1")
            .with_latency(270.0)
            .with_packet_loss(4.9)
            .incident();
        assert_eq!(score(&record), score(&record.clone()));
    }

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(1.7), 1.0);
        assert_eq!(round_confidence(-0.2), 0.0);
        assert_eq!(round_confidence(f64::NAN), 0.0);
        assert_eq!(round_confidence(0.8549), 0.85);
    }
}
