//! Remediation rules
//!
//! A rule names a root cause and the action that remedies it, and fires when
//! any of its metric triggers crosses its threshold. Rules are ranked by
//! priority. Among matching rules of equal priority the one whose leading
//! trigger deviates most from its normal baseline wins.

use netheal_core::{Domain, EngineError, RemediationAction, Result, TelemetryRecord};
use serde::{Deserialize, Serialize};

/// A telemetry metric a trigger can watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    LatencyMs,
    PacketLoss,
    UtilizationPct,
    ThroughputMbps,
    EnergyKwh,
}

impl Metric {
    pub fn read(&self, record: &TelemetryRecord) -> f64 {
        match self {
            Metric::LatencyMs => record.latency_ms,
            Metric::PacketLoss => record.packet_loss,
            Metric::UtilizationPct => record.utilization_pct,
            Metric::ThroughputMbps => record.throughput_mbps,
            Metric::EnergyKwh => record.energy_kwh,
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Metric::LatencyMs => "latency_ms",
            Metric::PacketLoss => "packet_loss",
            Metric::UtilizationPct => "utilization_pct",
            Metric::ThroughputMbps => "throughput_mbps",
            Metric::EnergyKwh => "energy_kwh",
        }
    }
}

/// Fires when `metric > threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub metric: Metric,
    pub threshold: f64,
    /// Typical value on a healthy resource
    pub baseline: f64,
    /// Value at which the violation counts as fully certain
    pub saturation: f64,
}

impl Trigger {
    pub fn new(metric: Metric, threshold: f64, baseline: f64, saturation: f64) -> Self {
        Self { metric, threshold, baseline, saturation }
    }

    pub fn fires(&self, value: f64) -> bool {
        value > self.threshold
    }

    /// `(value - baseline) / baseline`; absolute distance when baseline is zero
    pub fn relative_deviation(&self, value: f64) -> f64 {
        if self.baseline > 0.0 {
            (value - self.baseline) / self.baseline
        } else {
            value - self.baseline
        }
    }

    /// How far past the threshold the value sits, 0.0 at the threshold and
    /// 1.0 at (or beyond) saturation
    pub fn excess_ratio(&self, value: f64) -> f64 {
        if !self.fires(value) {
            return 0.0;
        }
        let span = self.saturation - self.threshold;
        if span <= 0.0 {
            return 1.0;
        }
        ((value - self.threshold) / span).clamp(0.0, 1.0)
    }
}

/// A trigger that fired on a specific record
#[derive(Debug, Clone, PartialEq)]
pub struct FiredTrigger {
    pub metric: Metric,
    pub value: f64,
    pub threshold: f64,
    pub relative_deviation: f64,
    pub excess_ratio: f64,
}

/// A remediation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationRule {
    /// Unique identifier for the rule
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Diagnosis reported when the rule wins
    pub root_cause: String,

    /// Remediation proposed when the rule wins
    pub action: RemediationAction,

    /// Higher wins outright
    #[serde(default)]
    pub priority: u32,

    /// Domains the rule applies to; empty means all
    #[serde(default)]
    pub domains: Vec<Domain>,

    /// Any firing trigger matches the rule
    pub triggers: Vec<Trigger>,

    /// Confidence at the bare threshold
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_base_confidence() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

impl RemediationRule {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            root_cause: String::new(),
            action: RemediationAction::None,
            priority: 0,
            domains: Vec::new(),
            triggers: Vec::new(),
            base_confidence: default_base_confidence(),
            enabled: true,
        }
    }

    pub fn with_root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = root_cause.into();
        self
    }

    pub fn with_action(mut self, action: RemediationAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_domains(mut self, domains: &[Domain]) -> Self {
        self.domains = domains.to_vec();
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn with_base_confidence(mut self, base: f64) -> Self {
        self.base_confidence = base;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn applies_to(&self, domain: Domain) -> bool {
        self.domains.is_empty() || self.domains.contains(&domain)
    }

    /// Evaluate the rule against a record
    pub fn evaluate(&self, record: &TelemetryRecord) -> Option<RuleMatch<'_>> {
        if !self.enabled || !self.applies_to(record.domain) {
            return None;
        }

        let fired: Vec<FiredTrigger> = self
            .triggers
            .iter()
            .filter_map(|t| {
                let value = t.metric.read(record);
                t.fires(value).then(|| FiredTrigger {
                    metric: t.metric,
                    value,
                    threshold: t.threshold,
                    relative_deviation: t.relative_deviation(value),
                    excess_ratio: t.excess_ratio(value),
                })
            })
            .collect();

        if fired.is_empty() {
            None
        } else {
            Some(RuleMatch { rule: self, fired })
        }
    }

    fn check(&self) -> Result<()> {
        if self.triggers.is_empty() {
            return Err(EngineError::Config(format!("rule {} has no triggers", self.id)));
        }
        if !(0.0..=1.0).contains(&self.base_confidence) {
            return Err(EngineError::Config(format!(
                "rule {} base_confidence must be within 0.0-1.0",
                self.id
            )));
        }
        if self.action.is_none() {
            return Err(EngineError::Config(format!("rule {} must name an action", self.id)));
        }
        Ok(())
    }
}

/// A rule together with the triggers it fired on
#[derive(Debug, Clone)]
pub struct RuleMatch<'a> {
    pub rule: &'a RemediationRule,
    pub fired: Vec<FiredTrigger>,
}

impl RuleMatch<'_> {
    /// The fired trigger with the largest relative deviation from baseline
    pub fn lead_trigger(&self) -> &FiredTrigger {
        self.fired
            .iter()
            .max_by(|a, b| a.relative_deviation.total_cmp(&b.relative_deviation))
            .unwrap_or(&self.fired[0])
    }

    pub fn max_excess(&self) -> f64 {
        self.fired.iter().map(|f| f.excess_ratio).fold(0.0, f64::max)
    }

    /// One-line explanation of why the rule fired
    pub fn explain(&self) -> String {
        let parts: Vec<String> = self
            .fired
            .iter()
            .map(|f| format!("{} {:.1} > {:.1}", f.metric.field_name(), f.value, f.threshold))
            .collect();
        format!("{}: {}", self.rule.name, parts.join(", "))
    }
}

/// Ordered set of remediation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub rules: Vec<RemediationRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<RemediationRule>) -> Result<Self> {
        for rule in &rules {
            rule.check()?;
        }
        Ok(Self { rules })
    }

    /// Load a rule table from YAML (`rules: [...]`)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: RuleTable =
            serde_yaml::from_str(yaml).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::new(table.rules)
    }

    /// Pick the winning rule for a record.
    ///
    /// Highest priority wins. Equal priorities fall to the larger lead
    /// deviation, then to table order.
    pub fn select(&self, record: &TelemetryRecord) -> Option<RuleMatch<'_>> {
        let mut best: Option<RuleMatch<'_>> = None;

        for candidate in self.rules.iter().filter_map(|r| r.evaluate(record)) {
            let better = match &best {
                None => true,
                Some(current) => {
                    let by_priority = candidate.rule.priority.cmp(&current.rule.priority);
                    by_priority.is_gt()
                        || (by_priority.is_eq()
                            && candidate.lead_trigger().relative_deviation
                                > current.lead_trigger().relative_deviation)
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        best
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self { rules: default_rules() }
    }
}

/// Predefined remediation rules
pub fn default_rules() -> Vec<RemediationRule> {
    vec![
        RemediationRule::new("congestion", "Cell/Link Congestion")
            .with_root_cause("congestion")
            .with_action(RemediationAction::LoadBalancing)
            .with_priority(100)
            .with_base_confidence(0.75)
            .with_trigger(Trigger::new(Metric::UtilizationPct, 85.0, 45.0, 95.0)),

        RemediationRule::new("path_degradation", "Path Degradation")
            .with_root_cause("path degradation")
            .with_action(RemediationAction::TrafficSteering)
            .with_priority(50)
            .for_domains(&[Domain::Ran, Domain::Transport, Domain::Core])
            .with_trigger(Trigger::new(Metric::LatencyMs, 200.0, 50.0, 400.0))
            .with_trigger(Trigger::new(Metric::PacketLoss, 3.0, 0.1, 10.0)),

        // Satellite links run at a much higher latency floor
        RemediationRule::new("ntn_link_degradation", "Satellite Link Degradation")
            .with_root_cause("satellite link degradation")
            .with_action(RemediationAction::TrafficSteering)
            .with_priority(50)
            .for_domains(&[Domain::Ntn])
            .with_trigger(Trigger::new(Metric::LatencyMs, 650.0, 550.0, 900.0))
            .with_trigger(Trigger::new(Metric::PacketLoss, 3.0, 0.1, 10.0)),

        RemediationRule::new("energy_anomaly", "Abnormal Energy Draw")
            .with_root_cause("abnormal energy draw")
            .with_action(RemediationAction::HealthAssessment)
            .with_priority(10)
            .with_base_confidence(0.6)
            .with_trigger(Trigger::new(Metric::EnergyKwh, 5.0, 2.5, 8.0)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_excess_ratio() {
        let trigger = Trigger::new(Metric::UtilizationPct, 85.0, 45.0, 95.0);
        assert_eq!(trigger.excess_ratio(80.0), 0.0);
        assert_eq!(trigger.excess_ratio(85.0), 0.0);
        assert!((trigger.excess_ratio(90.0) - 0.5).abs() < 1e-9);
        assert_eq!(trigger.excess_ratio(120.0), 1.0);
    }

    #[test]
    fn test_rule_domain_filter() {
        let table = RuleTable::default();
        let ntn = TelemetryRecord::for_domain(Domain::Ntn, "sat-beam-07")
            .with_latency(300.0)
            .incident();
        // 300ms is normal for a satellite hop
        assert!(table.select(&ntn).is_none());

        let ran = TelemetryRecord::ran("cell-A02").with_latency(300.0).incident();
        assert_eq!(table.select(&ran).unwrap().rule.id, "path_degradation");
    }

    #[test]
    fn test_priority_beats_deviation() {
        let table = RuleTable::default();
        let record = TelemetryRecord::ran("cell-A01")
            .with_latency(310.0)
            .with_packet_loss(5.8)
            .with_utilization(91.0)
            .incident();

        let m = table.select(&record).unwrap();
        assert_eq!(m.rule.id, "congestion");
    }

    #[test]
    fn test_equal_priority_tie_break_by_deviation() {
        let rules = vec![
            RemediationRule::new("latency", "Latency")
                .with_root_cause("latency")
                .with_action(RemediationAction::TrafficSteering)
                .with_trigger(Trigger::new(Metric::LatencyMs, 200.0, 50.0, 400.0)),
            RemediationRule::new("energy", "Energy")
                .with_root_cause("energy")
                .with_action(RemediationAction::HealthAssessment)
                .with_trigger(Trigger::new(Metric::EnergyKwh, 5.0, 2.5, 8.0)),
        ];
        let table = RuleTable::new(rules).unwrap();

        // latency deviation (250-50)/50 = 4.0, energy (6-2.5)/2.5 = 1.4
        let record = TelemetryRecord::ran("c1").with_latency(250.0).with_energy(6.0).incident();
        assert_eq!(table.select(&record).unwrap().rule.id, "latency");

        // energy deviation (20-2.5)/2.5 = 7.0 now dominates
        let record = record.with_energy(20.0);
        assert_eq!(table.select(&record).unwrap().rule.id, "energy");
    }

    #[test]
    fn test_lead_trigger() {
        let table = RuleTable::default();
        let record = TelemetryRecord::transport("transport-link-B17")
            .with_latency(270.0)
            .with_packet_loss(4.9)
            .incident();
        let m = table.select(&record).unwrap();
        assert_eq!(m.fired.len(), 2);
        assert_eq!(m.lead_trigger().metric, Metric::PacketLoss);
        assert!(m.explain().contains("latency_ms 270.0 > 200.0"));
    }

    #[test]
    fn test_disabled_rule() {
        let rule = RemediationRule::new("c", "C")
            .with_action(RemediationAction::LoadBalancing)
            .with_trigger(Trigger::new(Metric::UtilizationPct, 85.0, 45.0, 95.0))
            .disabled();
        let record = TelemetryRecord::ran("c1").with_utilization(99.0).incident();
        assert!(rule.evaluate(&record).is_none());
    }

    #[test]
    fn test_rule_table_yaml() {
        let yaml = r#"
rules:
  - id: hot_cell
    name: Hot Cell
    root_cause: congestion
    action: load_balancing
    priority: 5
    triggers:
      - metric: utilization_pct
        threshold: 80
        baseline: 40
        saturation: 95
"#;
        let table = RuleTable::from_yaml(yaml).unwrap();
        assert_eq!(table.rules.len(), 1);
        assert!(table.rules[0].enabled);
        assert_eq!(table.rules[0].base_confidence, 0.7);

        let bad = yaml.replace("action: load_balancing", "action: none");
        assert!(RuleTable::from_yaml(&bad).is_err());
    }
}
