//! Data Model: TelemetryRecord, Decision, Operation
use crate::error::{EngineError, Result};
use crate::impact::{ActionParameters, ExpectedImpact};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network domain a telemetry record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "RAN")]
    Ran,
    Transport,
    Core,
    #[serde(rename = "NTN")]
    Ntn,
}

impl Domain {
    /// Transport resources are links, every other domain addresses cells/nodes
    pub fn uses_link_id(&self) -> bool {
        matches!(self, Domain::Transport)
    }

    pub const ALL: [Domain; 4] = [Domain::Ran, Domain::Transport, Domain::Core, Domain::Ntn];
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Domain::Ran => write!(f, "RAN"),
            Domain::Transport => write!(f, "Transport"),
            Domain::Core => write!(f, "Core"),
            Domain::Ntn => write!(f, "NTN"),
        }
    }
}

/// Lifecycle state reported by the telemetry source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Normal,
    Incident,
    Optimized,
}

/// One telemetry sample. Field names are fixed by the ingestion contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub domain: Domain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    pub latency_ms: f64,
    /// Percent, 0-100
    pub packet_loss: f64,
    /// Percent, 0-100
    pub utilization_pct: f64,
    pub throughput_mbps: f64,
    pub energy_kwh: f64,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl TelemetryRecord {
    /// Create a normal RAN record for a cell with zeroed metrics
    pub fn ran(cell_id: impl Into<String>) -> Self {
        Self::blank(Domain::Ran, Some(cell_id.into()), None)
    }

    /// Create a normal Transport record for a link with zeroed metrics
    pub fn transport(link_id: impl Into<String>) -> Self {
        Self::blank(Domain::Transport, None, Some(link_id.into()))
    }

    /// Create a normal record for any domain, placing the id in the right field
    pub fn for_domain(domain: Domain, resource_id: impl Into<String>) -> Self {
        let id = resource_id.into();
        if domain.uses_link_id() {
            Self::blank(domain, None, Some(id))
        } else {
            Self::blank(domain, Some(id), None)
        }
    }

    fn blank(domain: Domain, cell_id: Option<String>, link_id: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            domain,
            cell_id,
            link_id,
            latency_ms: 0.0,
            packet_loss: 0.0,
            utilization_pct: 0.0,
            throughput_mbps: 0.0,
            energy_kwh: 0.0,
            status: RecordStatus::Normal,
            region: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_latency(mut self, ms: f64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn with_packet_loss(mut self, pct: f64) -> Self {
        self.packet_loss = pct;
        self
    }

    pub fn with_utilization(mut self, pct: f64) -> Self {
        self.utilization_pct = pct;
        self
    }

    pub fn with_throughput(mut self, mbps: f64) -> Self {
        self.throughput_mbps = mbps;
        self
    }

    pub fn with_energy(mut self, kwh: f64) -> Self {
        self.energy_kwh = kwh;
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn incident(self) -> Self {
        self.with_status(RecordStatus::Incident)
    }

    pub fn is_incident(&self) -> bool {
        self.status == RecordStatus::Incident
    }

    /// The resource id (cell or link), whichever the domain requires
    pub fn resource_id(&self) -> Result<&str> {
        self.validate_identity()?;
        let id = if self.domain.uses_link_id() {
            self.link_id.as_deref()
        } else {
            self.cell_id.as_deref()
        };
        id.ok_or_else(|| EngineError::invalid("record carries no resource id"))
    }

    /// Check the domain/resource-id invariant and metric ranges
    pub fn validate(&self) -> Result<()> {
        self.validate_identity()?;

        let non_negative = [
            ("latency_ms", self.latency_ms),
            ("throughput_mbps", self.throughput_mbps),
            ("energy_kwh", self.energy_kwh),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::invalid(format!("{} must be >= 0, got {}", name, value)));
            }
        }

        let percentages = [
            ("packet_loss", self.packet_loss),
            ("utilization_pct", self.utilization_pct),
        ];
        for (name, value) in percentages {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(EngineError::invalid(format!("{} must be within 0-100, got {}", name, value)));
            }
        }

        Ok(())
    }

    fn validate_identity(&self) -> Result<()> {
        let (required, forbidden, required_name, forbidden_name) = if self.domain.uses_link_id() {
            (&self.link_id, &self.cell_id, "link_id", "cell_id")
        } else {
            (&self.cell_id, &self.link_id, "cell_id", "link_id")
        };

        if forbidden.is_some() {
            return Err(EngineError::invalid(format!(
                "{} records must not carry {}",
                self.domain, forbidden_name
            )));
        }
        match required {
            Some(id) if !id.trim().is_empty() => Ok(()),
            _ => Err(EngineError::invalid(format!(
                "{} records must carry a non-empty {}",
                self.domain, required_name
            ))),
        }
    }
}

/// Remediation the reasoner can recommend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    TrafficSteering,
    LoadBalancing,
    HealthAssessment,
    #[default]
    None,
}

impl RemediationAction {
    pub fn is_none(&self) -> bool {
        matches!(self, RemediationAction::None)
    }

    /// Whether applying the action changes live network state
    pub fn mutates_network(&self) -> bool {
        matches!(self, RemediationAction::TrafficSteering | RemediationAction::LoadBalancing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationAction::TrafficSteering => "traffic_steering",
            RemediationAction::LoadBalancing => "load_balancing",
            RemediationAction::HealthAssessment => "health_assessment",
            RemediationAction::None => "none",
        }
    }

    /// Parse the wire name, tolerating case and hyphens
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "traffic_steering" => Some(RemediationAction::TrafficSteering),
            "load_balancing" => Some(RemediationAction::LoadBalancing),
            "health_assessment" | "network_health_check" => Some(RemediationAction::HealthAssessment),
            "none" => Some(RemediationAction::None),
            _ => None,
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which reasoner produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    #[default]
    RuleBased,
    ModelBacked,
}

/// Diagnosis and proposed remediation for one incident record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub root_cause: String,
    pub recommended_action: RemediationAction,
    pub expected_impact: ExpectedImpact,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub can_auto_execute: bool,
    pub rollback_window_min: u32,
    #[serde(default)]
    pub parameters: ActionParameters,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub source: DecisionSource,
}

impl Decision {
    /// Decision for a record no rule explains
    pub fn no_action(rollback_window_min: u32) -> Self {
        Self {
            root_cause: "unknown".to_string(),
            recommended_action: RemediationAction::None,
            expected_impact: ExpectedImpact::default(),
            confidence: 0.0,
            can_auto_execute: false,
            rollback_window_min,
            parameters: ActionParameters::Empty,
            reasoning: "No remediation rule matched the record".to_string(),
            source: DecisionSource::RuleBased,
        }
    }

    /// Whether this decision clears the given auto-execute threshold.
    /// Requires both the flag and the confidence to agree.
    pub fn passes_gate(&self, auto_execute_threshold: f64) -> bool {
        self.can_auto_execute
            && !self.recommended_action.is_none()
            && self.confidence >= auto_execute_threshold
    }

    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(EngineError::invalid(format!(
                "confidence must be within 0.0-1.0, got {}",
                self.confidence
            )));
        }
        if self.recommended_action.is_none() && self.can_auto_execute {
            return Err(EngineError::invalid("action none cannot be auto-executed"));
        }
        self.expected_impact.validate()
    }
}

/// Lifecycle of an executed (or simulated) decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Applied,
    RolledBack,
    Failed,
}

impl OperationStatus {
    pub fn can_transition_to(&self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Pending, Applied) | (Pending, Failed) | (Applied, RolledBack) | (Applied, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::RolledBack | OperationStatus::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "pending"),
            OperationStatus::Applied => write!(f, "applied"),
            OperationStatus::RolledBack => write!(f, "rolled_back"),
            OperationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An executed, simulated, pending or failed remediation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub resource_id: String,
    pub action: RemediationAction,
    pub parameters: ActionParameters,
    pub status: OperationStatus,
    /// Dry-run operations never touch live state
    #[serde(default)]
    pub simulated: bool,
    pub confidence: f64,
    pub expected_impact: ExpectedImpact,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<DateTime<Utc>>,
    pub rollback_window_min: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<TelemetryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<TelemetryRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Operation {
    /// Start an attempt for a decision against a resource
    pub fn attempt(decision: &Decision, resource_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_operation_id(),
            resource_id: resource_id.into(),
            action: decision.recommended_action,
            parameters: decision.parameters.clone(),
            status: OperationStatus::Pending,
            simulated: false,
            confidence: decision.confidence,
            expected_impact: decision.expected_impact.clone(),
            created_at: now,
            applied_at: None,
            rollback_window_min: decision.rollback_window_min,
            rollback_deadline: None,
            before: None,
            after: None,
            failure_reason: None,
        }
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    pub fn with_before(mut self, before: TelemetryRecord) -> Self {
        self.before = Some(before);
        self
    }

    /// Attempt that never got to run
    pub fn failed_attempt(mut self, reason: impl Into<String>) -> Self {
        self.status = OperationStatus::Failed;
        self.failure_reason = Some(reason.into());
        self
    }

    /// Pending → Applied, stamping the rollback deadline
    pub fn into_applied(self, after: TelemetryRecord, now: DateTime<Utc>) -> Result<Self> {
        let mut next = self.transition(OperationStatus::Applied)?;
        next.applied_at = Some(now);
        next.rollback_deadline = Some(now + Duration::minutes(i64::from(next.rollback_window_min)));
        next.after = Some(after);
        Ok(next)
    }

    /// Applied → RolledBack
    pub fn into_rolled_back(self) -> Result<Self> {
        self.transition(OperationStatus::RolledBack)
    }

    /// Pending/Applied → Failed
    pub fn into_failed(self, reason: impl Into<String>) -> Result<Self> {
        let mut next = self.transition(OperationStatus::Failed)?;
        next.failure_reason = Some(reason.into());
        Ok(next)
    }

    fn transition(self, next: OperationStatus) -> Result<Self> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::invalid(format!(
                "operation {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        Ok(Self { status: next, ..self })
    }

    /// Whether this operation still holds its resource at `now`.
    ///
    /// Pending operations always do; applied ones until the rollback
    /// deadline passes. Simulated operations never do.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.simulated {
            return false;
        }
        match self.status {
            OperationStatus::Pending => true,
            OperationStatus::Applied => self.rollback_deadline.map(|d| now <= d).unwrap_or(false),
            OperationStatus::RolledBack | OperationStatus::Failed => false,
        }
    }

    pub fn rollback_expired(&self, now: DateTime<Utc>) -> bool {
        self.rollback_deadline.map(|d| now > d).unwrap_or(false)
    }
}

fn generate_operation_id() -> String {
    format!("op-{}", uuid::Uuid::new_v4())
}
