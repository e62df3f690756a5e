//! NetHeal Reasoner: turns incident telemetry into remediation decisions
//!
//! # Architecture
//!
//! ```text
//! TelemetryRecord → RuleTable → ConfidenceModel ─┐
//!                                                ├→ DecisionGate → Decision
//!                 → ModelClient (optional) ──────┘
//! ```
//!
//! Both reasoner variants share the same `DecisionGate`, so thresholds and
//! the rollback window come from one `EngineConfig`.
//!
//! # Example
//!
//! ```
//! use netheal_core::{RemediationAction, TelemetryRecord};
//! use netheal_reasoner::RuleBasedReasoner;
//!
//! let reasoner = RuleBasedReasoner::default();
//! let record = TelemetryRecord::ran("cell-A01")
//!     .with_latency(310.0)
//!     .with_packet_loss(5.8)
//!     .with_utilization(91.0)
//!     .incident();
//!
//! let decision = reasoner.decide(&record).unwrap();
//! assert_eq!(decision.recommended_action, RemediationAction::LoadBalancing);
//! assert!(decision.can_auto_execute);
//! ```

pub mod confidence;
pub mod gate;
pub mod http_client;
pub mod model;
pub mod rule;
pub mod rule_based;

pub use confidence::{round_confidence, ConfidenceModel};
pub use gate::{DecisionGate, Diagnosis};
pub use http_client::OpenAiCompatibleClient;
pub use model::{build_prompt, parse_reply, ModelBackedReasoner, ModelClient, ModelError, ModelReply};
pub use rule::{default_rules, FiredTrigger, Metric, RemediationRule, RuleMatch, RuleTable, Trigger};
pub use rule_based::RuleBasedReasoner;

use async_trait::async_trait;
use netheal_core::{Decision, EngineConfig, EngineError, ReasonerKind, Result, TelemetryRecord};
use std::sync::Arc;
use tracing::info;

/// Anything that can diagnose an incident record
#[async_trait]
pub trait Reasoner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, record: &TelemetryRecord) -> Result<Decision>;
}

/// Only well-formed incident records are analyzed
pub(crate) fn ensure_incident(record: &TelemetryRecord) -> Result<()> {
    record.validate()?;
    if !record.is_incident() {
        return Err(EngineError::invalid(format!(
            "record for {} has status {:?}, only incidents are analyzed",
            record.resource_id()?,
            record.status
        )));
    }
    Ok(())
}

/// Build the reasoner selected by `config.reasoner`.
///
/// For `model_backed`, `client` overrides the HTTP client built from
/// `config.model`.
pub fn build_reasoner(
    config: &EngineConfig,
    client: Option<Arc<dyn ModelClient>>,
) -> Result<Arc<dyn Reasoner>> {
    match config.reasoner {
        ReasonerKind::RuleBased => {
            info!("using rule-based reasoner");
            Ok(Arc::new(RuleBasedReasoner::from_config(config)))
        }
        ReasonerKind::ModelBacked => {
            let client = match client {
                Some(client) => client,
                None => {
                    let model = config.model.as_ref().ok_or_else(|| {
                        EngineError::Config("model_backed reasoner needs a model section".to_string())
                    })?;
                    let http = OpenAiCompatibleClient::from_config(model)
                        .map_err(|e| EngineError::Config(e.to_string()))?;
                    Arc::new(http) as Arc<dyn ModelClient>
                }
            };
            info!("using model-backed reasoner");
            Ok(Arc::new(ModelBackedReasoner::new(client, config)))
        }
    }
}
