//! Model-backed reasoner
//!
//! Asks an external model for a diagnosis and falls back to the rule table
//! whenever the model is unavailable, slow, or answers with something that
//! does not parse into a known action.

use crate::gate::{DecisionGate, Diagnosis};
use crate::rule_based::RuleBasedReasoner;
use crate::{ensure_incident, Reasoner};
use async_trait::async_trait;
use netheal_core::{
    Decision, DecisionSource, EngineConfig, RemediationAction, Result, TelemetryRecord,
    DEFAULT_MODEL_TIMEOUT_MS,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("MODEL/unavailable: {0}")]
    Unavailable(String),

    #[error("MODEL/bad reply: {0}")]
    BadReply(String),
}

/// Capability to send a prompt to a language model and get its text reply
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ModelError>;
}

/// The JSON object the model is asked to return
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelReply {
    pub action: String,
    pub confidence: f64,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Plain incident prompt for the model
pub fn build_prompt(record: &TelemetryRecord) -> String {
    format!(
        "Analyze this network incident and recommend an action.\n\n\
         Domain: {}\n\
         Resource: {}\n\
         Latency: {}ms\n\
         Packet Loss: {}%\n\
         Utilization: {}%\n\
         Throughput: {}Mbps\n\
         Energy: {}kWh\n\n\
         Recommend one of \"traffic_steering\", \"load_balancing\", \"health_assessment\" or \"none\".\n\
         Respond in JSON with: action, root_cause, reasoning, confidence (0-1).",
        record.domain,
        record.resource_id().unwrap_or("unknown"),
        record.latency_ms,
        record.packet_loss,
        record.utilization_pct,
        record.throughput_mbps,
        record.energy_kwh,
    )
}

/// Extract and validate the JSON reply from free-form model text.
///
/// Accepts a fenced ```json block or the span from the first `{` to the
/// last `}`.
pub fn parse_reply(text: &str) -> std::result::Result<ModelReply, ModelError> {
    let json = if let Some(start) = text.find("```json") {
        let body = &text[start + 7..];
        let end = body.find("```").unwrap_or(body.len());
        body[..end].trim()
    } else {
        match (text.find('{'), text.rfind('}')) {
            (Some(start), Some(end)) if end > start => &text[start..=end],
            _ => return Err(ModelError::BadReply("no JSON object in reply".to_string())),
        }
    };

    let reply: ModelReply =
        serde_json::from_str(json).map_err(|e| ModelError::BadReply(e.to_string()))?;

    if RemediationAction::parse(&reply.action).is_none() {
        return Err(ModelError::BadReply(format!("unknown action {:?}", reply.action)));
    }
    if !reply.confidence.is_finite() || !(0.0..=1.0).contains(&reply.confidence) {
        return Err(ModelError::BadReply(format!("confidence out of range: {}", reply.confidence)));
    }
    Ok(reply)
}

pub struct ModelBackedReasoner {
    client: Arc<dyn ModelClient>,
    fallback: RuleBasedReasoner,
    gate: DecisionGate,
    timeout: Duration,
}

impl ModelBackedReasoner {
    pub fn new(client: Arc<dyn ModelClient>, config: &EngineConfig) -> Self {
        let timeout_ms = config.model.as_ref().map(|m| m.timeout_ms).unwrap_or(DEFAULT_MODEL_TIMEOUT_MS);
        Self {
            client,
            fallback: RuleBasedReasoner::from_config(config),
            gate: DecisionGate::from_config(config),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn with_fallback(mut self, fallback: RuleBasedReasoner) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn ask_model(&self, record: &TelemetryRecord) -> std::result::Result<ModelReply, ModelError> {
        let prompt = build_prompt(record);
        let text = tokio::time::timeout(self.timeout, self.client.complete(&prompt))
            .await
            .map_err(|_| ModelError::Unavailable(format!("no reply within {:?}", self.timeout)))??;
        parse_reply(&text)
    }
}

#[async_trait]
impl Reasoner for ModelBackedReasoner {
    fn name(&self) -> &'static str {
        "model_backed"
    }

    async fn analyze(&self, record: &TelemetryRecord) -> Result<Decision> {
        ensure_incident(record)?;

        let reply = match self.ask_model(record).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "model unavailable, falling back to rule table");
                return self.fallback.decide(record);
            }
        };

        // parse_reply already rejected unknown actions
        let action = RemediationAction::parse(&reply.action).unwrap_or(RemediationAction::None);
        let root_cause = reply
            .root_cause
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.fallback.diagnose(record).map(|m| m.rule.root_cause.clone()))
            .unwrap_or_else(|| "unspecified".to_string());

        let decision = self.gate.finalize(
            Diagnosis::new(root_cause, action, reply.confidence)
                .with_reasoning(reply.reasoning.unwrap_or_default())
                .from_source(DecisionSource::ModelBacked),
        );

        info!(
            resource = record.resource_id().unwrap_or("?"),
            action = %decision.recommended_action,
            confidence = decision.confidence,
            auto = decision.can_auto_execute,
            "model decision produced"
        );
        Ok(decision)
    }
}
