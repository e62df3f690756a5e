//! Incident pipeline: ingest → analyze → execute or await approval

use crate::executor::Executor;
use netheal_core::{Decision, EngineError, Operation, Result, TelemetryRecord};
use netheal_reasoner::Reasoner;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the pipeline did with a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentOutcome {
    pub resource_id: String,
    /// Absent when the record was not an incident
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    pub awaiting_approval: bool,
}

impl IncidentOutcome {
    fn skipped(resource_id: String) -> Self {
        Self { resource_id, decision: None, operation: None, awaiting_approval: false }
    }

    /// True when the record was not an incident
    pub fn is_skipped(&self) -> bool {
        self.decision.is_none()
    }

    /// True when only a recommendation came out (no operation was recorded)
    pub fn is_recommendation_only(&self) -> bool {
        self.decision.is_some() && self.operation.is_none()
    }
}

pub struct IncidentPipeline {
    reasoner: Arc<dyn Reasoner>,
    executor: Arc<Executor>,
}

impl IncidentPipeline {
    pub fn new(reasoner: Arc<dyn Reasoner>, executor: Arc<Executor>) -> Self {
        Self { reasoner, executor }
    }

    pub fn reasoner(&self) -> &Arc<dyn Reasoner> {
        &self.reasoner
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub async fn handle(&self, record: TelemetryRecord, dry_run: bool) -> Result<IncidentOutcome> {
        let resource_id = record.resource_id()?.to_string();
        let is_incident = record.is_incident();
        self.executor.store().ingest(record.clone())?;

        if !is_incident {
            debug!(resource = %resource_id, "not an incident, nothing to do");
            return Ok(IncidentOutcome::skipped(resource_id));
        }

        let decision = self.reasoner.analyze(&record).await?;
        if decision.recommended_action.is_none() {
            info!(resource = %resource_id, root_cause = %decision.root_cause, "no action recommended");
            return Ok(IncidentOutcome {
                resource_id,
                decision: Some(decision),
                operation: None,
                awaiting_approval: false,
            });
        }

        let (operation, awaiting_approval) =
            match self.executor.execute(&decision, &resource_id, dry_run).await {
                Ok(operation) => (operation, false),
                Err(EngineError::ApprovalRequired { operation_id, .. }) => {
                    (self.executor.operation(&operation_id)?, true)
                }
                Err(e) => return Err(e),
            };

        Ok(IncidentOutcome {
            resource_id,
            decision: Some(decision),
            operation: Some(operation),
            awaiting_approval,
        })
    }

    /// Replay a batch of records in order.
    ///
    /// Results line up with the input. A failing record does not stop the
    /// ones after it.
    pub async fn handle_batch(&self, records: Vec<TelemetryRecord>, dry_run: bool) -> Vec<Result<IncidentOutcome>> {
        let mut results = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let result = self.handle(record, dry_run).await;
            if let Err(e) = &result {
                warn!(index, error = %e, "batch record failed");
            }
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        let skipped = results
            .iter()
            .filter(|r| matches!(r, Ok(outcome) if outcome.is_skipped()))
            .count();
        info!(records = results.len(), skipped, failed, "batch processed");
        results
    }
}
