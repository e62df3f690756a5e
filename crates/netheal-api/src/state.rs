//! Shared application state
use crate::error::ApiError;
use crate::metrics::ApiMetrics;
use netheal_core::{EngineConfig, EngineError, Result};
use netheal_executor::{AuditLog, Executor, IncidentPipeline, TelemetryStore};
use netheal_reasoner::Reasoner;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IncidentPipeline>,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(pipeline: IncidentPipeline) -> Result<Self> {
        let metrics = ApiMetrics::new().map_err(|e| EngineError::Config(format!("metrics: {}", e)))?;
        Ok(Self {
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(metrics),
        })
    }

    /// Wire store, audit log, executor and pipeline from config
    pub fn from_config(config: &EngineConfig, reasoner: Arc<dyn Reasoner>) -> Result<Self> {
        let audit = match &config.audit_path {
            Some(path) => AuditLog::open(path)?,
            None => {
                info!("no audit_path configured, audit log is memory-only");
                AuditLog::in_memory()
            }
        };
        let executor = Executor::new(Arc::new(TelemetryStore::new()), Arc::new(audit), config);
        Self::new(IncidentPipeline::new(reasoner, Arc::new(executor)))
    }

    pub fn executor(&self) -> &Arc<Executor> {
        self.pipeline.executor()
    }

    pub fn reasoner(&self) -> &Arc<dyn Reasoner> {
        self.pipeline.reasoner()
    }

    /// Count the failure and wrap it for the response
    pub fn fail(&self, error: EngineError) -> ApiError {
        match &error {
            EngineError::ApprovalRequired { .. } => {
                self.metrics.operations_total.with_label_values(&["pending"]).inc();
            }
            other => {
                self.metrics.errors_total.with_label_values(&[other.code()]).inc();
            }
        }
        ApiError(error)
    }
}
