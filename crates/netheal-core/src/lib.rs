//! NetHeal Core: data model, errors, configuration and time
//!
//! Shared vocabulary for the sense → reason → act → verify loop:
//! telemetry records come in, decisions are derived from them, and
//! operations record what was done about each decision.

pub mod clock;
pub mod config;
pub mod data_model;
pub mod error;
pub mod impact;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, ModelConfig, ReasonerKind, DEFAULT_MODEL_TIMEOUT_MS};
pub use data_model::{
    Decision, DecisionSource, Domain, Operation, OperationStatus, RecordStatus,
    RemediationAction, TelemetryRecord,
};
pub use error::{EngineError, Result};
pub use impact::{ActionParameters, ExpectedImpact, ImpactPct};

/// Engine version reported by the API
pub const NETHEAL_VERSION: &str = "1.0.0";
