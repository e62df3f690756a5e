//! Unified Error Model
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or out-of-contract input (telemetry, decision, operation state)
    #[error("INPUT/{0}")]
    InvalidInput(String),

    /// Auto-execute gate not met; a pending operation awaits approval
    #[error("APPROVAL/operation {operation_id} awaits human approval: {reason}")]
    ApprovalRequired { operation_id: String, reason: String },

    #[error("CONFIRM/rollback of {operation_id} requires explicit confirmation")]
    ConfirmationRequired { operation_id: String },

    #[error("CONFLICT/resource {resource_id} already has active operation {active_operation_id}")]
    Conflict {
        resource_id: String,
        active_operation_id: String,
    },

    #[error("EXPIRED/rollback window for {operation_id} closed at {deadline}")]
    RollbackExpired {
        operation_id: String,
        deadline: DateTime<Utc>,
    },

    #[error("NOTFOUND/{0}")]
    NotFound(String),

    #[error("TIMEOUT/{operation} exceeded {budget_ms}ms budget")]
    Timeout { operation: String, budget_ms: u64 },

    #[error("CONFIG/{0}")]
    Config(String),

    #[error("STORAGE/{0}")]
    Storage(String),
}

impl EngineError {
    /// Stable code prefix, used in API error bodies and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "INPUT",
            EngineError::ApprovalRequired { .. } => "APPROVAL",
            EngineError::ConfirmationRequired { .. } => "CONFIRM",
            EngineError::Conflict { .. } => "CONFLICT",
            EngineError::RollbackExpired { .. } => "EXPIRED",
            EngineError::NotFound(_) => "NOTFOUND",
            EngineError::Timeout { .. } => "TIMEOUT",
            EngineError::Config(_) => "CONFIG",
            EngineError::Storage(_) => "STORAGE",
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Storage(format!("json: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_prefix_display() {
        let errors = vec![
            EngineError::invalid("bad record"),
            EngineError::ApprovalRequired {
                operation_id: "op-1".to_string(),
                reason: "low confidence".to_string(),
            },
            EngineError::ConfirmationRequired { operation_id: "op-1".to_string() },
            EngineError::Conflict {
                resource_id: "cell-A01".to_string(),
                active_operation_id: "op-1".to_string(),
            },
            EngineError::NotFound("op-9".to_string()),
            EngineError::Timeout { operation: "execute".to_string(), budget_ms: 10 },
        ];

        for err in errors {
            assert!(
                err.to_string().starts_with(&format!("{}/", err.code())),
                "display should start with code: {}",
                err
            );
        }
    }
}
