//! Mapping engine errors onto HTTP responses
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use netheal_core::EngineError;
use serde_json::{json, Value};

#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ApprovalRequired { .. } => StatusCode::ACCEPTED,
        EngineError::ConfirmationRequired { .. } => StatusCode::PRECONDITION_REQUIRED,
        EngineError::Conflict { .. } => StatusCode::CONFLICT,
        EngineError::RollbackExpired { .. } => StatusCode::GONE,
        EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        EngineError::Config(_) | EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{"error": {"code", "message"}}`, plus the pending operation id when there is one
pub fn error_body(error: &EngineError) -> Value {
    let mut body = json!({
        "error": {
            "code": error.code(),
            "message": error.to_string(),
        }
    });
    if let EngineError::ApprovalRequired { operation_id, .. } = error {
        body["operation_id"] = json!(operation_id);
    }
    body
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(error_body(&self.0))).into_response()
    }
}
