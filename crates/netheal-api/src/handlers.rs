//! API Handlers
use crate::error::{error_body, ApiError};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use netheal_core::{Decision, EngineError, Operation, TelemetryRecord, NETHEAL_VERSION};
use netheal_executor::{AuditQuery, IncidentOutcome};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// Body of `POST /v1/incidents`
#[derive(Debug, Deserialize)]
pub struct IncidentRequest {
    pub record: TelemetryRecord,
    #[serde(default)]
    pub dry_run: bool,
}

/// Body of `POST /v1/incidents/batch`: a bare array or `{records, dry_run}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IncidentBatchRequest {
    Records(Vec<TelemetryRecord>),
    Options {
        records: Vec<TelemetryRecord>,
        #[serde(default)]
        dry_run: bool,
    },
}

impl IncidentBatchRequest {
    fn into_parts(self) -> (Vec<TelemetryRecord>, bool) {
        match self {
            IncidentBatchRequest::Records(records) => (records, false),
            IncidentBatchRequest::Options { records, dry_run } => (records, dry_run),
        }
    }
}

/// Body of `POST /v1/operations`
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub decision: Decision,
    pub resource_id: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RollbackRequest {
    #[serde(default)]
    pub confirm: bool,
}

/// Body shape errors are input errors, not 422s
fn parse<T: DeserializeOwned>(body: Value) -> Result<T, EngineError> {
    serde_json::from_value(body).map_err(|e| EngineError::invalid(e.to_string()))
}

fn count_operation(state: &AppState, operation: &Operation) {
    let label = if operation.simulated { "simulated".to_string() } else { operation.status.to_string() };
    state.metrics.operations_total.with_label_values(&[label.as_str()]).inc();
}

fn count_outcome(state: &AppState, outcome: &IncidentOutcome) {
    if let Some(decision) = &outcome.decision {
        state
            .metrics
            .decisions_total
            .with_label_values(&[decision.recommended_action.as_str()])
            .inc();
    }
    if let Some(operation) = &outcome.operation {
        count_operation(state, operation);
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": NETHEAL_VERSION,
            "reasoner": state.reasoner().name(),
        })),
    )
}

pub async fn ingest_telemetry(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record: TelemetryRecord = parse(body).map_err(|e| state.fail(e))?;
    let resource_id = record.resource_id().map_err(|e| state.fail(e))?.to_string();
    state.executor().store().ingest(record).map_err(|e| state.fail(e))?;
    Ok((StatusCode::CREATED, Json(json!({ "resource_id": resource_id }))))
}

pub async fn latest_telemetry(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
) -> Result<Json<TelemetryRecord>, ApiError> {
    let record = state.executor().current_state(&resource_id).map_err(|e| state.fail(e))?;
    Ok(Json(record))
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Decision>, ApiError> {
    let record: TelemetryRecord = parse(body).map_err(|e| state.fail(e))?;
    let decision = state.reasoner().analyze(&record).await.map_err(|e| state.fail(e))?;
    state
        .metrics
        .decisions_total
        .with_label_values(&[decision.recommended_action.as_str()])
        .inc();
    Ok(Json(decision))
}

pub async fn handle_incident(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let request: IncidentRequest = parse(body).map_err(|e| state.fail(e))?;
    let outcome = state
        .pipeline
        .handle(request.record, request.dry_run)
        .await
        .map_err(|e| state.fail(e))?;

    count_outcome(&state, &outcome);

    let status = if outcome.awaiting_approval { StatusCode::ACCEPTED } else { StatusCode::OK };
    let body = serde_json::to_value(&outcome).map_err(|e| state.fail(e.into()))?;
    Ok((status, Json(body)))
}

/// Replay records in order; each result stands on its own
pub async fn handle_incident_batch(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let (records, dry_run) = parse::<IncidentBatchRequest>(body).map_err(|e| state.fail(e))?.into_parts();
    let total = records.len();
    let (mut skipped, mut failed) = (0, 0);

    let mut results = Vec::with_capacity(total);
    for (index, result) in state.pipeline.handle_batch(records, dry_run).await.into_iter().enumerate() {
        match result {
            Ok(outcome) => {
                count_outcome(&state, &outcome);
                if outcome.is_skipped() {
                    skipped += 1;
                }
                results.push(json!({ "index": index, "outcome": outcome }));
            }
            Err(e) => {
                failed += 1;
                let ApiError(e) = state.fail(e);
                let mut entry = error_body(&e);
                entry["index"] = json!(index);
                results.push(entry);
            }
        }
    }

    Ok(Json(json!({
        "total": total,
        "processed": total - skipped - failed,
        "skipped": skipped,
        "failed": failed,
        "results": results,
    })))
}

pub async fn execute(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Operation>), ApiError> {
    let request: ExecuteRequest = parse(body).map_err(|e| state.fail(e))?;
    let operation = state
        .executor()
        .execute(&request.decision, &request.resource_id, request.dry_run)
        .await
        .map_err(|e| state.fail(e))?;
    count_operation(&state, &operation);
    Ok((StatusCode::CREATED, Json(operation)))
}

pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Operation>, ApiError> {
    let operation = state.executor().operation(&id).map_err(|e| state.fail(e))?;
    Ok(Json(operation))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Operation>, ApiError> {
    let operation = state.executor().approve(&id).await.map_err(|e| state.fail(e))?;
    count_operation(&state, &operation);
    Ok(Json(operation))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<Operation>, ApiError> {
    let reason = body
        .and_then(|Json(r)| r.reason)
        .unwrap_or_else(|| "rejected by operator".to_string());
    let operation = state.executor().reject(&id, &reason).await.map_err(|e| state.fail(e))?;
    count_operation(&state, &operation);
    Ok(Json(operation))
}

pub async fn rollback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RollbackRequest>>,
) -> Result<Json<Operation>, ApiError> {
    let confirm = body.map(|Json(r)| r.confirm).unwrap_or(false);
    let operation = state.executor().rollback(&id, confirm).await.map_err(|e| state.fail(e))?;
    count_operation(&state, &operation);
    Ok(Json(operation))
}

pub async fn audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<Value> {
    let audit = state.executor().audit();
    let entries = audit.query(&query);
    Json(json!({
        "count": entries.len(),
        "entries": entries,
        "stats": audit.stats(),
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| state.fail(EngineError::Storage(format!("metrics: {}", e))))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
