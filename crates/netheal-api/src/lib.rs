//! NetHeal API /v1: REST endpoints
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handlers::health))
        .route("/v1/telemetry", post(handlers::ingest_telemetry))
        .route("/v1/telemetry/:resource_id", get(handlers::latest_telemetry))
        .route("/v1/analyze", post(handlers::analyze))
        .route("/v1/incidents", post(handlers::handle_incident))
        .route("/v1/incidents/batch", post(handlers::handle_incident_batch))
        .route("/v1/operations", post(handlers::execute))
        .route("/v1/operations/:id", get(handlers::get_operation))
        .route("/v1/operations/:id/approve", post(handlers::approve))
        .route("/v1/operations/:id/reject", post(handlers::reject))
        .route("/v1/operations/:id/rollback", post(handlers::rollback))
        .route("/v1/audit", get(handlers::audit))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(middleware::cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(state: AppState, addr: &str) -> std::io::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("NetHeal API listening on {}", addr);
    axum::serve(listener, app).await
}
