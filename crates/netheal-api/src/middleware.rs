//! Request middleware
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::debug;

pub fn cors() -> CorsLayer {
    CorsLayer::permissive()
}

/// Log method, path, status and latency of every request
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    response
}
