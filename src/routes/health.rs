// src/routes/health.rs
//! Liveness endpoint for the air-quality analysis service.
//!
//! `GET /health` answers without touching the spreadsheet, so orchestrators
//! and CI can probe the process cheaply. The gateway (`mod.rs`) merges this
//! subrouter with the analysis routes.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Subrouter with the `/health` route, generic over the gateway state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
