//! Analysis endpoints.
//!
//! Every GET handler runs the same pipeline: fetch the sheet, normalize,
//! apply the lookback window, analyze. `POST /analyze` skips the fetch and
//! analyzes the grid it is given.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::ingest::{filter_recent, normalize, utc_now, IngestError, RawTable};
use crate::models::{Metric, Series};
use crate::report::{build_report, current_alerts};
use crate::sheets::ValueRange;
use crate::trend::analyze_temporal_trends;
use crate::Config;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/report", get(report_handler))
        .route("/trends/{metric}", get(trend_handler))
        .route("/alerts", get(alerts_handler))
        .route("/analyze", post(analyze_handler))
}

/// Query parameters shared by the fetch-backed endpoints.
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    /// Hours of history to analyze; defaults to `LOOKBACK_HOURS`.
    hours: Option<u32>,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn report_handler(
    Query(params): Query<WindowQuery>,
    State((sheets, config)): State<AppState>,
) -> Response {
    // ---
    info!("GET /report - Starting pipeline");
    let now = utc_now();
    let series = match load_series(&sheets, &config, params.hours, now).await {
        Ok(series) => series,
        Err(resp) => return resp,
    };
    let report = build_report(&series, &config.analysis, now);
    debug!("GET /report - Returning OK");
    (StatusCode::OK, Json(report)).into_response()
}

async fn trend_handler(
    Path(metric): Path<String>,
    Query(params): Query<WindowQuery>,
    State((sheets, config)): State<AppState>,
) -> Response {
    // ---
    info!("GET /trends/{} - Starting pipeline", metric);
    let metric: Metric = match metric.parse() {
        Ok(m) => m,
        Err(e) => return failure(StatusCode::NOT_FOUND, e),
    };
    let series = match load_series(&sheets, &config, params.hours, utc_now()).await {
        Ok(series) => series,
        Err(resp) => return resp,
    };
    match analyze_temporal_trends(&series, metric) {
        Some(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        None => (StatusCode::OK, Json(serde_json::json!({}))).into_response(),
    }
}

async fn alerts_handler(State((sheets, config)): State<AppState>) -> Response {
    // ---
    info!("GET /alerts - Starting pipeline");
    let series = match load_series(&sheets, &config, None, utc_now()).await {
        Ok(series) => series,
        Err(resp) => return resp,
    };
    let alerts = current_alerts(&series, config.analysis.alert_threshold);
    (StatusCode::OK, Json(alerts)).into_response()
}

async fn analyze_handler(
    State((_, config)): State<AppState>,
    Json(body): Json<ValueRange>,
) -> Response {
    // ---
    info!("POST /analyze - {} rows supplied", body.values.len());
    let series = match RawTable::from_grid(body.into_grid())
        .and_then(|table| normalize(&table, &config.analysis))
    {
        Ok(series) => series,
        Err(e) => {
            warn!("Rejected supplied table: {}", e);
            return failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
        }
    };
    let report = build_report(&series, &config.analysis, utc_now());
    (StatusCode::OK, Json(report)).into_response()
}

/// Fetch, normalize and window the configured sheet.
async fn load_series(
    sheets: &crate::SheetsClient,
    config: &Config,
    hours: Option<u32>,
    now: NaiveDateTime,
) -> Result<Series, Response> {
    // ---
    let table = match sheets.fetch_table().await {
        Ok(table) => table,
        Err(e) => {
            if let Some(ingest) = e.downcast_ref::<IngestError>() {
                warn!("Sheet rejected: {}", ingest);
                return Err(failure(StatusCode::UNPROCESSABLE_ENTITY, ingest.to_string()));
            }
            error!("Failed to fetch sensor data: {}", e);
            return Err(failure(StatusCode::BAD_GATEWAY, "Failed to fetch data"));
        }
    };

    let series = normalize(&table, &config.analysis).map_err(|e| {
        warn!("Sheet rejected: {}", e);
        failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;

    let hours = hours.unwrap_or(config.lookback_hours);
    Ok(filter_recent(&series, hours, now))
}
