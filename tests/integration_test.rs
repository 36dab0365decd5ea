//! End-to-end tests of the HTTP surface.
//!
//! Each test binds the real router to an ephemeral port, with the Sheets
//! API replaced by a local axum stub serving a fixed `values` payload.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tokio_test::assert_ok;

use aq_analyzer::{routes, AnalysisConfig, Config, SheetsClient};

// ---

const RANGE: &str = "PurpleAir002_AJLC Building!A:Z";

async fn spawn(app: Router) -> Result<SocketAddr> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(addr)
}

/// Two hours of one-minute readings ending now, newest at 80 µg/m³,
/// plus one stale row from three days ago.
fn recent_sheet() -> Value {
    // ---
    let now = Utc::now().naive_utc();
    let fmt = |ts: chrono::NaiveDateTime| ts.format("%Y-%m-%d %H:%M:%S").to_string();

    let mut values = vec![json!(["TimeStamp", "PM2.5 :cf_1( µg/m³)", "Humidity (%)"])];
    values.push(json!([fmt(now - Duration::days(3)), "500", "40"]));
    for i in (1..120).rev() {
        let pm = 8 + i % 3;
        values.push(json!([fmt(now - Duration::minutes(i)), pm.to_string(), "40"]));
    }
    values.push(json!([fmt(now), "80", "40"]));

    json!({ "range": RANGE, "majorDimension": "ROWS", "values": values })
}

/// Start a stub Sheets API and the service pointed at it.
async fn spawn_service(sheet: Option<Value>) -> Result<String> {
    // ---
    let stub = match sheet {
        Some(body) => Router::new().route(
            "/v4/spreadsheets/{id}/values/{range}",
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        ),
        None => Router::new().route(
            "/v4/spreadsheets/{id}/values/{range}",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ),
    };
    let stub_addr = spawn(stub).await?;

    let config = Config {
        bind_addr: "127.0.0.1:0".parse()?,
        spreadsheet_id: "test-sheet".to_string(),
        sheet_range: RANGE.to_string(),
        sheets_api_key: "test-key".to_string(),
        sheets_base_url: format!("http://{}", stub_addr),
        lookback_hours: 24,
        analysis: AnalysisConfig::default(),
    };
    let sheets = SheetsClient::new(&config);
    let addr = spawn(routes::router(sheets, config)).await?;
    Ok(format!("http://{}", addr))
}

/// 240 one-minute readings at 10 µg/m³ with a three-reading spike.
fn spike_grid() -> Value {
    // ---
    let t0 = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut values = vec![json!(["TimeStamp", "PM2.5 :cf_1( µg/m³)"])];
    for i in 0..240 {
        let pm = match i {
            100 => 60.0,
            101 => 65.0,
            102 => 62.0,
            _ => 10.0,
        };
        let ts = (t0 + Duration::minutes(i)).format("%Y-%m-%d %H:%M:%S").to_string();
        values.push(json!([ts, pm]));
    }
    json!({ "values": values })
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    // ---
    let base = spawn_service(None).await?;
    let body: Value = Client::new()
        .get(format!("{}/health", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "aq-analyzer");
    Ok(())
}

#[tokio::test]
async fn report_endpoint_analyzes_recent_window() -> Result<()> {
    // ---
    let base = spawn_service(Some(recent_sheet())).await?;
    let resp = assert_ok!(
        Client::new()
            .get(format!("{}/report?hours=24", base))
            .send()
            .await
    );
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let report: Value = resp.json().await?;

    // the three-day-old row falls outside the window
    assert_eq!(report["data_quality"]["total_records"], 120);
    assert_eq!(report["air_quality_metrics"]["pm25_exposure"]["max"], 80.0);
    assert_eq!(report["pm25_analysis"]["metric"], "pm2_5_atm");
    assert!(report["data_period"]["start"].is_string());

    let alerts = report["current_alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert_level"], "HIGH");
    assert!(!report["recommendations"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn trend_endpoint_per_metric() -> Result<()> {
    // ---
    let base = spawn_service(Some(recent_sheet())).await?;
    let client = Client::new();

    let humidity: Value = client
        .get(format!("{}/trends/humidity", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(humidity["metric"], "humidity");
    assert_eq!(humidity["statistics"]["mean"], 40.0);
    assert_eq!(humidity["trend"]["trend_direction"], "stable");

    // mapped but absent from the sheet: not enough data, empty body
    let pressure: Value = client
        .get(format!("{}/trends/pressure", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(pressure, json!({}));

    let unknown = client.get(format!("{}/trends/ozone", base)).send().await?;
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn alerts_endpoint_flags_latest_reading() -> Result<()> {
    // ---
    let base = spawn_service(Some(recent_sheet())).await?;
    let alerts: Vec<Value> = Client::new()
        .get(format!("{}/alerts", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["pm25_value"], 80.0);
    Ok(())
}

#[tokio::test]
async fn analyze_endpoint_detects_event_without_fetch() -> Result<()> {
    // ---
    let base = spawn_service(None).await?;
    let resp = Client::new()
        .post(format!("{}/analyze", base))
        .json(&spike_grid())
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let report: Value = resp.json().await?;

    let events = report["pollution_events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_id"], 1);
    assert_eq!(events[0]["start_time"], "2024-05-01 01:40:00");
    assert_eq!(events[0]["end_time"], "2024-05-01 01:42:00");
    assert_eq!(events[0]["peak_pm25"], 65.0);
    assert_eq!(events[0]["severity"], "Unhealthy");
    assert!(report["current_alerts"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn analyze_rejects_table_without_timestamp_column() -> Result<()> {
    // ---
    let base = spawn_service(None).await?;
    let resp = Client::new()
        .post(format!("{}/analyze", base))
        .json(&json!({ "values": [["When", "PM2.5 :cf_1( µg/m³)"], ["x", "1"]] }))
        .send()
        .await?;
    assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await?;
    assert!(body["error"].as_str().unwrap().contains("timestamp"));
    Ok(())
}

#[tokio::test]
async fn upstream_failure_is_bad_gateway() -> Result<()> {
    // ---
    let base = spawn_service(None).await?;
    let resp = Client::new().get(format!("{}/report", base)).send().await?;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    Ok(())
}
