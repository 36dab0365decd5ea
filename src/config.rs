//! Configuration loader for the `aq-analyzer` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Analysis settings are grouped into
//! [`AnalysisConfig`] and passed explicitly to each analysis entry point.
//!
use std::env;
use std::net::SocketAddr;

use anyhow::{anyhow, Result};

use crate::classify::{AqiPalette, AqiThresholds};
use crate::events::DEFAULT_THRESHOLD_MULTIPLIER;
use crate::ingest::FieldMapping;

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

pub const DEFAULT_SHEET_RANGE: &str = "PurpleAir002_AJLC Building!A:Z";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_ALERT_THRESHOLD: f64 = 35.0;

/// Settings consumed by the analysis components.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    // ---
    /// Upper bounds of the six AQI bands.
    pub thresholds: AqiThresholds,

    /// One display colour per AQI band.
    pub palette: AqiPalette,

    /// Canonical field → sheet column header.
    pub mapping: FieldMapping,

    /// Rolling std-dev multiplier for event detection.
    pub event_threshold_multiplier: f64,

    /// PM2.5 level above which the latest reading raises an alert.
    pub alert_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            thresholds: AqiThresholds::default(),
            palette: AqiPalette::default(),
            mapping: FieldMapping::default(),
            event_threshold_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
        }
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// Google Sheets document id.
    pub spreadsheet_id: String,

    /// A1-notation range holding the sensor log.
    pub sheet_range: String,

    /// API key for the Sheets values endpoint.
    pub sheets_api_key: String,

    /// Sheets API origin, overridable for testing.
    pub sheets_base_url: String,

    /// Default lookback window for fetched data.
    pub lookback_hours: u32,

    pub analysis: AnalysisConfig,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `SPREADSHEET_ID` – Google Sheets document id
/// - `SHEETS_API_KEY` – API key for the Sheets values endpoint
///
/// Optional:
/// - `SHEET_RANGE` – range to read (default: `PurpleAir002_AJLC Building!A:Z`)
/// - `SHEETS_BASE_URL` – API origin (default: `https://sheets.googleapis.com`)
/// - `AQ_BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
/// - `LOOKBACK_HOURS` – hours of data to analyze (default: 24)
/// - `AQI_THRESHOLDS` – six ascending comma-separated bounds
/// - `AQI_COLORS` – six comma-separated colours
/// - `COLUMN_MAPPING` – `field=Header;field=Header` overrides
/// - `EVENT_THRESHOLD_MULTIPLIER` – default 2.0
/// - `ALERT_THRESHOLD` – default 35.0
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let spreadsheet_id = require_env!("SPREADSHEET_ID");
    let sheets_api_key = require_env!("SHEETS_API_KEY");
    let sheet_range = env::var("SHEET_RANGE").unwrap_or_else(|_| DEFAULT_SHEET_RANGE.into());
    let sheets_base_url =
        env::var("SHEETS_BASE_URL").unwrap_or_else(|_| DEFAULT_SHEETS_BASE_URL.into());
    let bind_addr = parse_env!("AQ_BIND_ADDR", SocketAddr, SocketAddr::from(([0, 0, 0, 0], 8080)));
    let lookback_hours = parse_env!("LOOKBACK_HOURS", u32, 24);

    let mut analysis = AnalysisConfig {
        event_threshold_multiplier: parse_env!(
            "EVENT_THRESHOLD_MULTIPLIER",
            f64,
            DEFAULT_THRESHOLD_MULTIPLIER
        ),
        alert_threshold: parse_env!("ALERT_THRESHOLD", f64, DEFAULT_ALERT_THRESHOLD),
        ..AnalysisConfig::default()
    };
    if let Ok(raw) = env::var("AQI_THRESHOLDS") {
        analysis.thresholds = parse_thresholds(&raw)?;
    }
    if let Ok(raw) = env::var("AQI_COLORS") {
        analysis.palette = parse_palette(&raw)?;
    }
    if let Ok(raw) = env::var("COLUMN_MAPPING") {
        apply_column_mapping(&mut analysis.mapping, &raw)?;
    }

    Ok(Config {
        bind_addr,
        spreadsheet_id,
        sheet_range,
        sheets_api_key,
        sheets_base_url,
        lookback_hours,
        analysis,
    })
}

/// Parse six comma-separated ascending bounds.
pub fn parse_thresholds(raw: &str) -> Result<AqiThresholds> {
    // ---
    let values = raw
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Invalid AQI_THRESHOLDS '{}': {}", raw, e))?;
    let bounds: [f64; 6] = values
        .try_into()
        .map_err(|v: Vec<f64>| anyhow!("AQI_THRESHOLDS needs 6 values, got {}", v.len()))?;
    AqiThresholds::new(bounds)
}

/// Parse six comma-separated colours.
pub fn parse_palette(raw: &str) -> Result<AqiPalette> {
    // ---
    let colors: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).collect();
    let colors: [String; 6] = colors
        .try_into()
        .map_err(|v: Vec<String>| anyhow!("AQI_COLORS needs 6 values, got {}", v.len()))?;
    AqiPalette::new(colors)
}

/// Apply `field=Header` pairs separated by `;` on top of `mapping`.
pub fn apply_column_mapping(mapping: &mut FieldMapping, raw: &str) -> Result<()> {
    // ---
    for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, column) = pair.split_once('=').ok_or_else(|| {
            anyhow!("Invalid COLUMN_MAPPING entry '{}': expected field=Header", pair)
        })?;
        mapping
            .set(field.trim(), column)
            .map_err(|e| anyhow!("Invalid COLUMN_MAPPING entry '{}': {}", pair, e))?;
    }
    Ok(())
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the API key while showing all other values that were loaded.
    pub fn log_config(&self) {
        // ---
        let key_len = self.sheets_api_key.chars().count();
        let masked_key = if key_len <= 8 {
            "****".to_string()
        } else {
            let tail: String = self.sheets_api_key.chars().skip(key_len - 4).collect();
            format!("****{}", tail)
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  AQ_BIND_ADDR     : {}", self.bind_addr);
        tracing::info!("  SPREADSHEET_ID   : {}", self.spreadsheet_id);
        tracing::info!("  SHEET_RANGE      : {}", self.sheet_range);
        tracing::info!("  SHEETS_API_KEY   : {}", masked_key);
        tracing::info!("  SHEETS_BASE_URL  : {}", self.sheets_base_url);
        tracing::info!("  LOOKBACK_HOURS   : {}", self.lookback_hours);
        tracing::info!("  AQI_THRESHOLDS   : {:?}", self.analysis.thresholds.bounds());
        tracing::info!("  EVENT_MULTIPLIER : {}", self.analysis.event_threshold_multiplier);
        tracing::info!("  ALERT_THRESHOLD  : {}", self.analysis.alert_threshold);
    }
}
