//! Record normalizer: raw spreadsheet rows in, typed [`Series`] out.
//!
//! Column names are resolved once per table through an explicit
//! [`FieldMapping`]. A missing timestamp column rejects the whole table;
//! a missing metric column is logged and that metric stays empty. Cell-level
//! problems never fail: unparseable timestamps drop the row, unparseable
//! numbers become `None`.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::classify::{aqi_category, category_color, AqiCategory};
use crate::config::AnalysisConfig;
use crate::models::{Metric, Reading, Series};

// ---

/// Canonical name of the timestamp field in a mapping.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Naive layouts tried in order after RFC 3339. Naive instants are UTC.
const NAIVE_LAYOUTS: [&str; 11] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%dT%H:%M:%S",
];

/// Explicit UTC markers accepted after a naive layout.
const UTC_SUFFIXES: [&str; 3] = [" UTC", "Z", "z"];

/// Structural problems that make a table unusable.
#[derive(Error, Debug, PartialEq)]
pub enum IngestError {
    /// No header row at all.
    #[error("table is empty: expected a header row")]
    EmptyTable,

    /// A required field has no matching column in the header.
    #[error("required field '{field}' is mapped to column '{column}', which is not in the header")]
    MissingColumn { field: String, column: String },
}

/// Canonical field name → source column header.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    timestamp: String,
    metrics: BTreeMap<Metric, String>,
}

impl FieldMapping {
    // ---
    pub fn new(timestamp: impl Into<String>) -> Self {
        FieldMapping {
            timestamp: timestamp.into(),
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, metric: Metric, column: impl Into<String>) -> Self {
        self.metrics.insert(metric, column.into());
        self
    }

    /// Point a canonical field at a different column.
    pub fn set(&mut self, canonical: &str, column: &str) -> Result<(), String> {
        // ---
        let column = column.trim().to_string();
        if column.is_empty() {
            return Err(format!("empty column name for '{}'", canonical));
        }
        if canonical == TIMESTAMP_FIELD {
            self.timestamp = column;
            return Ok(());
        }
        let metric: Metric = canonical.parse()?;
        self.metrics.insert(metric, column);
        Ok(())
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp
    }

    pub fn metric_column(&self, metric: Metric) -> Option<&str> {
        self.metrics.get(&metric).map(String::as_str)
    }

    /// Resolve header positions for every mapped field.
    pub fn resolve(&self, header: &[String]) -> Result<ResolvedColumns, IngestError> {
        // ---
        let position = |name: &str| header.iter().position(|h| h.trim() == name);

        let timestamp = position(&self.timestamp).ok_or_else(|| IngestError::MissingColumn {
            field: TIMESTAMP_FIELD.to_string(),
            column: self.timestamp.clone(),
        })?;

        let mut metrics = Vec::with_capacity(self.metrics.len());
        let mut unmapped = Vec::new();
        for (&metric, column) in &self.metrics {
            match position(column) {
                Some(idx) => metrics.push((metric, idx)),
                None => unmapped.push(metric),
            }
        }

        Ok(ResolvedColumns {
            timestamp,
            metrics,
            unmapped,
        })
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        FieldMapping::new("TimeStamp")
            .with_metric(Metric::Temperature, "Temperature (°F)")
            .with_metric(Metric::Humidity, "Humidity (%)")
            .with_metric(Metric::Dewpoint, "Dewpoint (°F)")
            .with_metric(Metric::Pressure, "Pressure (hPa)")
            .with_metric(Metric::Pm1_0, "PM1.0 :cf_1( µg/m³)")
            .with_metric(Metric::Pm2_5, "PM2.5 :cf_1( µg/m³)")
            .with_metric(Metric::Pm10, "PM10.0 :cf_1( µg/m³)")
            .with_metric(Metric::Pm2_5Aqi, "PM2.5 AQI")
    }
}

/// Column positions of one table's header, resolved from a [`FieldMapping`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumns {
    pub timestamp: usize,
    pub metrics: Vec<(Metric, usize)>,
    /// Mapped metrics whose column is absent from this header.
    pub unmapped: Vec<Metric>,
}

/// A header row plus data rows, all cells as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    // ---
    /// Split a grid whose first row is the header.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Result<Self, IngestError> {
        if grid.is_empty() {
            return Err(IngestError::EmptyTable);
        }
        let rows = grid.split_off(1);
        let header = grid.pop().unwrap_or_default();
        Ok(RawTable { header, rows })
    }
}

/// Best-effort timestamp parsing into naive UTC.
///
/// Offsets are converted to UTC; instants without one are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    let s = UTC_SUFFIXES
        .iter()
        .find_map(|suffix| s.strip_suffix(suffix))
        .unwrap_or(s);
    for layout in NAIVE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(dt);
        }
    }
    ["%Y-%m-%d", "%m/%d/%Y"]
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(s, layout).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Best-effort numeric coercion; blanks, text and non-finite values are `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Build a reading for `timestamp`, deriving calendar and AQI fields.
pub fn derive_reading(
    timestamp: NaiveDateTime,
    values: &[(Metric, Option<f64>)],
    config: &AnalysisConfig,
) -> Reading {
    // ---
    let day_of_week = timestamp.weekday().num_days_from_monday();
    let mut reading = Reading {
        timestamp,
        pm1_0: None,
        pm2_5_atm: None,
        pm10_atm: None,
        pm2_5_aqi: None,
        temperature: None,
        humidity: None,
        dewpoint: None,
        pressure: None,
        hour: timestamp.hour(),
        day_of_week,
        is_weekend: day_of_week >= 5,
        aqi_category: AqiCategory::Unknown,
        aqi_color: None,
    };
    for &(metric, value) in values {
        reading.set_value(metric, value);
    }
    reading.aqi_category = aqi_category(reading.pm2_5_atm, &config.thresholds);
    reading.aqi_color = category_color(reading.aqi_category, &config.palette).map(String::from);
    reading
}

/// Normalize a raw table into a series.
pub fn normalize(table: &RawTable, config: &AnalysisConfig) -> Result<Series, IngestError> {
    // ---
    let columns = config.mapping.resolve(&table.header)?;
    for metric in &columns.unmapped {
        warn!(
            "Column '{}' for {} not found in header; field will be empty",
            config.mapping.metric_column(*metric).unwrap_or_default(),
            metric
        );
    }

    fn cell(row: &[String], idx: usize) -> &str {
        row.get(idx).map(String::as_str).unwrap_or("")
    }

    let mut dropped = 0usize;
    let mut readings = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let Some(timestamp) = parse_timestamp(cell(row, columns.timestamp)) else {
            dropped += 1;
            continue;
        };
        let values: Vec<(Metric, Option<f64>)> = columns
            .metrics
            .iter()
            .map(|&(metric, idx)| (metric, parse_number(cell(row, idx))))
            .collect();
        readings.push(derive_reading(timestamp, &values, config));
    }

    if dropped > 0 {
        debug!("Dropped {} rows with unparseable timestamps", dropped);
    }

    let series = normalize_readings(readings, config);
    info!(
        "Data cleaned: {} valid rows remaining of {}",
        series.len(),
        table.rows.len()
    );
    Ok(series)
}

/// Order readings, collapse duplicate timestamps (later arrival wins) and
/// re-derive computed fields. Idempotent.
pub fn normalize_readings(mut readings: Vec<Reading>, config: &AnalysisConfig) -> Series {
    // ---
    readings.sort_by_key(|r| r.timestamp);

    let mut out: Vec<Reading> = Vec::with_capacity(readings.len());
    for reading in readings {
        match out.last_mut() {
            Some(prev) if prev.timestamp == reading.timestamp => *prev = reading,
            _ => out.push(reading),
        }
    }

    let out = out
        .into_iter()
        .map(|r| {
            let values: Vec<(Metric, Option<f64>)> =
                Metric::ALL.iter().map(|&m| (m, r.value(m))).collect();
            derive_reading(r.timestamp, &values, config)
        })
        .collect();

    Series::from_sorted(out)
}

/// Current instant in the frame timestamps are normalized to (naive UTC).
pub fn utc_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Keep readings at or after `now - hours`.
pub fn filter_recent(series: &Series, hours: u32, now: NaiveDateTime) -> Series {
    // ---
    let cutoff = now - Duration::hours(i64::from(hours));
    let kept: Vec<Reading> = series
        .readings()
        .iter()
        .filter(|r| r.timestamp >= cutoff)
        .cloned()
        .collect();
    debug!("Retrieved {} records from last {} hours", kept.len(), hours);
    Series::from_sorted(kept)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn small_config() -> AnalysisConfig {
        // ---
        let mapping = FieldMapping::new("Time")
            .with_metric(Metric::Pm2_5, "PM2.5")
            .with_metric(Metric::Temperature, "Temp");
        AnalysisConfig {
            mapping,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_timestamp_formats() {
        // ---
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(13, 5, 0)
            .unwrap();
        for raw in [
            "2024-05-01 13:05:00",
            "2024-05-01T13:05:00",
            "2024-05-01T13:05:00Z",
            "2024-05-01T08:05:00-05:00",
            "05/01/2024 13:05:00",
            "5/1/2024 13:05",
            "5/1/2024 1:05:00 PM",
            "05/01/2024 01:05 PM",
            "2024/05/01T13:05:00z",
            "2024-05-01 13:05:00 UTC",
            " 2024-05-01 13:05 ",
        ] {
            assert_eq!(parse_timestamp(raw), Some(expected), "failed on {:?}", raw);
        }
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_numeric_coercion() {
        // ---
        assert_eq!(parse_number(" 12.5 "), Some(12.5));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_normalize_drops_bad_rows_sorts_and_dedups() {
        // ---
        let table = RawTable::from_grid(grid(&[
            &["Time", "PM2.5", "Temp"],
            &["2024-05-04 10:02:00", "8", "70"],
            &["garbage", "99", "70"],
            &["2024-05-04 10:00:00", "40", "bad"],
            &["2024-05-04 10:02:00", "9", "71"],
            &["2024-05-04 10:01:00"],
        ]))
        .unwrap();

        let series = normalize(&table, &small_config()).unwrap();
        let r = series.readings();
        assert_eq!(r.len(), 3);

        assert_eq!(r[0].pm2_5_atm, Some(40.0));
        assert_eq!(r[0].temperature, None);
        assert_eq!(r[0].aqi_category, AqiCategory::UnhealthyForSensitive);
        assert_eq!(r[0].aqi_color.as_deref(), Some("#FF8C00"));

        // short row: missing cells are missing values
        assert_eq!(r[1].pm2_5_atm, None);
        assert_eq!(r[1].aqi_category, AqiCategory::Unknown);
        assert_eq!(r[1].aqi_color, None);

        // duplicate timestamp keeps the later row
        assert_eq!(r[2].pm2_5_atm, Some(9.0));
        assert_eq!(r[2].temperature, Some(71.0));
    }

    #[test]
    fn test_calendar_features() {
        // ---
        // 2024-05-04 is a Saturday
        let table = RawTable::from_grid(grid(&[
            &["Time", "PM2.5"],
            &["2024-05-04 23:30:00", "1"],
            &["2024-05-06 07:00:00", "1"],
        ]))
        .unwrap();
        let series = normalize(&table, &small_config()).unwrap();
        let r = series.readings();
        assert_eq!((r[0].hour, r[0].day_of_week, r[0].is_weekend), (23, 5, true));
        assert_eq!((r[1].hour, r[1].day_of_week, r[1].is_weekend), (7, 0, false));
    }

    #[test]
    fn test_missing_timestamp_column_is_rejected() {
        // ---
        let table = RawTable::from_grid(grid(&[&["When", "PM2.5"], &["x", "1"]])).unwrap();
        let err = normalize(&table, &small_config()).unwrap_err();
        assert_eq!(
            err,
            IngestError::MissingColumn {
                field: "timestamp".to_string(),
                column: "Time".to_string()
            }
        );
    }

    #[test]
    fn test_unmapped_metric_is_flagged_not_fatal() {
        // ---
        let header: Vec<String> = vec!["Time".into(), "PM2.5".into()];
        let cols = small_config().mapping.resolve(&header).unwrap();
        assert_eq!(cols.unmapped, vec![Metric::Temperature]);
        assert_eq!(cols.metrics, vec![(Metric::Pm2_5, 1)]);
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        // ---
        assert_eq!(RawTable::from_grid(vec![]), Err(IngestError::EmptyTable));
        let header_only = RawTable::from_grid(grid(&[&["Time"]])).unwrap();
        assert!(header_only.rows.is_empty());
    }

    #[test]
    fn test_mapping_override() {
        // ---
        let mut mapping = FieldMapping::default();
        mapping.set("pm2_5_atm", "PM2.5 (ATM)").unwrap();
        mapping.set("timestamp", "Date").unwrap();
        assert_eq!(mapping.metric_column(Metric::Pm2_5), Some("PM2.5 (ATM)"));
        assert_eq!(mapping.timestamp_column(), "Date");
        assert!(mapping.set("pm25", "x").is_err());
        assert!(mapping.set("humidity", "  ").is_err());
    }

    #[test]
    fn test_filter_recent() {
        // ---
        let table = RawTable::from_grid(grid(&[
            &["Time", "PM2.5"],
            &["2024-05-01 00:00:00", "1"],
            &["2024-05-01 11:00:00", "2"],
            &["2024-05-01 12:00:00", "3"],
        ]))
        .unwrap();
        let series = normalize(&table, &small_config()).unwrap();
        let now = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        let recent = filter_recent(&series, 2, now);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.first().unwrap().pm2_5_atm, Some(2.0));
    }

    #[test]
    fn test_offset_and_naive_rows_share_utc_frame() {
        // ---
        let table = RawTable::from_grid(grid(&[
            &["Time", "PM2.5"],
            &["2026-10-17T02:10:59+02:00", "5"],
            &["2026-10-17 00:20:00", "6"],
            &["2026-10-16T18:00:00-05:00", "7"],
        ]))
        .unwrap();
        let series = normalize(&table, &small_config()).unwrap();
        let r = series.readings();
        assert_eq!(r.len(), 3);

        // 18:00-05:00 is 23:00 UTC the previous day, sorted first
        assert_eq!(r[0].pm2_5_atm, Some(7.0));
        assert_eq!((r[0].hour, r[0].day_of_week), (23, 4));
        assert_eq!((r[1].hour, r[1].day_of_week), (0, 5));
        assert_eq!((r[2].hour, r[2].day_of_week), (0, 5));

        let now = NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(0, 40, 59)
            .unwrap();
        let recent = filter_recent(&series, 1, now);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.first().unwrap().pm2_5_atm, Some(5.0));
    }

    #[test]
    fn test_utc_now_matches_offset_conversion() {
        // ---
        let now = utc_now();
        let stamped = Utc::now().to_rfc3339();
        let parsed = parse_timestamp(&stamped).unwrap();
        assert!((parsed - now).num_seconds().abs() < 5);
    }
}
