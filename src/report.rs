//! Report builder: composes the trend analyzer, event detector and
//! data-quality assessor into a single structured report.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use crate::classify::AqiCategory;
use crate::config::AnalysisConfig;
use crate::events::{detect_pollution_events, PollutionEvent};
use crate::models::{timefmt, Metric, Series};
use crate::quality::{assess_data_quality, DataQuality};
use crate::stats;
use crate::trend::{analyze_temporal_trends, TemporalAnalysis};

// ---

/// WHO 24-hour PM2.5 guideline, µg/m³.
pub const WHO_GUIDELINE: f64 = 15.0;

/// EPA 24-hour PM2.5 standard, µg/m³.
pub const EPA_STANDARD: f64 = 35.0;

/// Latest-reading level above which an alert is `HIGH`.
pub const HIGH_ALERT_LEVEL: f64 = 55.0;

pub const MIN_COMPLETENESS: f64 = 0.9;

pub const DEFAULT_RECOMMENDATION: &str =
    "Air quality levels are within acceptable ranges. Continue monitoring.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPeriod {
    #[serde(with = "timefmt::option")]
    pub start: Option<NaiveDateTime>,
    #[serde(with = "timefmt::option")]
    pub end: Option<NaiveDateTime>,
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pm25Exposure {
    pub average: f64,
    pub max: f64,
    pub percentile_95: f64,
    pub exceedances_who_guideline: usize,
    pub exceedances_epa_standard: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualityMetrics {
    pub aqi_distribution: BTreeMap<AqiCategory, usize>,
    pub unhealthy_time_percentage: f64,
    /// `None` when no PM2.5 values exist.
    pub pm25_exposure: Option<Pm25Exposure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualityAlert {
    #[serde(with = "timefmt")]
    pub timestamp: NaiveDateTime,
    pub pm25_value: f64,
    pub alert_level: AlertLevel,
    pub message: String,
}

/// The full analysis of one series. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    #[serde(with = "timefmt")]
    pub analysis_timestamp: NaiveDateTime,
    pub data_period: DataPeriod,
    pub pm25_analysis: Option<TemporalAnalysis>,
    pub air_quality_metrics: AirQualityMetrics,
    pub pollution_events: Vec<PollutionEvent>,
    pub current_alerts: Vec<AirQualityAlert>,
    pub data_quality: DataQuality,
    pub recommendations: Vec<String>,
}

/// Build a report for `series`, stamped with `now`.
pub fn build_report(series: &Series, config: &AnalysisConfig, now: NaiveDateTime) -> Report {
    // ---
    let timestamps: Vec<NaiveDateTime> = series.readings().iter().map(|r| r.timestamp).collect();
    let data_quality = assess_data_quality(&timestamps);

    let report = Report {
        analysis_timestamp: now,
        data_period: DataPeriod {
            start: series.first().map(|r| r.timestamp),
            end: series.last().map(|r| r.timestamp),
            total_hours: data_quality.time_span_hours,
        },
        pm25_analysis: analyze_temporal_trends(series, Metric::Pm2_5),
        air_quality_metrics: air_quality_metrics(series),
        pollution_events: detect_pollution_events(series, config.event_threshold_multiplier),
        current_alerts: current_alerts(series, config.alert_threshold),
        recommendations: recommendations(series, &data_quality),
        data_quality,
    };

    info!(
        "Report built: {} readings, {} events, {} alerts",
        series.len(),
        report.pollution_events.len(),
        report.current_alerts.len()
    );
    report
}

/// Category distribution and PM2.5 exposure over readings with a PM2.5 value.
pub fn air_quality_metrics(series: &Series) -> AirQualityMetrics {
    // ---
    let with_pm: Vec<_> = series
        .readings()
        .iter()
        .filter(|r| r.pm2_5_atm.is_some())
        .collect();

    let mut aqi_distribution = BTreeMap::new();
    for r in &with_pm {
        *aqi_distribution.entry(r.aqi_category).or_insert(0) += 1;
    }

    let unhealthy = with_pm.iter().filter(|r| r.aqi_category.is_unhealthy()).count();
    let unhealthy_time_percentage = if with_pm.is_empty() {
        0.0
    } else {
        unhealthy as f64 / with_pm.len() as f64 * 100.0
    };

    let values: Vec<f64> = with_pm.iter().filter_map(|r| r.pm2_5_atm).collect();

    AirQualityMetrics {
        aqi_distribution,
        unhealthy_time_percentage,
        pm25_exposure: pm25_exposure(&values),
    }
}

fn pm25_exposure(values: &[f64]) -> Option<Pm25Exposure> {
    Some(Pm25Exposure {
        average: stats::mean(values)?,
        max: stats::max(values)?,
        percentile_95: stats::percentile(values, 95.0)?,
        exceedances_who_guideline: values.iter().filter(|&&v| v > WHO_GUIDELINE).count(),
        exceedances_epa_standard: values.iter().filter(|&&v| v > EPA_STANDARD).count(),
    })
}

/// Alert on the most recent reading if its PM2.5 exceeds `threshold`.
pub fn current_alerts(series: &Series, threshold: f64) -> Vec<AirQualityAlert> {
    // ---
    let Some(latest) = series.last() else {
        return Vec::new();
    };
    match latest.pm2_5_atm {
        Some(value) if value > threshold => vec![AirQualityAlert {
            timestamp: latest.timestamp,
            pm25_value: value,
            alert_level: if value > HIGH_ALERT_LEVEL {
                AlertLevel::High
            } else {
                AlertLevel::Moderate
            },
            message: format!(
                "PM2.5 level of {:.1} μg/m³ exceeds threshold of {:.1} μg/m³",
                value, threshold
            ),
        }],
        _ => Vec::new(),
    }
}

/// Heuristic recommendations; always at least one.
pub fn recommendations(series: &Series, quality: &DataQuality) -> Vec<String> {
    // ---
    let mut out = Vec::new();

    let values: Vec<f64> = series.points(Metric::Pm2_5).iter().map(|p| p.value).collect();
    if let Some(avg) = stats::mean(&values) {
        if avg > EPA_STANDARD {
            out.push(
                "Average PM2.5 levels exceed EPA standards. Consider air filtration systems."
                    .to_string(),
            );
        } else if avg > WHO_GUIDELINE {
            out.push(
                "PM2.5 levels above WHO guidelines. Monitor sensitive individuals.".to_string(),
            );
        }

        if stats::std_dev(&values).is_some_and(|sd| sd > avg * 0.5) {
            out.push(
                "High variability in PM2.5 levels detected. Investigate pollution sources."
                    .to_string(),
            );
        }
    }

    if quality
        .completeness_ratio
        .is_some_and(|ratio| ratio < MIN_COMPLETENESS)
    {
        out.push("Data collection completeness below 90%. Check sensor connectivity.".to_string());
    }

    if out.is_empty() {
        out.push(DEFAULT_RECOMMENDATION.to_string());
    }
    out
}
