//! Temporal analysis of a single metric: linear trend, hour-of-day and
//! day-of-week patterns, peaks/valleys/anomalies and data quality.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{timefmt, Metric, Point, Series};
use crate::quality::{assess_data_quality, DataQuality};
use crate::stats;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Least-squares trend of a metric against time in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    /// Units of the metric per second.
    pub slope: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub trend_direction: TrendDirection,
    /// |r|
    pub trend_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub median: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Aggregate of the values falling into one hour or weekday bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStats {
    pub mean: f64,
    pub median: f64,
    pub std: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPattern {
    /// Keyed by hour of day, only hours with data.
    pub hourly_averages: BTreeMap<u32, BucketStats>,
    pub peak_hour: u32,
    pub peak_value: f64,
    pub low_hour: u32,
    pub low_value: f64,
    /// Sample std-dev of the hourly means.
    pub hour_variation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPattern {
    /// Keyed by day of week, Monday = 0.
    pub daily_averages: BTreeMap<u32, BucketStats>,
    pub weekend_average: Option<f64>,
    pub weekday_average: Option<f64>,
    pub weekend_vs_weekday_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakAnalysis {
    pub num_peaks: usize,
    pub num_valleys: usize,
    pub highest_peak: Option<f64>,
    pub lowest_valley: Option<f64>,
    pub anomaly_threshold: f64,
    pub num_anomalies: usize,
    #[serde(with = "timefmt::vec")]
    pub anomaly_timestamps: Vec<NaiveDateTime>,
}

/// Everything the analyzer derives for one (series, metric) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalAnalysis {
    pub metric: Metric,
    pub statistics: SummaryStats,
    pub trend: TrendResult,
    pub hourly_patterns: HourlyPattern,
    pub daily_patterns: DailyPattern,
    pub peaks: PeakAnalysis,
    pub data_quality: DataQuality,
}

/// Analyze `metric` over `series`, ignoring readings where it is missing.
///
/// Returns `None` when fewer than two valid points exist.
pub fn analyze_temporal_trends(series: &Series, metric: Metric) -> Option<TemporalAnalysis> {
    // ---
    let points = series.points(metric);
    if points.len() < 2 {
        warn!(
            "Insufficient data for trend analysis of {}: {} valid points",
            metric,
            points.len()
        );
        return None;
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let timestamps: Vec<NaiveDateTime> = points.iter().map(|p| p.timestamp).collect();

    let statistics = summary_stats(&values)?;
    let trend = fit_trend(&points)?;
    let hourly_patterns = hourly_pattern(&points)?;
    let daily_patterns = daily_pattern(&points);
    let peaks = detect_peaks(&points)?;

    debug!(
        "Trend for {}: {:?} (slope {:.3e}, r² {:.3})",
        metric, trend.trend_direction, trend.slope, trend.r_squared
    );

    Some(TemporalAnalysis {
        metric,
        statistics,
        trend,
        hourly_patterns,
        daily_patterns,
        peaks,
        data_quality: assess_data_quality(&timestamps),
    })
}

fn summary_stats(values: &[f64]) -> Option<SummaryStats> {
    Some(SummaryStats {
        mean: stats::mean(values)?,
        median: stats::median(values)?,
        std: stats::std_dev(values),
        min: stats::min(values)?,
        max: stats::max(values)?,
        count: values.len(),
    })
}

fn epoch_seconds(ts: &NaiveDateTime) -> f64 {
    ts.and_utc().timestamp_millis() as f64 / 1000.0
}

/// OLS fit of value against epoch seconds.
pub fn fit_trend(points: &[Point]) -> Option<TrendResult> {
    // ---
    let x: Vec<f64> = points.iter().map(|p| epoch_seconds(&p.timestamp)).collect();
    let y: Vec<f64> = points.iter().map(|p| p.value).collect();
    let fit = stats::linear_regression(&x, &y)?;

    let trend_direction = if fit.slope > 0.0 {
        TrendDirection::Increasing
    } else if fit.slope < 0.0 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    Some(TrendResult {
        slope: fit.slope,
        r_squared: fit.r * fit.r,
        p_value: fit.p_value,
        trend_direction,
        trend_strength: fit.r.abs(),
    })
}

fn bucket_stats(values: &[f64]) -> Option<BucketStats> {
    Some(BucketStats {
        mean: stats::mean(values)?,
        median: stats::median(values)?,
        std: stats::std_dev(values),
        count: values.len(),
    })
}

fn group_by<F>(points: &[Point], key: F) -> BTreeMap<u32, BucketStats>
where
    F: Fn(&NaiveDateTime) -> u32,
{
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for p in points {
        groups.entry(key(&p.timestamp)).or_default().push(p.value);
    }
    groups
        .into_iter()
        .filter_map(|(k, v)| bucket_stats(&v).map(|s| (k, s)))
        .collect()
}

/// Per-hour aggregates plus the busiest and quietest hour.
pub fn hourly_pattern(points: &[Point]) -> Option<HourlyPattern> {
    // ---
    let hourly_averages = group_by(points, |ts| ts.hour());

    let mut peak: Option<(u32, f64)> = None;
    let mut low: Option<(u32, f64)> = None;
    for (&hour, s) in &hourly_averages {
        if peak.map_or(true, |(_, v)| s.mean > v) {
            peak = Some((hour, s.mean));
        }
        if low.map_or(true, |(_, v)| s.mean < v) {
            low = Some((hour, s.mean));
        }
    }
    let (peak_hour, peak_value) = peak?;
    let (low_hour, low_value) = low?;

    let means: Vec<f64> = hourly_averages.values().map(|s| s.mean).collect();

    Some(HourlyPattern {
        hour_variation: stats::std_dev(&means),
        hourly_averages,
        peak_hour,
        peak_value,
        low_hour,
        low_value,
    })
}

/// Per-weekday aggregates and the weekend/weekday comparison.
pub fn daily_pattern(points: &[Point]) -> DailyPattern {
    // ---
    let dow = |ts: &NaiveDateTime| ts.weekday().num_days_from_monday();
    let daily_averages = group_by(points, dow);

    let (weekend, weekday): (Vec<f64>, Vec<f64>) = {
        let (we, wd): (Vec<&Point>, Vec<&Point>) =
            points.iter().partition(|p| dow(&p.timestamp) >= 5);
        (
            we.iter().map(|p| p.value).collect(),
            wd.iter().map(|p| p.value).collect(),
        )
    };

    let weekend_average = stats::mean(&weekend);
    let weekday_average = stats::mean(&weekday);

    DailyPattern {
        daily_averages,
        weekend_average,
        weekday_average,
        weekend_vs_weekday_ratio: weekend_ratio(weekend_average, weekday_average),
    }
}

/// weekend / weekday, undefined when either side is missing or weekday is zero.
pub fn weekend_ratio(weekend: Option<f64>, weekday: Option<f64>) -> Option<f64> {
    match (weekend, weekday) {
        (Some(we), Some(wd)) if wd != 0.0 => Some(we / wd),
        _ => None,
    }
}

/// Local peaks above the 75th percentile, local valleys below the 25th,
/// and points above mean + 2σ (population σ).
pub fn detect_peaks(points: &[Point]) -> Option<PeakAnalysis> {
    // ---
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let p75 = stats::percentile(&values, 75.0)?;
    let p25 = stats::percentile(&values, 25.0)?;

    let mut peaks = Vec::new();
    let mut valleys = Vec::new();
    for w in values.windows(3) {
        let (l, c, r) = (w[0], w[1], w[2]);
        if c > l && c > r && c >= p75 {
            peaks.push(c);
        }
        if c < l && c < r && c <= p25 {
            valleys.push(c);
        }
    }

    let anomaly_threshold = stats::mean(&values)? + 2.0 * stats::population_std_dev(&values)?;
    let anomaly_timestamps: Vec<NaiveDateTime> = points
        .iter()
        .filter(|p| p.value > anomaly_threshold)
        .map(|p| p.timestamp)
        .collect();

    Some(PeakAnalysis {
        num_peaks: peaks.len(),
        num_valleys: valleys.len(),
        highest_peak: stats::max(&peaks),
        lowest_valley: stats::min(&valleys),
        anomaly_threshold,
        num_anomalies: anomaly_timestamps.len(),
        anomaly_timestamps,
    })
}
