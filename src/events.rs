//! Pollution-event detection.
//!
//! A reading is anomalous when it exceeds the centered rolling mean plus
//! `multiplier` rolling standard deviations. Anomalies no more than
//! [`GROUP_SPACING_MINUTES`] apart are chained into a group, and groups of
//! at least [`MIN_EVENT_READINGS`] become events.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::classify::{event_severity, EventSeverity};
use crate::models::{timefmt, Metric, Point, Series};
use crate::stats;

// ---

pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 2.0;

/// Fewer valid points than this yields no events.
pub const MIN_POINTS: usize = 10;

/// Upper bound on the rolling window, in samples.
pub const MAX_WINDOW: usize = 60;

pub const GROUP_SPACING_MINUTES: i64 = 30;

pub const MIN_EVENT_READINGS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutionEvent {
    pub event_id: usize,
    #[serde(with = "timefmt")]
    pub start_time: NaiveDateTime,
    #[serde(with = "timefmt")]
    pub end_time: NaiveDateTime,
    pub duration_minutes: i64,
    pub peak_pm25: f64,
    pub average_pm25: f64,
    pub severity: EventSeverity,
}

/// Rolling (mean, sample std-dev) over a centered window of `window`
/// samples. Positions where the window runs off either end are `None`.
///
/// For even windows the extra sample sits on the leading side: the window
/// for index `i` covers `i - window/2 ..= i + (window-1)/2`.
pub fn rolling_stats(values: &[f64], window: usize) -> Vec<Option<(f64, f64)>> {
    // ---
    let n = values.len();
    if window == 0 {
        return vec![None; n];
    }
    let offset = (window - 1) / 2;

    (0..n)
        .map(|i| {
            let end = i + 1 + offset;
            if end < window || end > n {
                return None;
            }
            let slice = &values[end - window..end];
            let mean = stats::mean(slice)?;
            let std = stats::std_dev(slice)?;
            Some((mean, std))
        })
        .collect()
}

/// Window size used for a series of `n` points.
pub fn window_size(n: usize) -> usize {
    MAX_WINDOW.min(n / 4)
}

/// Detect PM2.5 pollution events in `series`.
pub fn detect_pollution_events(series: &Series, multiplier: f64) -> Vec<PollutionEvent> {
    detect_events(&series.points(Metric::Pm2_5), multiplier)
}

/// Detect events over time-ordered points.
pub fn detect_events(points: &[Point], multiplier: f64) -> Vec<PollutionEvent> {
    // ---
    if points.len() < MIN_POINTS {
        debug!(
            "Skipping event detection: {} points, need {}",
            points.len(),
            MIN_POINTS
        );
        return Vec::new();
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let window = window_size(points.len());
    let rolling = rolling_stats(&values, window);

    let anomalies: Vec<&Point> = points
        .iter()
        .zip(&rolling)
        .filter_map(|(p, stat)| match stat {
            Some((mean, std)) if p.value > mean + multiplier * std => Some(p),
            _ => None,
        })
        .collect();

    let events: Vec<PollutionEvent> = group_anomalies(&anomalies)
        .into_iter()
        .filter(|g| g.len() >= MIN_EVENT_READINGS)
        .enumerate()
        .map(|(i, group)| summarize(i + 1, &group))
        .collect();

    debug!(
        "Event detection: window {}, {} anomalies, {} events",
        window,
        anomalies.len(),
        events.len()
    );
    events
}

/// Chain anomalies whose gap to the previous member is within the spacing.
fn group_anomalies<'a>(anomalies: &[&'a Point]) -> Vec<Vec<&'a Point>> {
    // ---
    let spacing = Duration::minutes(GROUP_SPACING_MINUTES);
    let mut groups: Vec<Vec<&Point>> = Vec::new();

    for &p in anomalies {
        match groups.last_mut() {
            Some(current)
                if current
                    .last()
                    .is_some_and(|last| p.timestamp - last.timestamp <= spacing) =>
            {
                current.push(p);
            }
            _ => groups.push(vec![p]),
        }
    }
    groups
}

fn summarize(event_id: usize, group: &[&Point]) -> PollutionEvent {
    // ---
    let values: Vec<f64> = group.iter().map(|p| p.value).collect();
    let start_time = group.iter().map(|p| p.timestamp).min().unwrap_or_default();
    let end_time = group.iter().map(|p| p.timestamp).max().unwrap_or_default();
    let peak = stats::max(&values).unwrap_or_default();

    PollutionEvent {
        event_id,
        start_time,
        end_time,
        duration_minutes: (end_time - start_time).num_seconds() / 60,
        peak_pm25: peak,
        average_pm25: stats::mean(&values).unwrap_or_default(),
        severity: event_severity(peak),
    }
}
