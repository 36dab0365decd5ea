//! Data-quality assessment: completeness against a one-reading-per-minute
//! cadence and gaps in collection.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::timefmt;

// ---

/// Intervals longer than this count as a collection gap.
pub const GAP_THRESHOLD_MINUTES: i64 = 5;

/// A stretch with no readings between two consecutive records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataGap {
    #[serde(with = "timefmt")]
    pub start: NaiveDateTime,
    #[serde(with = "timefmt")]
    pub end: NaiveDateTime,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_records: usize,
    /// Whole minutes between first and last record; `None` below two records.
    pub expected_records: Option<i64>,
    /// `total_records / expected_records`; `None` when nothing is expected.
    pub completeness_ratio: Option<f64>,
    pub time_span_hours: f64,
    pub missing_data_gaps: Vec<DataGap>,
}

/// Assess timestamps that are already in ascending order.
pub fn assess_data_quality(timestamps: &[NaiveDateTime]) -> DataQuality {
    // ---
    let total_records = timestamps.len();

    let span = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) if total_records > 1 => Some(*last - *first),
        _ => None,
    };

    let expected_records = span.map(|s| s.num_seconds() / 60);
    let completeness_ratio = expected_records
        .filter(|&e| e > 0)
        .map(|e| total_records as f64 / e as f64);
    let time_span_hours = span.map_or(0.0, |s| s.num_seconds() as f64 / 3600.0);

    DataQuality {
        total_records,
        expected_records,
        completeness_ratio,
        time_span_hours,
        missing_data_gaps: find_gaps(timestamps),
    }
}

/// Consecutive intervals longer than [`GAP_THRESHOLD_MINUTES`].
pub fn find_gaps(timestamps: &[NaiveDateTime]) -> Vec<DataGap> {
    // ---
    timestamps
        .windows(2)
        .filter_map(|w| {
            let delta = w[1] - w[0];
            (delta > chrono::Duration::minutes(GAP_THRESHOLD_MINUTES)).then(|| DataGap {
                start: w[0],
                end: w[1],
                duration_minutes: delta.num_seconds() / 60,
            })
        })
        .collect()
}
