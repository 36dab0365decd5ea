//! Data models for the air-quality analysis pipeline.
//!
//! A [`Reading`] is one typed row of the sensor sheet; a [`Series`] is the
//! ordered, de-duplicated sequence of readings every analysis runs over.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::classify::AqiCategory;

// ---

/// Display format for every timestamp leaving the service.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Numeric columns a sensor row may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "pm1_0")]
    Pm1_0,
    #[serde(rename = "pm2_5_atm")]
    Pm2_5,
    #[serde(rename = "pm10_atm")]
    Pm10,
    #[serde(rename = "pm2_5_aqi")]
    Pm2_5Aqi,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "humidity")]
    Humidity,
    #[serde(rename = "dewpoint")]
    Dewpoint,
    #[serde(rename = "pressure")]
    Pressure,
}

impl Metric {
    // ---
    pub const ALL: [Metric; 8] = [
        Metric::Pm1_0,
        Metric::Pm2_5,
        Metric::Pm10,
        Metric::Pm2_5Aqi,
        Metric::Temperature,
        Metric::Humidity,
        Metric::Dewpoint,
        Metric::Pressure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Pm1_0 => "pm1_0",
            Metric::Pm2_5 => "pm2_5_atm",
            Metric::Pm10 => "pm10_atm",
            Metric::Pm2_5Aqi => "pm2_5_aqi",
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::Dewpoint => "dewpoint",
            Metric::Pressure => "pressure",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// One normalized sensor reading.
///
/// Calendar features and the AQI category are derived during normalization
/// and never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    #[serde(with = "timefmt")]
    pub timestamp: NaiveDateTime,
    pub pm1_0: Option<f64>,
    pub pm2_5_atm: Option<f64>,
    pub pm10_atm: Option<f64>,
    pub pm2_5_aqi: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub dewpoint: Option<f64>,
    pub pressure: Option<f64>,
    pub hour: u32,
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub aqi_category: AqiCategory,
    pub aqi_color: Option<String>,
}

impl Reading {
    // ---
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Pm1_0 => self.pm1_0,
            Metric::Pm2_5 => self.pm2_5_atm,
            Metric::Pm10 => self.pm10_atm,
            Metric::Pm2_5Aqi => self.pm2_5_aqi,
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Dewpoint => self.dewpoint,
            Metric::Pressure => self.pressure,
        }
    }

    pub fn set_value(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::Pm1_0 => &mut self.pm1_0,
            Metric::Pm2_5 => &mut self.pm2_5_atm,
            Metric::Pm10 => &mut self.pm10_atm,
            Metric::Pm2_5Aqi => &mut self.pm2_5_aqi,
            Metric::Temperature => &mut self.temperature,
            Metric::Humidity => &mut self.humidity,
            Metric::Dewpoint => &mut self.dewpoint,
            Metric::Pressure => &mut self.pressure,
        };
        *slot = value;
    }
}

/// A timestamped value of one metric, nulls already removed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Readings ordered by timestamp, no duplicate timestamps.
///
/// Only the normalizer builds a `Series`, so the ordering invariant holds
/// for every value of this type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    readings: Vec<Reading>,
}

impl Series {
    // ---
    pub(crate) fn from_sorted(readings: Vec<Reading>) -> Self {
        Series { readings }
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn into_readings(self) -> Vec<Reading> {
        self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn first(&self) -> Option<&Reading> {
        self.readings.first()
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Non-null values of `metric`, in timestamp order.
    pub fn points(&self, metric: Metric) -> Vec<Point> {
        self.readings
            .iter()
            .filter_map(|r| {
                r.value(metric).map(|value| Point {
                    timestamp: r.timestamp,
                    value,
                })
            })
            .collect()
    }
}

/// Serde adapter rendering instants as `YYYY-MM-DD HH:MM:SS`.
pub mod timefmt {
    use chrono::NaiveDateTime;
    use serde::Serializer;

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::Serializer;

        use super::TIMESTAMP_FORMAT;

        pub fn serialize<S: Serializer>(
            ts: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => s.collect_str(&ts.format(TIMESTAMP_FORMAT)),
                None => s.serialize_none(),
            }
        }
    }

    pub mod vec {
        use chrono::NaiveDateTime;
        use serde::ser::SerializeSeq;
        use serde::Serializer;

        use super::TIMESTAMP_FORMAT;

        pub fn serialize<S: Serializer>(ts: &[NaiveDateTime], s: S) -> Result<S::Ok, S::Error> {
            let mut seq = s.serialize_seq(Some(ts.len()))?;
            for t in ts {
                seq.serialize_element(&t.format(TIMESTAMP_FORMAT).to_string())?;
            }
            seq.end()
        }
    }
}
