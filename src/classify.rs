//! Pollutant severity classification.
//!
//! Two banding functions live here and are kept apart on purpose:
//! [`aqi_category`] grades an ambient concentration against configured
//! AQI thresholds, [`event_severity`] grades the peak of a pollution event
//! against its own fixed bands.

use std::fmt;

use anyhow::{anyhow, Result};
use serde::Serialize;

// ---

/// Ambient air-quality category for a PM2.5 concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitive,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl AqiCategory {
    // ---
    /// The six graded categories, mildest first.
    pub const GRADED: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitive,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    /// Position in [`AqiCategory::GRADED`]; `None` for `Unknown`.
    pub fn rank(&self) -> Option<usize> {
        AqiCategory::GRADED.iter().position(|c| c == self)
    }

    /// True for "Unhealthy for Sensitive Groups" and anything worse.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self.rank(), Some(r) if r >= 2)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
            AqiCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity of a detected pollution event, graded by its peak value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EventSeverity {
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive")]
    UnhealthyForSensitive,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

/// Upper bounds (inclusive) of the AQI bands, ascending.
///
/// The sixth value closes the Hazardous band for display only; anything
/// above the fifth bound is Hazardous.
#[derive(Debug, Clone, PartialEq)]
pub struct AqiThresholds([f64; 6]);

impl AqiThresholds {
    // ---
    pub fn new(bounds: [f64; 6]) -> Result<Self> {
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(anyhow!("AQI thresholds must be finite: {:?}", bounds));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(anyhow!("AQI thresholds must be strictly ascending: {:?}", bounds));
        }
        Ok(AqiThresholds(bounds))
    }

    pub fn bounds(&self) -> &[f64; 6] {
        &self.0
    }
}

impl Default for AqiThresholds {
    fn default() -> Self {
        AqiThresholds([12.0, 35.4, 55.4, 150.4, 250.4, 500.4])
    }
}

/// Display colours, one per graded category in [`AqiCategory::GRADED`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct AqiPalette([String; 6]);

impl AqiPalette {
    // ---
    pub fn new(colors: [String; 6]) -> Result<Self> {
        if let Some(blank) = colors.iter().position(|c| c.trim().is_empty()) {
            return Err(anyhow!("AQI colour #{} is empty", blank + 1));
        }
        Ok(AqiPalette(colors))
    }

    pub fn colors(&self) -> &[String; 6] {
        &self.0
    }
}

impl Default for AqiPalette {
    fn default() -> Self {
        AqiPalette([
            "#28A745".to_string(),
            "#FFC107".to_string(),
            "#FF8C00".to_string(),
            "#DC3545".to_string(),
            "#8B0000".to_string(),
            "#7B0F7B".to_string(),
        ])
    }
}

/// Grade an ambient concentration. Missing and NaN values are `Unknown`.
pub fn aqi_category(value: Option<f64>, thresholds: &AqiThresholds) -> AqiCategory {
    // ---
    let v = match value {
        Some(v) if !v.is_nan() => v,
        _ => return AqiCategory::Unknown,
    };

    let b = thresholds.bounds();
    if v <= b[0] {
        AqiCategory::Good
    } else if v <= b[1] {
        AqiCategory::Moderate
    } else if v <= b[2] {
        AqiCategory::UnhealthyForSensitive
    } else if v <= b[3] {
        AqiCategory::Unhealthy
    } else if v <= b[4] {
        AqiCategory::VeryUnhealthy
    } else {
        AqiCategory::Hazardous
    }
}

/// Colour for a category; `Unknown` has none.
pub fn category_color(category: AqiCategory, palette: &AqiPalette) -> Option<&str> {
    category.rank().map(|r| palette.colors()[r].as_str())
}

/// Grade the peak of a pollution event.
pub fn event_severity(peak: f64) -> EventSeverity {
    // ---
    if peak <= 35.0 {
        EventSeverity::Moderate
    } else if peak <= 55.0 {
        EventSeverity::UnhealthyForSensitive
    } else if peak <= 150.0 {
        EventSeverity::Unhealthy
    } else if peak <= 250.0 {
        EventSeverity::VeryUnhealthy
    } else {
        EventSeverity::Hazardous
    }
}
