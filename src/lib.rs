//! Air-quality sensor analysis.
//!
//! Turns a spreadsheet of periodic air-quality readings into a structured
//! report: linear trend, hour/day patterns, peaks and anomalies, pollution
//! events, exposure metrics, data quality and recommendations.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! module owns one stage, and this file is the gateway that re-exports what
//! the binary and the routes need.
//!
//! - `ingest`   – raw rows → typed, ordered [`Series`]
//! - `classify` – AQI category / event severity banding
//! - `trend`    – per-metric temporal analysis
//! - `events`   – rolling-statistics pollution events
//! - `quality`  – completeness and gap detection
//! - `report`   – composes the above into a [`Report`]
//! - `sheets`   – Google Sheets fetch client
//! - `routes`   – axum HTTP surface

pub mod classify;
pub mod config;
pub mod events;
pub mod ingest;
pub mod models;
pub mod quality;
pub mod report;
pub mod routes;
pub mod sheets;
pub mod stats;
pub mod trend;

pub use config::{AnalysisConfig, Config};
pub use ingest::{normalize, FieldMapping, IngestError, RawTable};
pub use models::{Metric, Reading, Series};
pub use report::{build_report, Report};
pub use sheets::SheetsClient;
