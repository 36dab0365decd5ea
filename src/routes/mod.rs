use axum::Router;

use crate::{Config, SheetsClient};

mod health;
mod report;

// ---

/// Shared handler state: the spreadsheet client and the loaded configuration.
pub type AppState = (SheetsClient, Config);

pub fn router(sheets: SheetsClient, config: Config) -> Router {
    // ---
    Router::new()
        .merge(report::router())
        .merge(health::router())
        .with_state((sheets, config))
}
