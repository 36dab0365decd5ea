//! Google Sheets values client.
//!
//! Fetches one A1 range from the Sheets v4 `values` endpoint and hands it
//! to the normalizer as a [`RawTable`].

use anyhow::{anyhow, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::ingest::RawTable;

// ---

/// Body shape of the Sheets `values.get` response, also accepted by
/// `POST /analyze`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    // ---
    /// Flatten every cell to text. Trailing empty cells the API omits are
    /// restored so each row is at least as wide as the header.
    pub fn into_grid(self) -> Vec<Vec<String>> {
        let width = self.values.first().map_or(0, Vec::len);
        self.values
            .into_iter()
            .map(|row| {
                let mut cells: Vec<String> = row.into_iter().map(cell_to_string).collect();
                if cells.len() < width {
                    cells.resize(width, String::new());
                }
                cells
            })
            .collect()
    }
}

fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    api_key: String,
}

impl SheetsClient {
    // ---
    pub fn new(config: &Config) -> Self {
        SheetsClient {
            http: Client::new(),
            base_url: config.sheets_base_url.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.sheet_range.clone(),
            api_key: config.sheets_api_key.clone(),
        }
    }

    fn values_url(&self) -> Result<Url> {
        // ---
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| anyhow!("Invalid sheets base URL '{}': {}", self.base_url, e))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets base URL '{}' cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                self.range.as_str(),
            ]);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// Fetch the configured range as a raw table.
    pub async fn fetch_table(&self) -> Result<RawTable> {
        // ---
        let url = self.values_url()?;
        tracing::debug!(
            "Fetching sheet range '{}' from spreadsheet {}",
            self.range,
            self.spreadsheet_id
        );

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Sheets API returned HTTP {}", status));
        }
        let body: ValueRange = response.json().await?;

        if body.values.is_empty() {
            tracing::warn!("No data found in spreadsheet range '{}'", self.range);
        }

        let table = RawTable::from_grid(body.into_grid())?;
        tracing::info!("Successfully fetched {} rows of data", table.rows.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::config::AnalysisConfig;

    fn config(base: &str) -> Config {
        Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            spreadsheet_id: "sheet123".to_string(),
            sheet_range: "PurpleAir002_AJLC Building!A:Z".to_string(),
            sheets_api_key: "secret".to_string(),
            sheets_base_url: base.to_string(),
            lookback_hours: 24,
            analysis: AnalysisConfig::default(),
        }
    }

    #[test]
    fn test_values_url_encodes_range() {
        // ---
        let client = SheetsClient::new(&config("https://sheets.googleapis.com"));
        let url = client.values_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet123/values/PurpleAir002_AJLC%20Building!A:Z?key=secret"
        );
    }

    #[test]
    fn test_values_url_with_base_path() {
        // ---
        let client = SheetsClient::new(&config("http://localhost:9000/mock/"));
        let url = client.values_url().unwrap();
        assert!(url
            .as_str()
            .starts_with("http://localhost:9000/mock/v4/spreadsheets/sheet123/values/"));
    }

    #[test]
    fn test_grid_pads_short_rows_and_stringifies_cells() {
        // ---
        let body: ValueRange = serde_json::from_value(serde_json::json!({
            "range": "Sheet1!A1:C3",
            "majorDimension": "ROWS",
            "values": [
                ["TimeStamp", "PM2.5", "Temp"],
                ["2024-05-01 00:00:00", 12.5],
                [null, "x", true]
            ]
        }))
        .unwrap();
        let grid = body.into_grid();
        assert_eq!(grid[1], vec!["2024-05-01 00:00:00", "12.5", ""]);
        assert_eq!(grid[2], vec!["", "x", "true"]);
    }

    #[test]
    fn test_missing_values_field_is_empty() {
        // ---
        let body: ValueRange = serde_json::from_str(r#"{"range": "Sheet1!A:Z"}"#).unwrap();
        assert!(body.into_grid().is_empty());
    }
}
