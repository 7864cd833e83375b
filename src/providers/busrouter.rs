/// Bulk stop dataset published by BusRouter SG
///
/// The dataset is a JSON array of fixed-position tuples
/// `[code, name, lat, lng]`. It changes rarely and is fetched once, then
/// persisted by the stop index.
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ProviderError, fetch_json};
use crate::models::{StopRecord, is_stop_code};
use crate::normalize::fields;

#[derive(Debug, Clone)]
pub struct StopsDatasetClient {
    client: reqwest::Client,
    url: String,
}

impl StopsDatasetClient {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    pub async fn fetch_stops(&self) -> Result<Vec<StopRecord>, ProviderError> {
        debug!(url = %self.url, "Fetching bulk stop dataset");

        let data = fetch_json(self.client.get(&self.url), "stops dataset").await?;
        let stops = parse_stop_rows(&data)?;

        info!(count = stops.len(), "Retrieved bulk stop dataset");

        Ok(stops)
    }
}

/// Decode `[code, name, lat, lng]` rows, skipping rows without a valid code
pub fn parse_stop_rows(data: &Value) -> Result<Vec<StopRecord>, ProviderError> {
    let rows = data
        .as_array()
        .ok_or_else(|| ProviderError::Parse("stops dataset is not an array".to_string()))?;

    let mut stops = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in rows {
        let Some(cols) = row.as_array() else {
            skipped += 1;
            continue;
        };

        let code = match cols.first().and_then(fields::as_text) {
            Some(code) if is_stop_code(&code) => code,
            _ => {
                skipped += 1;
                continue;
            }
        };

        stops.push(StopRecord {
            code,
            name: cols.get(1).and_then(fields::as_text).unwrap_or_default(),
            lat: cols.get(2).and_then(fields::as_coordinate),
            lng: cols.get(3).and_then(fields::as_coordinate),
        });
    }

    if skipped > 0 {
        warn!(skipped, "Skipped malformed rows in stop dataset");
    }

    Ok(stops)
}
