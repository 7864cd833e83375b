/// Community arrivals API (arrivelah, BusRouter SG)
///
/// `GET {base}?id={stop_code}` returns `{ services: [...] }` where each service
/// carries `no`, `operator` and the slots `next`, `subsequent`/`next2`,
/// `next3`. Older deployments use `service_no`, `next_bus`,
/// `subsequent_bus` and `subsequent_bus2` instead. Each slot has an absolute
/// `time` and a relative `duration_ms`.
///
/// The API takes no key and does not filter by service.
use serde_json::Value;
use tracing::{debug, info};

use super::{ProviderError, fetch_json};

#[derive(Debug, Clone)]
pub struct CommunityClient {
    client: reqwest::Client,
    base_url: String,
}

impl CommunityClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    pub async fn arrivals(&self, stop_code: &str) -> Result<Value, ProviderError> {
        let url = format!("{}?id={}", self.base_url, urlencoding::encode(stop_code));
        debug!(url = %url, stop = %stop_code, "Fetching community arrivals");

        let request = self
            .client
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store");
        let data = fetch_json(request, "arrivelah").await?;

        let services = data.get("services").and_then(Value::as_array).map_or(0, Vec::len);
        info!(
            stop = %stop_code,
            services,
            "Retrieved community arrivals"
        );

        Ok(data)
    }
}
