/// LTA DataMall client
///
/// ## Endpoints used
/// - `v3/BusArrival?BusStopCode={code}&ServiceNo={svc}` - live arrivals at a stop,
///   up to three `NextBus*` slots per service
/// - `BusServices?$filter=ServiceNo eq '{svc}'` - service to operator mapping
/// - `BusRoutes?$filter=ServiceNo eq '{svc}' and Direction eq {d}&$orderby=StopSequence asc&$top=500`
///   - one row per stop along a direction
///
/// Every request carries the `AccountKey` header. DataMall pages at 500 rows,
/// which covers the longest route in the network.
use serde_json::Value;
use tracing::{debug, info};

use super::{ProviderError, fetch_json};
use crate::models::Direction;

const ROUTE_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone)]
pub struct DatamallClient {
    client: reqwest::Client,
    base_url: String,
    account_key: Option<String>,
}

impl DatamallClient {
    pub fn new(client: reqwest::Client, base_url: &str, account_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_key,
        }
    }

    /// Live arrivals for a stop, optionally restricted to one service
    pub async fn bus_arrival(
        &self,
        stop_code: &str,
        service_no: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let mut query = vec![("BusStopCode", stop_code.to_string())];
        if let Some(service) = service_no {
            query.push(("ServiceNo", service.to_string()));
        }

        let data = self.get("v3/BusArrival", &query).await?;

        let services = data.get("Services").and_then(Value::as_array).map_or(0, Vec::len);
        info!(
            stop = %stop_code,
            services,
            "Retrieved bus arrivals"
        );

        Ok(data)
    }

    /// Service metadata rows (one per operator/direction) for a service number
    pub async fn bus_services(&self, service_no: &str) -> Result<Value, ProviderError> {
        let query = vec![("$filter", format!("ServiceNo eq '{}'", odata_quote(service_no)))];
        self.get("BusServices", &query).await
    }

    /// Ordered stop rows for one direction of a service
    pub async fn bus_routes(
        &self,
        service_no: &str,
        direction: Direction,
    ) -> Result<Value, ProviderError> {
        let query = vec![
            (
                "$filter",
                format!(
                    "ServiceNo eq '{}' and Direction eq {}",
                    odata_quote(service_no),
                    direction.number()
                ),
            ),
            ("$orderby", "StopSequence asc".to_string()),
            ("$top", ROUTE_PAGE_SIZE.to_string()),
        ];
        let data = self.get("BusRoutes", &query).await?;

        let rows = data.get("value").and_then(Value::as_array).map_or(0, Vec::len);
        debug!(
            service = %service_no,
            direction = direction.number(),
            rows,
            "Retrieved bus route rows"
        );

        Ok(data)
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let account_key = self
            .account_key
            .as_deref()
            .ok_or(ProviderError::MissingAccountKey)?;

        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, ?query, "Requesting DataMall");

        let request = self
            .client
            .get(&url)
            .query(query)
            .header("AccountKey", account_key)
            .header(reqwest::header::ACCEPT, "application/json");

        fetch_json(request, path).await
    }
}

/// Escape a value for use inside a single-quoted OData literal
fn odata_quote(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odata_quote() {
        assert_eq!(odata_quote("15"), "15");
        assert_eq!(odata_quote("1'5"), "1''5");
    }

    #[tokio::test]
    async fn test_missing_account_key_fails_before_network() {
        let client = DatamallClient::new(reqwest::Client::new(), "http://127.0.0.1:9/", None);
        let err = client.bus_arrival("83139", None).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingAccountKey));
    }
}
