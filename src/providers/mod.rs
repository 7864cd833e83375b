//! HTTP clients for the upstream data sources.
//!
//! Every client returns the raw JSON body; shaping into view models happens
//! in [`crate::normalize`].

pub mod busrouter;
pub mod community;
pub mod datamall;

use std::time::Duration;

const USER_AGENT: &str = concat!("sgbus/", env!("CARGO_PKG_VERSION"));

/// Build the shared reqwest client with request and connect timeouts
pub fn build_http_client(
    timeout: Duration,
    connect_timeout: Duration,
) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
        .map_err(ProviderError::Network)
}

/// Send a prepared request and decode the JSON body, rejecting non-success statuses
async fn fetch_json(
    request: reqwest::RequestBuilder,
    endpoint: &str,
) -> Result<serde_json::Value, ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ProviderError::Parse(format!("{}: {}", endpoint, e)))
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{endpoint} failed: {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("DataMall account key is not configured")]
    MissingAccountKey,
}
