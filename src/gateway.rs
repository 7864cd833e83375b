//! Upstream fetch + normalization for the two proxied views.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{ArrivalsSource, UpstreamConfig};
use crate::models::{ArrivalsView, Direction, ServiceRouteView};
use crate::normalize;
use crate::providers::community::CommunityClient;
use crate::providers::datamall::DatamallClient;
use crate::providers::ProviderError;

#[derive(Debug, Clone)]
pub struct Gateway {
    datamall: DatamallClient,
    community: CommunityClient,
    source: ArrivalsSource,
}

impl Gateway {
    pub fn new(client: reqwest::Client, config: &UpstreamConfig) -> Self {
        Self {
            datamall: DatamallClient::new(
                client.clone(),
                &config.datamall_url,
                config.account_key.clone(),
            ),
            community: CommunityClient::new(client, &config.community_arrivals_url),
            source: config.arrivals_source,
        }
    }

    /// Live arrivals for a stop, normalized against `now`
    pub async fn arrivals(
        &self,
        stop_code: &str,
        service: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ArrivalsView, ProviderError> {
        let raw = match self.source {
            ArrivalsSource::Datamall => self.datamall.bus_arrival(stop_code, service).await?,
            ArrivalsSource::Community => self.community.arrivals(stop_code).await?,
        };

        let mut view = normalize::arrivals::normalize(&raw, stop_code, now);
        if let Some(service) = service {
            view.retain_service(service);
        }
        Ok(view)
    }

    /// Service metadata and both directions, fetched concurrently. Any failed
    /// fetch fails the whole view.
    pub async fn route_info(&self, service_no: &str) -> Result<ServiceRouteView, ProviderError> {
        let (services, dir1, dir2) = futures::future::try_join3(
            self.datamall.bus_services(service_no),
            self.datamall.bus_routes(service_no, Direction::Outbound),
            self.datamall.bus_routes(service_no, Direction::Inbound),
        )
        .await?;

        let view = normalize::route::assemble(service_no, &services, &dir1, &dir2);

        info!(
            service = %service_no,
            operators = view.operators.len(),
            dir1_stops = view.route1.len(),
            dir2_stops = view.route2.len(),
            "Assembled route info"
        );

        Ok(view)
    }
}
