pub mod arrivals;
pub mod board;
pub mod error;
pub mod favourites;
pub mod profile;
pub mod route_info;
pub mod stops;

pub use error::{ErrorResponse, bad_request, conflict, internal_error, not_found, upstream_error};

use std::sync::Arc;

use chrono::Utc;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::board::Board;
use crate::config::CacheConfig;
use crate::favourites::FavouritesStore;
use crate::gateway::Gateway;
use crate::greeting::Profile;
use crate::models::ArrivalsView;
use crate::providers::ProviderError;
use crate::stops::StopIndex;

const MAX_SERVICE_LEN: usize = 8;

/// Service numbers are forwarded as given ("43e" stays lower case); they are
/// short alphanumerics and end up inside an OData filter
pub(crate) fn is_service_param(service: &str) -> bool {
    !service.is_empty()
        && service.len() <= MAX_SERVICE_LEN
        && service.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "sgbus",
        description = "Live bus arrivals, route info, stop search and favourites"
    ),
    tags(
        (name = "arrivals", description = "Live arrivals at a stop"),
        (name = "routes", description = "Stops along a bus service"),
        (name = "stops", description = "Stop index and search"),
        (name = "favourites", description = "Saved stops"),
        (name = "board", description = "Current view"),
        (name = "profile", description = "Greeting name")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub stop_index: Arc<StopIndex>,
    pub favourites: FavouritesStore,
    pub profile: Profile,
    pub board: Arc<Board>,
    pub cache: CacheConfig,
}

impl AppState {
    /// Fetch and normalize arrivals, naming the stop from the index when known
    pub async fn load_arrivals(
        &self,
        stop_code: &str,
        service: Option<&str>,
    ) -> Result<ArrivalsView, ProviderError> {
        let mut view = self.gateway.arrivals(stop_code, service, Utc::now()).await?;
        let index = self.stop_index.load().await;
        view.prefer_stop_name(index.name_of(&view.stop_code));
        Ok(view)
    }
}

pub fn router(state: AppState) -> OpenApiRouter {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(arrivals::get_arrivals))
        .routes(routes!(route_info::get_route_info))
        .routes(routes!(stops::search_stops))
        .routes(routes!(stops::get_stop))
        .routes(routes!(stops::refresh_stops))
        .routes(routes!(favourites::list_favourites))
        .routes(routes!(favourites::add_favourite, favourites::remove_favourite))
        .routes(routes!(profile::get_profile, profile::update_profile))
        .routes(routes!(board::get_board, board::show_board))
        .routes(routes!(board::refresh_board))
        .routes(routes!(board::refresh_all_board))
        .routes(routes!(board::init_board))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, Request, StatusCode, header};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Json;
    use chrono::FixedOffset;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::board::RETRY_MESSAGE;
    use crate::config::{ArrivalsSource, UpstreamConfig};
    use crate::stops::STOPS_CACHE_KEY;
    use crate::stops::tests::{index_with, record};
    use crate::store::KvStore;

    async fn test_state() -> AppState {
        // No account key, so DataMall calls fail without touching the network
        state_with(UpstreamConfig::default()).await
    }

    async fn state_with(upstream: UpstreamConfig) -> AppState {
        let store = KvStore::in_memory().await.unwrap();
        store
            .set_json(
                STOPS_CACHE_KEY,
                &vec![record("83139", "Opp Blk 101"), record("01012", "Hotel Grand Pacific")],
            )
            .await
            .unwrap();

        AppState {
            gateway: Gateway::new(reqwest::Client::new(), &upstream),
            stop_index: Arc::new(index_with(store.clone(), Duration::from_secs(60)).await),
            favourites: FavouritesStore::new(store.clone()),
            profile: Profile::new(store, FixedOffset::east_opt(8 * 3600).unwrap()),
            board: Arc::new(Board::new()),
            cache: CacheConfig::default(),
        }
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, value) = send_with_headers(state, method, uri, body).await;
        (status, value)
    }

    async fn send_with_headers(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let (app, _) = router(state.clone()).split_for_parts();
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, value)
    }

    type SeenQueries = Arc<Mutex<Vec<String>>>;

    /// Local stand-in for DataMall. Service "99" fails its direction 2 lookup;
    /// service "43e" has one stop in direction 1.
    async fn mock_datamall() -> (UpstreamConfig, SeenQueries) {
        let seen = SeenQueries::default();
        let app = axum::Router::new()
            .route("/v3/BusArrival", get(mock_bus_arrival))
            .route("/BusServices", get(mock_bus_services))
            .route("/BusRoutes", get(mock_bus_routes))
            .route("/community", get(mock_community_arrivals))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let upstream = UpstreamConfig {
            datamall_url: format!("http://{}", addr),
            account_key: Some("test-key".to_string()),
            community_arrivals_url: format!("http://{}/community", addr),
            ..UpstreamConfig::default()
        };
        (upstream, seen)
    }

    async fn mock_bus_arrival(
        State(seen): State<SeenQueries>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let service = query.get("ServiceNo").cloned();
        seen.lock()
            .unwrap()
            .push(format!("ServiceNo={}", service.as_deref().unwrap_or("")));

        Json(json!({
            "BusStopCode": query.get("BusStopCode"),
            "Services": [{
                "ServiceNo": service.unwrap_or_else(|| "15".to_string()),
                "Operator": "SBS",
                "NextBus": {"EstimatedArrival": "", "Load": "SEA", "Feature": "WAB", "Type": "DD"}
            }]
        }))
    }

    async fn mock_community_arrivals(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        Json(json!({
            "stop_name": format!("Stop {}", query.get("id").map_or("", String::as_str)),
            "services": [{"no": "15", "operator": "GAS", "next": {"duration_ms": 60000, "load": "SDA"}}]
        }))
    }

    async fn mock_bus_services(
        State(seen): State<SeenQueries>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let filter = query.get("$filter").cloned().unwrap_or_default();
        seen.lock().unwrap().push(filter);
        Json(json!({ "value": [{"ServiceNo": "43e", "Operator": "SBS", "Direction": 1}] }))
    }

    async fn mock_bus_routes(
        State(seen): State<SeenQueries>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Response {
        let filter = query.get("$filter").cloned().unwrap_or_default();
        seen.lock().unwrap().push(filter.clone());

        if filter == "ServiceNo eq '99' and Direction eq 2" {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        let rows = if filter == "ServiceNo eq '43e' and Direction eq 1" {
            json!([{
                "ServiceNo": "43e",
                "Direction": 1,
                "StopSequence": 1,
                "BusStopCode": "83139",
                "Distance": 0
            }])
        } else {
            json!([])
        };
        Json(json!({ "value": rows })).into_response()
    }

    #[tokio::test]
    async fn test_arrivals_requires_stop() {
        let state = test_state().await;

        let (status, body) = send(&state, "GET", "/api/arrivals", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing ?stop=BUS_STOP_CODE");

        let (status, _) = send(&state, "GET", "/api/arrivals?stop=8313", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, "GET", "/api/arrivals?stop=83139&service=15%27", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_arrivals_upstream_failure_is_bad_gateway() {
        let state = test_state().await;
        let (status, body) = send(&state, "GET", "/api/arrivals?stop=83139", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Upstream fetch failed");
        assert!(body["detail"].as_str().unwrap().contains("account key"));
    }

    #[tokio::test]
    async fn test_route_info_validation() {
        let state = test_state().await;

        let (status, body) = send(&state, "GET", "/api/route-info", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing ?service=15");

        let (status, _) = send(&state, "GET", "/api/route-info?service=15'%20or%20'1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stop_lookup_and_search() {
        let state = test_state().await;

        let (status, body) = send(&state, "GET", "/api/stops/83139", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Opp Blk 101");

        let (status, _) = send(&state, "GET", "/api/stops/99999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, "GET", "/api/stops/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&state, "GET", "/api/stops/search?q=hotel", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stops"].as_array().unwrap().len(), 1);
        assert_eq!(body["stops"][0]["code"], "01012");
        assert_eq!(body["index_status"], "ready");
    }

    #[tokio::test]
    async fn test_favourites_round_trip() {
        let state = test_state().await;

        let (status, body) = send(&state, "POST", "/api/favourites/83139", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["favourites"][0], json!({ "code": "83139", "name": "Opp Blk 101" }));

        let (status, _) = send(&state, "POST", "/api/favourites/83139", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&state, "GET", "/api/favourites", None).await;
        assert_eq!(body["count"], 1);

        let (status, _) = send(&state, "POST", "/api/favourites/12", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&state, "DELETE", "/api/favourites/83139", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_profile_update() {
        let state = test_state().await;

        let (status, body) = send(&state, "PUT", "/api/profile", Some(json!({ "name": "  Ana " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ana");
        assert!(body["greeting"].as_str().unwrap().ends_with(", Ana!"));

        let (_, body) = send(&state, "GET", "/api/profile", None).await;
        assert_eq!(body["name"], "Ana");
    }

    #[tokio::test]
    async fn test_board_flow() {
        let state = test_state().await;

        let (status, body) = send(&state, "GET", "/api/board", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["stopCode"].is_null());

        let (status, _) = send(&state, "POST", "/api/board/refresh", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&state, "POST", "/api/board", Some(json!({ "query": "nowhere at all" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Resolved by name; the arrivals fetch fails so the retry message is shown
        let (status, body) = send(&state, "POST", "/api/board", Some(json!({ "query": "grand pacific" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stopCode"], "01012");
        assert_eq!(body["error"], RETRY_MESSAGE);

        let (status, body) = send(&state, "POST", "/api/board/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fragment"], "01012");
    }

    #[tokio::test]
    async fn test_board_init_from_fragment() {
        let state = test_state().await;

        let (status, body) = send(&state, "GET", "/api/board/init?fragment=%2383139,15", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stopCode"], "83139");
        assert_eq!(body["serviceFilter"], "15");
        assert_eq!(body["fragment"], "83139,15");
    }

    #[tokio::test]
    async fn test_arrivals_success_sets_cache_header() {
        let (upstream, seen) = mock_datamall().await;
        let state = state_with(upstream).await;

        let (status, headers, body) =
            send_with_headers(&state, "GET", "/api/arrivals?stop=83139&service=43e", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "public, s-maxage=8, stale-while-revalidate=20"
        );
        assert_eq!(body["busStopCode"], "83139");
        assert_eq!(body["stopName"], "Opp Blk 101");
        assert_eq!(body["services"][0]["serviceNo"], "43e");
        assert_eq!(body["services"][0]["estimates"][0]["load"], "SEA");

        // The service is forwarded as given
        assert_eq!(*seen.lock().unwrap(), ["ServiceNo=43e"]);
    }

    #[tokio::test]
    async fn test_route_info_keeps_service_case() {
        let (upstream, seen) = mock_datamall().await;
        let state = state_with(upstream).await;

        let (status, headers, body) =
            send_with_headers(&state, "GET", "/api/route-info?service=43e", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "public, s-maxage=300, stale-while-revalidate=3600"
        );
        assert_eq!(body["serviceNo"], "43e");
        assert_eq!(body["operators"], json!(["SBS"]));
        assert_eq!(body["route1"][0]["stopCode"], "83139");
        assert_eq!(body["terminals"]["dir1"]["first"], "83139");
        assert_eq!(body["route2"], json!([]));
        assert!(body["terminals"]["dir2"]["first"].is_null());

        assert!(seen
            .lock()
            .unwrap()
            .iter()
            .all(|filter| filter.starts_with("ServiceNo eq '43e'")));
    }

    #[tokio::test]
    async fn test_route_info_fails_whole_when_one_direction_fails() {
        let (upstream, _) = mock_datamall().await;
        let state = state_with(upstream).await;

        let (status, headers, body) =
            send_with_headers(&state, "GET", "/api/route-info?service=99", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(headers.get(header::CACHE_CONTROL).is_none());
        assert_eq!(body["error"], "Upstream fetch failed");
        assert!(body["detail"].as_str().unwrap().contains("500"));
        assert!(body.get("route1").is_none());
    }

    #[tokio::test]
    async fn test_community_arrivals_source() {
        let (upstream, seen) = mock_datamall().await;
        let state = state_with(UpstreamConfig {
            arrivals_source: ArrivalsSource::Community,
            ..upstream
        })
        .await;

        let (status, body) = send(&state, "GET", "/api/arrivals?stop=01012", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["busStopCode"], "01012");
        assert_eq!(body["stopName"], "Hotel Grand Pacific");
        assert_eq!(body["services"][0]["serviceNo"], "15");
        assert_eq!(body["services"][0]["estimates"][0]["etaMillis"], 60000);
        assert!(seen.lock().unwrap().is_empty());
    }
}
