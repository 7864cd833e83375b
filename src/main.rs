mod api;
mod board;
mod config;
mod favourites;
mod gateway;
mod greeting;
mod models;
mod normalize;
mod providers;
mod query;
mod sequence;
mod stops;
mod store;

use axum::http::{HeaderValue, Method, header};
use chrono::FixedOffset;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_swagger_ui::SwaggerUi;

use api::AppState;
use board::Board;
use config::Config;
use favourites::FavouritesStore;
use gateway::Gateway;
use greeting::Profile;
use providers::busrouter::StopsDatasetClient;
use stops::StopIndex;
use store::KvStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sgbus=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("SGBUS_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;
    info!(
        config = %config_path,
        bind = %config.bind,
        arrivals_source = config.upstream.arrivals_source.as_str(),
        "Starting sgbus server"
    );
    if config.upstream.account_key.is_none() {
        warn!("No DataMall account key configured; DataMall requests will fail");
    }

    std::fs::create_dir_all("data")?;
    let store = KvStore::connect(&config.database_url).await?;

    let client = providers::build_http_client(
        config.upstream.timeout(),
        config.upstream.connect_timeout(),
    )?;
    let gateway = Gateway::new(client.clone(), &config.upstream);
    let stop_index = Arc::new(StopIndex::new(
        store.clone(),
        StopsDatasetClient::new(client, &config.upstream.stops_dataset_url),
        Duration::from_secs(config.stop_index_retry_secs),
    ));

    let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600)
        .ok_or("utc_offset_hours out of range")?;

    let state = AppState {
        gateway,
        stop_index: stop_index.clone(),
        favourites: FavouritesStore::new(store.clone()),
        profile: Profile::new(store, offset),
        board: Arc::new(Board::new()),
        cache: config.cache,
    };

    // Warm the stop index in the background so the first search is fast
    tokio::spawn(async move {
        let index = stop_index.load().await;
        if index.is_empty() {
            warn!("Stop index unavailable after warm-up; stop search is disabled until it loads");
        } else {
            info!(stops = index.len(), "Stop index warm-up finished");
        }
    });

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = if config.cors_permissive {
        warn!("CORS is permissive; allowing any origin");
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    };

    // Build router
    let (app, openapi) = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .split_for_parts();
    let app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi));

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(address = %config.bind, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
