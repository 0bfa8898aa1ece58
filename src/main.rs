mod api;
mod config;
mod corpus;
mod db;
mod lines;
mod position;
mod providers;
mod service_day;

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api::AppState;
use config::Config;

#[derive(OpenApi)]
#[openapi(
    info(title = "Live Train Position API", version = "0.4.0"),
    paths(
        api::health::health_check,
        api::line_routes::list_lines,
        api::line_routes::get_line,
        api::stations::list_stations,
        api::stations::search_stations,
        api::stations::update_station_rank,
        api::shapes::get_shape,
        api::trains::get_positions,
        api::route_search::search,
    ),
    components(schemas(
        api::ErrorResponse,
        api::health::HealthResponse,
        api::line_routes::LineSummary,
        api::line_routes::LineListResponse,
        api::stations::StationInfo,
        api::stations::StationListResponse,
        api::stations::StationSearchResponse,
        api::stations::RankUpdateRequest,
        api::stations::RankUpdateResponse,
        api::trains::TrainPositionsResponse,
        api::trains::TrainPositionEntry,
        api::trains::LocationInfo,
        api::trains::SegmentInfo,
        api::trains::TimesInfo,
        api::trains::DebugInfo,
        api::route_search::RouteSearchResponse,
        crate::position::TrainStatus,
        crate::providers::planner::Itinerary,
        crate::providers::planner::Leg,
        crate::providers::planner::Place,
        crate::providers::planner::RouteRef,
        crate::providers::planner::IntermediateStop,
    )),
    tags(
        (name = "health", description = "Service health check"),
        (name = "lines", description = "Line registry"),
        (name = "stations", description = "Stations and dwell ranks"),
        (name = "shapes", description = "Track geometry"),
        (name = "trains", description = "Live train positions"),
        (name = "route", description = "Journey planner bridge")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into()),
        )
        .init();

    let config = Arc::new(Config::from_env());
    tracing::info!(
        lines = lines::SUPPORTED_LINES.len(),
        data_dir = %config.data_dir.display(),
        "loaded configuration"
    );

    let cors_layer = {
        tracing::info!(origins = ?config.cors_origins, "CORS: restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::PUT,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };

    // Database
    let pool = SqlitePool::connect(&config.database_url)
        .await
        .expect("Failed to connect to SQLite database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // First run: seed the stations table from the corpus file.
    let station_count = db::count_stations(&pool)
        .await
        .expect("Failed to query stations");
    if station_count == 0 {
        let stations_path = config.data_dir.join("stations.json");
        match std::fs::read_to_string(&stations_path) {
            Ok(content) => {
                let rows: Vec<corpus::model::RawStationRow> =
                    serde_json::from_str(&content).expect("Failed to parse stations.json");
                let inserted = db::seed_stations(&pool, &rows)
                    .await
                    .expect("Failed to seed stations");
                tracing::info!(inserted, "seeded stations from corpus file");
            }
            Err(e) => {
                tracing::warn!(path = %stations_path.display(), error = %e, "stations table is empty and stations.json is unreadable");
            }
        }
    }

    // Static corpus: stations from the store, files from the data directory.
    // A load failure here is fatal by design.
    let stations = db::load_stations(&pool)
        .await
        .expect("Failed to load stations");
    let corpus = Arc::new(
        corpus::StaticCorpus::load(&config.data_dir, stations)
            .expect("Failed to load static corpus"),
    );

    let dwell_map = db::load_dwell_map(&pool)
        .await
        .expect("Failed to load dwell ranks");
    tracing::info!(ranks = dwell_map.len(), "loaded dwell cache");
    let dwell: db::DwellCache = Arc::new(tokio::sync::RwLock::new(dwell_map));

    // One pooled client for every outbound call.
    let http = reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .build()
        .expect("Failed to build HTTP client");

    let state = AppState {
        pool: pool.clone(),
        corpus,
        dwell,
        http,
        config: config.clone(),
    };

    let app = Router::new()
        .nest("/api", api::router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {e}", config.bind_addr));
    tracing::info!(addr = %config.bind_addr, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Let in-flight requests drain before dropping the pool.
    pool.close().await;
    tracing::info!("shut down cleanly");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
