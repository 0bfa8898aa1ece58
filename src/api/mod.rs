pub mod error;
pub mod health;
pub mod line_routes;
pub mod route_search;
pub mod shapes;
pub mod stations;
pub mod trains;

pub use error::{bad_request, internal_error, not_found, ErrorResponse};

use std::sync::Arc;

use axum::routing::{get, put};
use axum::Router;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::corpus::StaticCorpus;
use crate::db::DwellCache;

/// Shared request state: immutable corpus, the DB pool, the dwell cache and
/// the one outbound HTTP client.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub corpus: Arc<StaticCorpus>,
    pub dwell: DwellCache,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/lines", get(line_routes::list_lines))
        .route("/lines/{line_id}", get(line_routes::get_line))
        .route("/stations", get(stations::list_stations))
        .route("/stations/search", get(stations::search_stations))
        .route("/stations/{station_id}/rank", put(stations::update_station_rank))
        .route("/shapes", get(shapes::get_shape))
        .route("/trains/{line_id}/positions/v4", get(trains::get_positions))
        .route("/route/search", get(route_search::search))
        .with_state(state)
}
