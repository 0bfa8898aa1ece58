use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub healthy: bool,
    /// Supported lines with a loaded timetable.
    pub lines_loaded: usize,
    /// Static trains across all lines.
    pub trains_loaded: usize,
    /// Stations with validated coordinates.
    pub stations_loaded: usize,
    /// Railways with a merged polyline.
    pub polylines_loaded: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let corpus = &state.corpus;
    Json(HealthResponse {
        healthy: true,
        lines_loaded: corpus.timetables.len(),
        trains_loaded: corpus.timetables.values().map(|t| t.trains.len()).sum(),
        stations_loaded: corpus.station_positions.len(),
        polylines_loaded: corpus.polylines.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util;

    #[tokio::test]
    async fn reports_corpus_counts() {
        let state = test_util::state_with(test_util::sample_corpus()).await;
        let health = health_check(State(state)).await.0;
        assert!(health.healthy);
        assert_eq!(health.stations_loaded, 3);
        assert_eq!(health.polylines_loaded, 1);
        assert_eq!(health.lines_loaded, 0);
        assert_eq!(health.trains_loaded, 0);
    }
}
