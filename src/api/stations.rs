//! Station listing, search and dwell-rank management.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use super::error::ApiError;
use super::{bad_request, internal_error, not_found, AppState, ErrorResponse};
use crate::db::{self, StationRank};
use crate::lines;
use crate::position::progress::DEFAULT_DWELL_SECONDS;

#[derive(Debug, Serialize, ToSchema)]
pub struct StationInfo {
    pub id: String,
    /// Internal line id.
    pub line_id: String,
    pub name_ja: Option<String>,
    pub name_en: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    /// Dwell rank when one is assigned.
    pub rank: Option<String>,
    pub dwell_seconds: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationListResponse {
    pub line_id: String,
    pub stations: Vec<StationInfo>,
    pub total_stations: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StationListQuery {
    pub line_id: Option<String>,
}

/// Stations of a line with coordinates and dwell metadata
#[utoipa::path(
    get,
    path = "/api/stations",
    params(
        ("lineId" = String, Query, description = "Short or internal line id")
    ),
    responses(
        (status = 200, description = "Stations of the line", body = StationListResponse),
        (status = 400, description = "Missing lineId", body = ErrorResponse),
        (status = 404, description = "Unknown line", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn list_stations(
    State(state): State<AppState>,
    Query(query): Query<StationListQuery>,
) -> Result<Json<StationListResponse>, ApiError> {
    let line_id = query
        .line_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("lineId query parameter is required"))?;
    let line = lines::find(&line_id).ok_or_else(|| not_found(format!("unknown line: {line_id}")))?;

    let ranks = db::load_ranks(&state.pool)
        .await
        .map_err(|e| internal_error(format!("database error: {e}")))?;
    let rank_by_station: std::collections::HashMap<&str, (&str, i64)> = ranks
        .iter()
        .map(|r| (r.station_id.as_str(), (r.rank.as_str(), r.dwell_seconds)))
        .collect();

    let stations: Vec<StationInfo> = state
        .corpus
        .line_stations(line)
        .iter()
        .map(|s| {
            let (rank, dwell_seconds) = match rank_by_station.get(s.id.as_str()) {
                Some(&(rank, dwell)) => (Some(rank.to_string()), dwell),
                None => (None, DEFAULT_DWELL_SECONDS),
            };
            StationInfo {
                id: s.id.clone(),
                line_id: s.line_id.clone(),
                name_ja: s.name_ja.clone(),
                name_en: s.name_en.clone(),
                lon: s.lon,
                lat: s.lat,
                rank,
                dwell_seconds,
            }
        })
        .collect();

    let total_stations = stations.len();
    Ok(Json(StationListResponse {
        line_id: line.line_id.to_string(),
        stations,
        total_stations,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StationSearchQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationSearchResponse {
    pub query: String,
    pub stations: Vec<StationInfo>,
}

const SEARCH_LIMIT_DEFAULT: usize = 20;
const SEARCH_LIMIT_MAX: usize = 100;

/// Search stations by name
///
/// Case-insensitive substring match across Japanese and Latin names, exact
/// matches first.
#[utoipa::path(
    get,
    path = "/api/stations/search",
    params(
        ("q" = String, Query, description = "Substring to match"),
        ("limit" = Option<usize>, Query, description = "Maximum results (default 20, max 100)")
    ),
    responses(
        (status = 200, description = "Matching stations", body = StationSearchResponse),
        (status = 400, description = "Empty query", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn search_stations(
    State(state): State<AppState>,
    Query(query): Query<StationSearchQuery>,
) -> Result<Json<StationSearchResponse>, ApiError> {
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("q query parameter is required"))?
        .to_lowercase();
    let limit = query
        .limit
        .unwrap_or(SEARCH_LIMIT_DEFAULT)
        .min(SEARCH_LIMIT_MAX);

    // (exact, station) pairs so exact name matches sort to the front.
    let mut matches: Vec<(bool, StationInfo)> = Vec::new();
    for stations in state.corpus.stations_by_line.values() {
        for s in stations {
            let names = [s.name_ja.as_deref(), s.name_en.as_deref()];
            let mut exact = false;
            let mut hit = false;
            for name in names.into_iter().flatten() {
                let lower = name.to_lowercase();
                if lower == needle {
                    exact = true;
                    hit = true;
                } else if lower.contains(&needle) {
                    hit = true;
                }
            }
            if hit {
                matches.push((
                    exact,
                    StationInfo {
                        id: s.id.clone(),
                        line_id: s.line_id.clone(),
                        name_ja: s.name_ja.clone(),
                        name_en: s.name_en.clone(),
                        lon: s.lon,
                        lat: s.lat,
                        rank: None,
                        dwell_seconds: DEFAULT_DWELL_SECONDS,
                    },
                ));
            }
        }
    }

    matches.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
    let stations: Vec<StationInfo> = matches.into_iter().take(limit).map(|(_, s)| s).collect();

    Ok(Json(StationSearchResponse {
        query: needle,
        stations,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RankUpdateRequest {
    /// `S`, `A` or `B`.
    pub rank: String,
    /// Dwell seconds, must be non-negative. Defaults to the rank's
    /// conventional dwell (S=50, A=35, B=20).
    pub dwell_time: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RankUpdateResponse {
    pub station_id: String,
    pub rank: String,
    pub dwell_seconds: i64,
}

/// Upsert a station's dwell rank
#[utoipa::path(
    put,
    path = "/api/stations/{station_id}/rank",
    params(
        ("station_id" = String, Path, description = "Station id")
    ),
    request_body = RankUpdateRequest,
    responses(
        (status = 200, description = "Updated rank", body = RankUpdateResponse),
        (status = 400, description = "Invalid rank or negative dwell", body = ErrorResponse),
        (status = 404, description = "Unknown station", body = ErrorResponse)
    ),
    tag = "stations"
)]
pub async fn update_station_rank(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Json(request): Json<RankUpdateRequest>,
) -> Result<Json<RankUpdateResponse>, ApiError> {
    let rank = StationRank::parse(&request.rank)
        .ok_or_else(|| bad_request(format!("invalid rank: {} (expected S, A or B)", request.rank)))?;
    let dwell_time = request
        .dwell_time
        .unwrap_or_else(|| rank.default_dwell_seconds());
    if dwell_time < 0 {
        return Err(bad_request("dwell_time must be non-negative"));
    }

    let exists = db::station_exists(&state.pool, &station_id)
        .await
        .map_err(|e| internal_error(format!("database error: {e}")))?;
    if !exists {
        return Err(not_found(format!("unknown station: {station_id}")));
    }

    db::upsert_station_rank(&state.pool, &state.dwell, &station_id, rank, dwell_time)
        .await
        .map_err(|e| internal_error(format!("database error: {e}")))?;

    info!(
        station_id = %station_id,
        rank = rank.as_str(),
        dwell_seconds = dwell_time,
        "updated station rank"
    );

    Ok(Json(RankUpdateResponse {
        station_id,
        rank: rank.as_str().to_string(),
        dwell_seconds: dwell_time,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn listing_requires_a_known_line() {
        let state = test_util::state_with(test_util::sample_corpus()).await;

        let err = list_stations(State(state.clone()), Query(StationListQuery { line_id: None }))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = list_stations(
            State(state),
            Query(StationListQuery {
                line_id: Some("tozai".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listing_carries_dwell_metadata() {
        let state = test_util::state_with(test_util::sample_corpus()).await;
        test_util::insert_station(&state, "JR-East.Yamanote.Osaki", "JR-East.Yamanote").await;
        db::upsert_station_rank(
            &state.pool,
            &state.dwell,
            "JR-East.Yamanote.Osaki",
            StationRank::A,
            35,
        )
        .await
        .unwrap();

        let list = list_stations(
            State(state),
            Query(StationListQuery {
                line_id: Some("yamanote".to_string()),
            }),
        )
        .await
        .unwrap()
        .0;

        assert_eq!(list.total_stations, 3);
        let osaki = list
            .stations
            .iter()
            .find(|s| s.id == "JR-East.Yamanote.Osaki")
            .unwrap();
        assert_eq!(osaki.rank.as_deref(), Some("A"));
        assert_eq!(osaki.dwell_seconds, 35);
        let gotanda = list
            .stations
            .iter()
            .find(|s| s.id == "JR-East.Yamanote.Gotanda")
            .unwrap();
        assert_eq!(gotanda.rank, None);
        assert_eq!(gotanda.dwell_seconds, DEFAULT_DWELL_SECONDS);
    }

    #[tokio::test]
    async fn search_ranks_exact_matches_first() {
        let state = test_util::state_with(test_util::sample_corpus()).await;

        let err = search_stations(
            State(state.clone()),
            Query(StationSearchQuery {
                q: Some("  ".to_string()),
                limit: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        // "gotanda" matches exactly (case-insensitive).
        let result = search_stations(
            State(state.clone()),
            Query(StationSearchQuery {
                q: Some("GOTANDA".to_string()),
                limit: None,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(result.stations.len(), 1);
        assert_eq!(result.stations[0].id, "JR-East.Yamanote.Gotanda");

        // Substring match across all stations, bounded by limit.
        let result = search_stations(
            State(state),
            Query(StationSearchQuery {
                q: Some("o".to_string()),
                limit: Some(2),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(result.stations.len(), 2);
    }

    #[tokio::test]
    async fn rank_upsert_validates_and_persists() {
        let state = test_util::state_with(test_util::sample_corpus()).await;
        test_util::insert_station(&state, "JR-East.Yamanote.Osaki", "JR-East.Yamanote").await;

        let err = update_station_rank(
            State(state.clone()),
            Path("JR-East.Yamanote.Osaki".to_string()),
            Json(RankUpdateRequest {
                rank: "X".to_string(),
                dwell_time: Some(30),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = update_station_rank(
            State(state.clone()),
            Path("JR-East.Yamanote.Osaki".to_string()),
            Json(RankUpdateRequest {
                rank: "B".to_string(),
                dwell_time: Some(-1),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = update_station_rank(
            State(state.clone()),
            Path("ghost".to_string()),
            Json(RankUpdateRequest {
                rank: "B".to_string(),
                dwell_time: Some(20),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        // Omitted dwell falls back to the rank default; the cache sees it.
        let updated = update_station_rank(
            State(state.clone()),
            Path("JR-East.Yamanote.Osaki".to_string()),
            Json(RankUpdateRequest {
                rank: "S".to_string(),
                dwell_time: None,
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(updated.rank, "S");
        assert_eq!(updated.dwell_seconds, 50);
        assert_eq!(
            state.dwell.read().await.get("JR-East.Yamanote.Osaki"),
            Some(&50)
        );
    }
}
