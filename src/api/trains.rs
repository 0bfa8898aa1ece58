//! The position-query orchestrator.
//!
//! One request runs the whole pipeline: fetch the TripUpdate feed, filter
//! and normalize it to the line, solve every trip's stop state against a
//! single shared `now`, snap each result to the track polyline, and shape
//! the response. Feed trouble degrades to an empty-positions payload, never
//! to a 5xx.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::error::ApiError;
use super::{not_found, AppState, ErrorResponse};
use crate::lines::{self, LineConfig};
use crate::position::progress::{self, TrainStatus};
use crate::position::snap;
use crate::providers::odpt::realtime;

/// Feed identifier reported in the response envelope.
const SOURCE: &str = "odpt-gtfs-rt";

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainPositionsResponse {
    pub source: String,
    pub line_id: String,
    pub line_name: String,
    /// `success`, `no_data` or `error`.
    pub status: String,
    /// Request time in the service timezone.
    pub timestamp: String,
    pub total_trains: usize,
    pub positions: Vec<TrainPositionEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainPositionEntry {
    pub trip_id: String,
    pub train_number: String,
    pub direction: String,
    pub status: TrainStatus,
    /// Segment progress, 4 decimal places; absent while unknown.
    pub progress: Option<f64>,
    /// Delay seconds as published by the feed.
    pub delay: i32,
    /// Snapped coordinate; absent when the state is not mappable.
    pub location: Option<LocationInfo>,
    pub segment: SegmentInfo,
    pub times: TimesInfo,
    pub debug: DebugInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearing: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SegmentInfo {
    pub prev_seq: u32,
    pub next_seq: u32,
    pub prev_station_id: Option<String>,
    pub next_station_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimesInfo {
    pub now_ts: i64,
    pub t0_departure: Option<i64>,
    pub t1_arrival: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DebugInfo {
    pub feed_timestamp: i64,
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

fn round4(v: f64) -> f64 {
    (v * 1e4).round() / 1e4
}

fn envelope(
    line: &LineConfig,
    status: &str,
    now: DateTime<Utc>,
    tz: chrono_tz::Tz,
    positions: Vec<TrainPositionEntry>,
) -> TrainPositionsResponse {
    TrainPositionsResponse {
        source: SOURCE.to_string(),
        line_id: line.line_id.to_string(),
        line_name: line.name_ja.to_string(),
        status: status.to_string(),
        timestamp: now.with_timezone(&tz).to_rfc3339(),
        total_trains: positions.len(),
        positions,
    }
}

/// Live train positions of a line
#[utoipa::path(
    get,
    path = "/api/trains/{line_id}/positions/v4",
    params(
        ("line_id" = String, Path, description = "Short or internal line id")
    ),
    responses(
        (status = 200, description = "Positions, possibly empty with a degraded status", body = TrainPositionsResponse),
        (status = 404, description = "Unknown line", body = ErrorResponse)
    ),
    tag = "trains"
)]
pub async fn get_positions(
    State(state): State<AppState>,
    Path(line_id): Path<String>,
) -> Result<Json<TrainPositionsResponse>, ApiError> {
    let line = lines::find(&line_id).ok_or_else(|| not_found(format!("unknown line: {line_id}")))?;

    // One instant for the whole response; every trip is solved against it.
    let now = Utc::now();
    let tz = state.config.timezone;

    let feed = match realtime::fetch_feed(
        &state.http,
        &state.config.trip_update_url,
        &state.config.api_key,
        state.config.fetch_timeout,
    )
    .await
    {
        Ok(feed) => feed,
        Err(e) => {
            let status = if e.is_missing_key() { "no_data" } else { "error" };
            warn!(line_id = line.line_id, error = %e, "feed fetch failed");
            return Ok(Json(envelope(line, status, now, tz, Vec::new())));
        }
    };

    let schedules = realtime::normalize_trip_updates(&feed, line, &state.corpus, now, tz);

    // Snapshot the dwell table so no lock is held while computing.
    let dwell = state.dwell.read().await.clone();

    let mut positions: Vec<TrainPositionEntry> = Vec::with_capacity(schedules.len());
    for schedule in &schedules {
        let solved = progress::solve(schedule, now.timestamp(), &dwell);
        if solved.status == TrainStatus::Invalid {
            debug!(trip_id = %schedule.trip_id, "dropping trip with no usable interval");
            continue;
        }

        let location = snap::snap(&solved, line, &state.corpus).map(|p| LocationInfo {
            latitude: round6(p.latitude),
            longitude: round6(p.longitude),
            bearing: p.bearing.map(round6),
        });

        positions.push(TrainPositionEntry {
            trip_id: solved.trip_id,
            train_number: solved.train_number,
            direction: solved.direction,
            status: solved.status,
            progress: solved.progress.map(round4),
            delay: solved.delay_seconds,
            location,
            segment: SegmentInfo {
                prev_seq: solved.prev_sequence,
                next_seq: solved.next_sequence,
                prev_station_id: solved.prev_station_id,
                next_station_id: solved.next_station_id,
            },
            times: TimesInfo {
                now_ts: solved.now_timestamp,
                t0_departure: solved.t0_departure,
                t1_arrival: solved.t1_arrival,
            },
            debug: DebugInfo {
                feed_timestamp: solved.feed_timestamp,
            },
        });
    }

    positions.sort_by(|a, b| {
        a.direction
            .cmp(&b.direction)
            .then_with(|| a.train_number.cmp(&b.train_number))
    });

    let status = if positions.is_empty() { "no_data" } else { "success" };
    Ok(Json(envelope(line, status, now, tz, positions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util;
    use axum::http::StatusCode;

    #[test]
    fn rounding_helpers() {
        assert_eq!(round6(139.123_456_789), 139.123_457);
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round6(-0.000_000_4), -0.0);
    }

    #[tokio::test]
    async fn unknown_line_is_a_404() {
        let state = test_util::state_with(test_util::empty_corpus()).await;
        let err = get_positions(State(state), Path("tozai".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_api_key_degrades_to_no_data() {
        // The test state has no API key configured, so the fetch short-
        // circuits before any network traffic.
        let state = test_util::state_with(test_util::sample_corpus()).await;
        let body = get_positions(State(state), Path("yamanote".to_string()))
            .await
            .unwrap()
            .0;
        assert_eq!(body.status, "no_data");
        assert_eq!(body.total_trains, 0);
        assert!(body.positions.is_empty());
        assert_eq!(body.line_id, "yamanote");
        assert_eq!(body.source, SOURCE);
    }
}
