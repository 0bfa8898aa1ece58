//! Journey-planner bridge.
//!
//! Thin pass-through to the OpenTripPlanner GraphQL endpoint. Planner
//! trouble is reported inside the payload so map clients keep working while
//! OTP is down.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use super::error::ApiError;
use super::{bad_request, AppState, ErrorResponse};
use crate::providers::planner::{self, Itinerary, PlanRequest};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RouteSearchQuery {
    pub from_lat: Option<f64>,
    pub from_lon: Option<f64>,
    pub to_lat: Option<f64>,
    pub to_lon: Option<f64>,
    /// `YYYY-MM-DD`; defaults to today in the service timezone.
    pub date: Option<String>,
    /// `HH:MM`; defaults to the current time in the service timezone.
    pub time: Option<String>,
    pub arrive_by: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteSearchResponse {
    pub itineraries: Vec<Itinerary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Search a door-to-door route via the journey planner
#[utoipa::path(
    get,
    path = "/api/route/search",
    params(
        ("from_lat" = f64, Query, description = "Origin latitude"),
        ("from_lon" = f64, Query, description = "Origin longitude"),
        ("to_lat" = f64, Query, description = "Destination latitude"),
        ("to_lon" = f64, Query, description = "Destination longitude"),
        ("date" = Option<String>, Query, description = "YYYY-MM-DD, default today"),
        ("time" = Option<String>, Query, description = "HH:MM, default now"),
        ("arrive_by" = Option<bool>, Query, description = "Treat time as arrival deadline")
    ),
    responses(
        (status = 200, description = "Itineraries; empty with an error note when the planner is down", body = RouteSearchResponse),
        (status = 400, description = "Missing coordinates", body = ErrorResponse)
    ),
    tag = "route"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<RouteSearchQuery>,
) -> Result<Json<RouteSearchResponse>, ApiError> {
    let (Some(from_lat), Some(from_lon), Some(to_lat), Some(to_lon)) =
        (query.from_lat, query.from_lon, query.to_lat, query.to_lon)
    else {
        return Err(bad_request(
            "from_lat, from_lon, to_lat and to_lon are required",
        ));
    };

    let local_now = Utc::now().with_timezone(&state.config.timezone);
    let request = PlanRequest {
        from_lat,
        from_lon,
        to_lat,
        to_lon,
        date: query
            .date
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| local_now.format("%Y-%m-%d").to_string()),
        time: query
            .time
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| local_now.format("%H:%M").to_string()),
        arrive_by: query.arrive_by.unwrap_or(false),
    };

    match planner::search_route(&state.http, &state.config.otp_endpoint, &request).await {
        Ok(itineraries) => Ok(Json(RouteSearchResponse {
            itineraries,
            error: None,
        })),
        Err(e) => {
            warn!(error = %e, "route search failed");
            Ok(Json(RouteSearchResponse {
                itineraries: Vec::new(),
                error: Some(e.to_string()),
            }))
        }
    }
}
