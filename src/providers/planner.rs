//! OpenTripPlanner bridge.
//!
//! OTP 2.x only exposes GraphQL; this module sends the plan query and
//! reshapes the response into a compact itinerary list. Planner trouble is
//! reported inside the payload, never as a transport error, so the route
//! search endpoint can stay available while OTP is down.

use chrono::DateTime;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

const PLAN_QUERY: &str = r#"
query PlanRoute($fromLat: Float!, $fromLon: Float!, $toLat: Float!, $toLon: Float!, $date: String!, $time: String!, $arriveBy: Boolean!) {
  plan(
    from: {lat: $fromLat, lon: $fromLon}
    to: {lat: $toLat, lon: $toLon}
    date: $date
    time: $time
    arriveBy: $arriveBy
    numItineraries: 5
    transportModes: [{mode: WALK}, {mode: TRANSIT}]
  ) {
    itineraries {
      startTime
      endTime
      duration
      legs {
        mode
        startTime
        endTime
        duration
        distance
        route { gtfsId shortName longName }
        trip { gtfsId }
        from { name lat lon stop { gtfsId } }
        to { name lat lon stop { gtfsId } }
        intermediateStops { name lat lon gtfsId }
      }
    }
  }
}
"#;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("planner returned errors: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Itinerary {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_minutes: i64,
    pub legs: Vec<Leg>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Leg {
    pub mode: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub duration_minutes: i64,
    pub from: Place,
    pub to: Place,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intermediate_stops: Vec<IntermediateStop>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Place {
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub stop_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteRef {
    pub gtfs_id: String,
    pub short_name: String,
    pub long_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IntermediateStop {
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub gtfs_id: String,
}

/// Plan parameters; `date`/`time` are in the planner's local convention.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub arrive_by: bool,
}

/// Execute the plan query and parse the itineraries.
pub async fn search_route(
    client: &reqwest::Client,
    endpoint: &str,
    request: &PlanRequest,
) -> Result<Vec<Itinerary>, PlannerError> {
    let payload = json!({
        "query": PLAN_QUERY,
        "variables": {
            "fromLat": request.from_lat,
            "fromLon": request.from_lon,
            "toLat": request.to_lat,
            "toLon": request.to_lon,
            "date": request.date,
            "time": request.time,
            "arriveBy": request.arrive_by,
        },
    });

    let response = client
        .post(endpoint)
        .json(&payload)
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await?
        .error_for_status()?;

    let body: Value = response.json().await?;
    if let Some(errors) = body.get("errors") {
        warn!(errors = %errors, "planner returned errors");
        return Err(PlannerError::Upstream(errors.to_string()));
    }

    Ok(parse_plan_response(&body))
}

/// Extract itineraries from the raw GraphQL response.
pub fn parse_plan_response(body: &Value) -> Vec<Itinerary> {
    let itineraries = body
        .pointer("/data/plan/itineraries")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    itineraries
        .iter()
        .map(|itin| Itinerary {
            start_time: ms_to_iso(itin.get("startTime")),
            end_time: ms_to_iso(itin.get("endTime")),
            duration_minutes: itin.get("duration").and_then(Value::as_i64).unwrap_or(0) / 60,
            legs: itin
                .get("legs")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[])
                .iter()
                .map(parse_leg)
                .collect(),
        })
        .collect()
}

const TRANSIT_MODES: &[&str] = &[
    "RAIL",
    "BUS",
    "SUBWAY",
    "TRAM",
    "FERRY",
    "CABLE_CAR",
    "GONDOLA",
    "FUNICULAR",
    "TRANSIT",
];

fn parse_leg(leg: &Value) -> Leg {
    let mode = leg
        .get("mode")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let is_transit = TRANSIT_MODES.contains(&mode.as_str());

    let (route, trip_id, intermediate_stops) = if is_transit {
        let route = leg.get("route").filter(|v| !v.is_null()).map(|r| RouteRef {
            gtfs_id: str_field(r, "gtfsId"),
            short_name: str_field(r, "shortName"),
            long_name: str_field(r, "longName"),
        });
        let trip_id = leg
            .pointer("/trip/gtfsId")
            .and_then(Value::as_str)
            .map(String::from);
        let stops = leg
            .get("intermediateStops")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(|s| IntermediateStop {
                name: str_field(s, "name"),
                lat: s.get("lat").and_then(Value::as_f64),
                lon: s.get("lon").and_then(Value::as_f64),
                gtfs_id: str_field(s, "gtfsId"),
            })
            .collect();
        (route, trip_id, stops)
    } else {
        (None, None, Vec::new())
    };

    Leg {
        mode,
        start_time: ms_to_iso(leg.get("startTime")),
        end_time: ms_to_iso(leg.get("endTime")),
        duration_minutes: leg.get("duration").and_then(Value::as_i64).unwrap_or(0) / 60,
        from: parse_place(leg.get("from")),
        to: parse_place(leg.get("to")),
        route,
        trip_id,
        intermediate_stops,
    }
}

fn parse_place(place: Option<&Value>) -> Place {
    let place = place.unwrap_or(&Value::Null);
    Place {
        name: str_field(place, "name"),
        lat: place.get("lat").and_then(Value::as_f64),
        lon: place.get("lon").and_then(Value::as_f64),
        stop_id: place
            .pointer("/stop/gtfsId")
            .and_then(Value::as_str)
            .map(String::from),
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Unix milliseconds to RFC 3339.
fn ms_to_iso(ms: Option<&Value>) -> Option<String> {
    let ms = ms?.as_i64()?;
    DateTime::from_timestamp_millis(ms).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_transit_itinerary() {
        let body = json!({
            "data": {"plan": {"itineraries": [{
                "startTime": 1_737_327_600_000_i64,
                "endTime": 1_737_329_400_000_i64,
                "duration": 1800,
                "legs": [{
                    "mode": "RAIL",
                    "startTime": 1_737_327_600_000_i64,
                    "endTime": 1_737_329_400_000_i64,
                    "duration": 1800,
                    "route": {"gtfsId": "jreast:Yamanote", "shortName": "JY", "longName": "Yamanote"},
                    "trip": {"gtfsId": "jreast:4201301G"},
                    "from": {"name": "Osaki", "lat": 35.62, "lon": 139.73, "stop": {"gtfsId": "s1"}},
                    "to": {"name": "Tokyo", "lat": 35.68, "lon": 139.77, "stop": {"gtfsId": "s2"}},
                    "intermediateStops": [
                        {"name": "Gotanda", "lat": 35.63, "lon": 139.72, "gtfsId": "s3"}
                    ]
                }]
            }]}}
        });

        let itineraries = parse_plan_response(&body);
        assert_eq!(itineraries.len(), 1);
        let itin = &itineraries[0];
        assert_eq!(itin.duration_minutes, 30);
        assert_eq!(itin.legs.len(), 1);
        let leg = &itin.legs[0];
        assert_eq!(leg.mode, "RAIL");
        assert_eq!(leg.trip_id.as_deref(), Some("jreast:4201301G"));
        assert_eq!(leg.route.as_ref().unwrap().short_name, "JY");
        assert_eq!(leg.from.stop_id.as_deref(), Some("s1"));
        assert_eq!(leg.intermediate_stops.len(), 1);
    }

    #[test]
    fn walk_legs_carry_no_route_info() {
        let body = json!({
            "data": {"plan": {"itineraries": [{
                "startTime": null,
                "endTime": null,
                "duration": 600,
                "legs": [{
                    "mode": "WALK",
                    "duration": 600,
                    "route": {"gtfsId": "ignored"},
                    "from": {"name": "A"},
                    "to": {"name": "B"}
                }]
            }]}}
        });
        let itineraries = parse_plan_response(&body);
        let leg = &itineraries[0].legs[0];
        assert!(leg.route.is_none());
        assert!(leg.trip_id.is_none());
        assert!(leg.intermediate_stops.is_empty());
        assert_eq!(itineraries[0].start_time, None);
    }

    #[test]
    fn empty_or_malformed_response_yields_no_itineraries() {
        assert!(parse_plan_response(&json!({})).is_empty());
        assert!(parse_plan_response(&json!({"data": {"plan": null}})).is_empty());
    }
}
