//! Merged polyline as GeoJSON.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use super::error::ApiError;
use super::{bad_request, not_found, AppState, ErrorResponse};
use crate::lines;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShapeQuery {
    pub line_id: Option<String>,
}

/// Merged track polyline of a line as a GeoJSON FeatureCollection
#[utoipa::path(
    get,
    path = "/api/shapes",
    params(
        ("lineId" = String, Query, description = "Short or internal line id")
    ),
    responses(
        (status = 200, description = "FeatureCollection with one LineString"),
        (status = 400, description = "Missing lineId", body = ErrorResponse),
        (status = 404, description = "Unknown line or no shape", body = ErrorResponse)
    ),
    tag = "shapes"
)]
pub async fn get_shape(
    State(state): State<AppState>,
    Query(query): Query<ShapeQuery>,
) -> Result<Json<Value>, ApiError> {
    let line_id = query
        .line_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("lineId query parameter is required"))?;
    let line = lines::find(&line_id).ok_or_else(|| not_found(format!("unknown line: {line_id}")))?;

    let polyline = state
        .corpus
        .line_polyline(line)
        .ok_or_else(|| not_found(format!("no shape for line: {line_id}")))?;

    let coordinates: Vec<[f64; 2]> = polyline.iter().map(|&(lon, lat)| [lon, lat]).collect();

    Ok(Json(json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {
                "lineId": line.line_id,
                "internalId": line.internal_id,
                "name": line.name_ja,
            },
            "geometry": {
                "type": "LineString",
                "coordinates": coordinates,
            },
        }],
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn requires_line_id_and_a_merged_polyline() {
        let state = test_util::state_with(test_util::empty_corpus()).await;

        let err = get_shape(State(state.clone()), Query(ShapeQuery { line_id: None }))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = get_shape(
            State(state.clone()),
            Query(ShapeQuery {
                line_id: Some("tozai".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        // Known line, but no polyline was merged for it.
        let err = get_shape(
            State(state),
            Query(ShapeQuery {
                line_id: Some("yamanote".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn emits_a_single_linestring_feature() {
        let state = test_util::state_with(test_util::sample_corpus()).await;
        let body = get_shape(
            State(state),
            Query(ShapeQuery {
                line_id: Some("JR-East.Yamanote".to_string()),
            }),
        )
        .await
        .unwrap()
        .0;

        assert_eq!(body["type"], "FeatureCollection");
        let features = body["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["geometry"]["type"], "LineString");
        let coords = features[0]["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[0][0], 139.70);
        assert_eq!(features[0]["properties"]["lineId"], "yamanote");
    }
}
