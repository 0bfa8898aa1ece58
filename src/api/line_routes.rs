//! Line listing endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{not_found, AppState, ErrorResponse};
use crate::lines::{self, LineConfig};

#[derive(Debug, Serialize, ToSchema)]
pub struct LineSummary {
    /// Short identifier used in URLs.
    pub line_id: String,
    /// Internal identifier used by the corpus files.
    pub internal_id: String,
    pub name_ja: String,
    pub name_en: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub is_loop: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineListResponse {
    pub lines: Vec<LineSummary>,
    pub total_lines: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LineListQuery {
    /// Operator prefix filter, e.g. `JR-East`.
    pub operator: Option<String>,
}

fn summarize(line: &LineConfig, state: &AppState) -> LineSummary {
    let railway = state.corpus.railway_info(line.internal_id);
    LineSummary {
        line_id: line.line_id.to_string(),
        internal_id: line.internal_id.to_string(),
        name_ja: railway
            .and_then(|r| r.title.ja.clone())
            .unwrap_or_else(|| line.name_ja.to_string()),
        name_en: railway
            .and_then(|r| r.title.en.clone())
            .unwrap_or_else(|| line.name_en.to_string()),
        color: railway.and_then(|r| r.color.clone()),
        is_loop: line.is_loop,
    }
}

/// List supported lines
#[utoipa::path(
    get,
    path = "/api/lines",
    params(
        ("operator" = Option<String>, Query, description = "Operator prefix filter, e.g. JR-East")
    ),
    responses(
        (status = 200, description = "Supported lines", body = LineListResponse)
    ),
    tag = "lines"
)]
pub async fn list_lines(
    State(state): State<AppState>,
    Query(query): Query<LineListQuery>,
) -> Json<LineListResponse> {
    let lines: Vec<LineSummary> = lines::SUPPORTED_LINES
        .iter()
        .filter(|line| match query.operator.as_deref() {
            Some(op) => {
                line.internal_id == op || line.internal_id.starts_with(&format!("{op}."))
            }
            None => true,
        })
        .map(|line| summarize(line, &state))
        .collect();

    let total_lines = lines.len();
    Json(LineListResponse { lines, total_lines })
}

/// Get one line by short or internal identifier
#[utoipa::path(
    get,
    path = "/api/lines/{line_id}",
    params(
        ("line_id" = String, Path, description = "Short id (yamanote) or internal id (JR-East.Yamanote)")
    ),
    responses(
        (status = 200, description = "Line summary", body = LineSummary),
        (status = 404, description = "Unknown line", body = ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn get_line(
    State(state): State<AppState>,
    Path(line_id): Path<String>,
) -> Result<Json<LineSummary>, super::error::ApiError> {
    let line = lines::find(&line_id).ok_or_else(|| not_found(format!("unknown line: {line_id}")))?;
    Ok(Json(summarize(line, &state)))
}
