//! `railways.json` records: display names, colors and loop flags per line.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RailwayTitle {
    pub ja: Option<String>,
    pub en: Option<String>,
}

/// One railway summary row.
#[derive(Debug, Clone, Deserialize)]
pub struct Railway {
    pub id: String,
    #[serde(default)]
    pub title: RailwayTitle,
    pub color: Option<String>,
    #[serde(rename = "loop", default)]
    pub is_loop: bool,
}
