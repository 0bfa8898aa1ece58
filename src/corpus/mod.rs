//! The static corpus: timetables, railway summaries, merged polylines and
//! the station indices derived from them.
//!
//! Everything here is loaded once at startup and shared immutably behind an
//! `Arc` for the life of the process. A load failure of a required file is
//! fatal; individual bad records are dropped with a warning.

pub mod model;
pub mod polyline;
pub mod railways;
pub mod timetable;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::lines::{self, LineConfig};
use self::polyline::Coord;
use self::railways::Railway;
use self::timetable::LineTimetable;

/// Geographic sanity bounds: stations must fall inside Japan.
const LON_RANGE: std::ops::RangeInclusive<f64> = 122.0..=154.0;
const LAT_RANGE: std::ops::RangeInclusive<f64> = 20.0..=46.0;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid time string {0:?}")]
    InvalidTime(String),
}

/// A station row from the persistent store, as the corpus consumes it.
#[derive(Debug, Clone)]
pub struct StationRecord {
    pub id: String,
    /// Internal line id, e.g. `JR-East.Yamanote`.
    pub line_id: String,
    pub name_ja: Option<String>,
    pub name_en: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

/// The immutable startup state.
#[derive(Debug)]
pub struct StaticCorpus {
    /// Railway summaries from `railways.json`.
    pub railways: Vec<Railway>,
    /// Per-line timetables keyed by the short line id.
    pub timetables: HashMap<String, LineTimetable>,
    /// Merged polylines keyed by internal railway id.
    pub polylines: HashMap<String, Vec<Coord>>,
    /// Validated station coordinates.
    pub station_positions: HashMap<String, Coord>,
    /// Station id -> nearest vertex index in its line's merged polyline.
    pub station_vertex: HashMap<String, usize>,
    /// Stations per internal line id, in persisted order.
    pub stations_by_line: HashMap<String, Vec<StationRecord>>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CorpusError> {
    let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CorpusError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl StaticCorpus {
    /// Load every static input under `data_dir` and build the indices.
    ///
    /// `stations` comes from the persistent store. Required files are
    /// `railways.json` and `coordinates.json`; a line whose timetable file
    /// is absent stays usable without static data.
    pub fn load(data_dir: &Path, stations: Vec<StationRecord>) -> Result<Self, CorpusError> {
        let railways: Vec<Railway> = read_json(&data_dir.join("railways.json"))?;
        info!(railways = railways.len(), "loaded railway summaries");

        let raw_coords: polyline::RawCoordinates = read_json(&data_dir.join("coordinates.json"))?;

        let loop_by_file: HashMap<&str, bool> =
            railways.iter().map(|r| (r.id.as_str(), r.is_loop)).collect();
        let polylines = polyline::merge_railways(&raw_coords, |id| {
            lines::find(id)
                .map(|l| l.is_loop)
                .or_else(|| loop_by_file.get(id).copied())
                .unwrap_or(false)
        });
        info!(polylines = polylines.len(), "merged railway polylines");

        let mut timetables = HashMap::new();
        for line in lines::SUPPORTED_LINES {
            let path = data_dir
                .join("train-timetables")
                .join(format!("{}.json", line.line_id));
            if !path.exists() {
                warn!(line_id = line.line_id, path = %path.display(), "timetable file missing");
                continue;
            }
            let rows: Vec<model::RawTimetableRow> = read_json(&path)?;
            let trains = timetable::parse_timetable(line.line_id, rows);
            info!(line_id = line.line_id, trains = trains.len(), "loaded timetable");
            timetables.insert(line.line_id.to_string(), LineTimetable::build(trains));
        }

        for line in lines::SUPPORTED_LINES {
            if polylines.get(line.internal_id).is_none_or(Vec::is_empty) {
                // Position snapping on this line degrades to straight-line
                // interpolation between station coordinates.
                warn!(line_id = line.line_id, "no merged polyline for line");
            }
        }

        let mut corpus = Self {
            railways,
            timetables,
            polylines,
            station_positions: HashMap::new(),
            station_vertex: HashMap::new(),
            stations_by_line: HashMap::new(),
        };
        corpus.index_stations(stations);
        Ok(corpus)
    }

    /// Validate station coordinates and build the positional indices.
    fn index_stations(&mut self, stations: Vec<StationRecord>) {
        let mut dropped = 0usize;

        for station in &stations {
            match (station.lon, station.lat) {
                (Some(lon), Some(lat)) if LON_RANGE.contains(&lon) && LAT_RANGE.contains(&lat) => {
                    self.station_positions
                        .insert(station.id.clone(), (lon, lat));
                }
                (Some(lon), Some(lat)) => {
                    warn!(
                        station_id = %station.id,
                        lon,
                        lat,
                        "station coordinate outside plausible bounds, dropping"
                    );
                    dropped += 1;
                }
                _ => {
                    warn!(station_id = %station.id, "station has no coordinates, dropping");
                    dropped += 1;
                }
            }
        }

        for station in stations {
            if let (Some(coord), Some(poly)) = (
                self.station_positions.get(&station.id).copied(),
                self.polylines.get(&station.line_id),
            ) {
                if let Some(idx) = polyline::nearest_vertex_index(poly, coord) {
                    self.station_vertex.insert(station.id.clone(), idx);
                }
            }
            self.stations_by_line
                .entry(station.line_id.clone())
                .or_default()
                .push(station);
        }

        info!(
            positions = self.station_positions.len(),
            vertex_indexed = self.station_vertex.len(),
            dropped,
            "indexed stations"
        );
    }

    pub fn railway_info(&self, internal_id: &str) -> Option<&Railway> {
        self.railways.iter().find(|r| r.id == internal_id)
    }

    pub fn station_coord(&self, station_id: &str) -> Option<Coord> {
        self.station_positions.get(station_id).copied()
    }

    pub fn line_polyline(&self, line: &LineConfig) -> Option<&[Coord]> {
        self.polylines
            .get(line.internal_id)
            .map(Vec::as_slice)
            .filter(|p| !p.is_empty())
    }

    pub fn line_timetable(&self, line: &LineConfig) -> Option<&LineTimetable> {
        self.timetables.get(line.line_id)
    }

    pub fn line_stations(&self, line: &LineConfig) -> &[StationRecord] {
        self.stations_by_line
            .get(line.internal_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_day::ServiceType;

    fn station(id: &str, line_id: &str, lon: f64, lat: f64) -> StationRecord {
        StationRecord {
            id: id.to_string(),
            line_id: line_id.to_string(),
            name_ja: None,
            name_en: None,
            lon: Some(lon),
            lat: Some(lat),
        }
    }

    fn empty_corpus() -> StaticCorpus {
        StaticCorpus {
            railways: Vec::new(),
            timetables: HashMap::new(),
            polylines: HashMap::new(),
            station_positions: HashMap::new(),
            station_vertex: HashMap::new(),
            stations_by_line: HashMap::new(),
        }
    }

    #[test]
    fn out_of_bounds_and_missing_coordinates_are_dropped() {
        let mut corpus = empty_corpus();
        corpus.index_stations(vec![
            station("ok", "L", 139.7, 35.6),
            station("far", "L", 2.35, 48.85),
            StationRecord {
                id: "blank".to_string(),
                line_id: "L".to_string(),
                name_ja: None,
                name_en: None,
                lon: None,
                lat: None,
            },
        ]);
        assert!(corpus.station_positions.contains_key("ok"));
        assert!(!corpus.station_positions.contains_key("far"));
        assert!(!corpus.station_positions.contains_key("blank"));
        // Dropped stations still appear in the per-line listing.
        assert_eq!(corpus.stations_by_line["L"].len(), 3);
    }

    #[test]
    fn station_vertex_points_at_nearest_polyline_vertex() {
        let mut corpus = empty_corpus();
        corpus.polylines.insert(
            "L".to_string(),
            vec![(139.70, 35.60), (139.71, 35.61), (139.72, 35.62)],
        );
        corpus.index_stations(vec![station("s1", "L", 139.7105, 35.6095)]);
        assert_eq!(corpus.station_vertex.get("s1"), Some(&1));
    }

    #[test]
    fn load_reads_files_and_builds_indices() {
        let dir = std::env::temp_dir().join(format!("nowtrain-corpus-{}", std::process::id()));
        let tt_dir = dir.join("train-timetables");
        std::fs::create_dir_all(&tt_dir).unwrap();
        std::fs::write(
            dir.join("railways.json"),
            r##"[{"id": "JR-East.Yamanote", "title": {"ja": "山手線", "en": "Yamanote Line"},
                 "color": "#9ACD32", "loop": true}]"##,
        )
        .unwrap();
        std::fs::write(
            dir.join("coordinates.json"),
            r#"{"railways": [{"id": "JR-East.Yamanote", "sublines": [
                 {"type": "main", "coords": [[139.70, 35.60], [139.71, 35.61], [139.72, 35.62]]}
               ]}]}"#,
        )
        .unwrap();
        std::fs::write(
            tt_dir.join("yamanote.json"),
            r#"[{"id": "JR-East.Yamanote.301G.Weekday", "t": "JR-East.Yamanote.301G",
                 "r": "JR-East.Yamanote", "n": "301G", "y": "JR-East.Local", "d": "OuterLoop",
                 "tt": [{"s": "A", "d": "05:00"}, {"s": "B", "a": "05:02"}]}]"#,
        )
        .unwrap();

        let stations = vec![
            station("A", "JR-East.Yamanote", 139.70, 35.60),
            station("B", "JR-East.Yamanote", 139.72, 35.62),
        ];
        let corpus = StaticCorpus::load(&dir, stations).unwrap();

        assert_eq!(corpus.railways.len(), 1);
        assert!(corpus.railway_info("JR-East.Yamanote").unwrap().is_loop);
        assert_eq!(corpus.polylines["JR-East.Yamanote"].len(), 3);
        assert_eq!(corpus.station_vertex["A"], 0);
        assert_eq!(corpus.station_vertex["B"], 2);
        let tt = corpus.timetables.get("yamanote").unwrap();
        assert!(tt
            .get_static_train("301G", ServiceType::Weekday, "OuterLoop")
            .is_some());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_fails_without_required_files() {
        let dir =
            std::env::temp_dir().join(format!("nowtrain-corpus-missing-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let err = StaticCorpus::load(&dir, vec![]).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn stations_keep_persisted_order_per_line() {
        let mut corpus = empty_corpus();
        corpus.index_stations(vec![
            station("a", "L", 139.70, 35.60),
            station("b", "L", 139.71, 35.61),
            station("c", "L", 139.72, 35.62),
        ]);
        let ids: Vec<_> = corpus.stations_by_line["L"]
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
