//! Polyline snapper.
//!
//! Maps a solved segment progress to a latitude/longitude on the line's
//! merged polyline: slice the sub-path between the two stations' nearest
//! vertices (wrapping on the loop line), walk it by great-circle arc
//! length, and interpolate inside the containing segment. When the polyline
//! cannot be trusted the snapper falls back to a straight line between the
//! station coordinates.

use crate::corpus::polyline::Coord;
use crate::corpus::StaticCorpus;
use crate::lines::LineConfig;

use super::progress::{SegmentProgress, TrainStatus};

/// Stations farther than this from their nearest polyline vertex are
/// considered mis-anchored and force the straight-line fallback.
pub const MAX_STATION_SNAP_DISTANCE_M: f64 = 500.0;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A snapped map position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Azimuth of travel in degrees clockwise from north, when derivable.
    pub bearing: Option<f64>,
}

/// Great-circle distance between two `(lon, lat)` pairs in meters.
pub fn haversine_m(a: Coord, b: Coord) -> f64 {
    let (lon1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lon2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial great-circle bearing from `a` to `b`, degrees in `[0, 360)`.
pub fn initial_bearing_deg(a: Coord, b: Coord) -> f64 {
    let (lon1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lon2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlon = lon2 - lon1;
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Snap a solved state to map coordinates.
///
/// Stopped trains sit on their station; running trains follow the polyline
/// sub-path. `Unknown`/`Invalid` states and unresolved stations yield `None`.
pub fn snap(
    progress: &SegmentProgress,
    line: &LineConfig,
    corpus: &StaticCorpus,
) -> Option<SnappedPosition> {
    match progress.status {
        TrainStatus::Stopped => {
            let station = progress
                .prev_station_id
                .as_deref()
                .or(progress.next_station_id.as_deref())?;
            let (lon, lat) = corpus.station_coord(station)?;
            Some(SnappedPosition {
                latitude: lat,
                longitude: lon,
                bearing: None,
            })
        }
        TrainStatus::Running => {
            let prev_id = progress.prev_station_id.as_deref()?;
            let next_id = progress.next_station_id.as_deref()?;
            let fraction = progress.progress?.clamp(0.0, 1.0);

            let prev_coord = corpus.station_coord(prev_id)?;
            let next_coord = corpus.station_coord(next_id)?;

            snap_to_polyline(line, corpus, prev_id, next_id, &progress.direction, fraction)
                .or_else(|| Some(straight_line(prev_coord, next_coord, fraction)))
        }
        TrainStatus::Unknown | TrainStatus::Invalid => None,
    }
}

/// Polyline-following interpolation; `None` requests the fallback.
fn snap_to_polyline(
    line: &LineConfig,
    corpus: &StaticCorpus,
    prev_id: &str,
    next_id: &str,
    direction: &str,
    fraction: f64,
) -> Option<SnappedPosition> {
    let poly = corpus.line_polyline(line)?;
    let s = *corpus.station_vertex.get(prev_id)?;
    let e = *corpus.station_vertex.get(next_id)?;
    if s == e {
        return None;
    }

    let prev_coord = corpus.station_coord(prev_id)?;
    let next_coord = corpus.station_coord(next_id)?;
    if haversine_m(prev_coord, poly[s]) > MAX_STATION_SNAP_DISTANCE_M
        || haversine_m(next_coord, poly[e]) > MAX_STATION_SNAP_DISTANCE_M
    {
        return None;
    }

    let path = subpath(poly, s, e, line, direction);
    point_along_path(&path, fraction)
}

/// Sub-path between two vertex indices.
///
/// The loop line wraps around the ring in the travel direction; other lines
/// simply reverse the slice when the indices run backwards.
fn subpath(poly: &[Coord], s: usize, e: usize, line: &LineConfig, direction: &str) -> Vec<Coord> {
    if line.is_loop {
        let ascending = direction == line.ascending_direction();
        if ascending {
            if s <= e {
                poly[s..=e].to_vec()
            } else {
                let mut path = poly[s..].to_vec();
                path.extend_from_slice(&poly[..=e]);
                path
            }
        } else if s >= e {
            let mut path = poly[e..=s].to_vec();
            path.reverse();
            path
        } else {
            let mut path: Vec<Coord> = poly[..=s].iter().rev().copied().collect();
            path.extend(poly[e..].iter().rev().copied());
            path
        }
    } else if s < e {
        poly[s..=e].to_vec()
    } else {
        let mut path = poly[e..=s].to_vec();
        path.reverse();
        path
    }
}

/// Point at `fraction` of the path's total great-circle arc length.
fn point_along_path(path: &[Coord], fraction: f64) -> Option<SnappedPosition> {
    let (&first, &last) = (path.first()?, path.last()?);
    if path.len() < 2 {
        return Some(SnappedPosition {
            latitude: first.1,
            longitude: first.0,
            bearing: None,
        });
    }
    if fraction <= 0.0 {
        return Some(SnappedPosition {
            latitude: first.1,
            longitude: first.0,
            bearing: Some(initial_bearing_deg(path[0], path[1])),
        });
    }
    if fraction >= 1.0 {
        return Some(SnappedPosition {
            latitude: last.1,
            longitude: last.0,
            bearing: Some(initial_bearing_deg(path[path.len() - 2], last)),
        });
    }

    let lengths: Vec<f64> = path.windows(2).map(|w| haversine_m(w[0], w[1])).collect();
    let total: f64 = lengths.iter().sum();
    if total <= 0.0 {
        return Some(SnappedPosition {
            latitude: first.1,
            longitude: first.0,
            bearing: None,
        });
    }

    let target = fraction * total;
    let mut cumulative = 0.0;
    for (i, &len) in lengths.iter().enumerate() {
        if cumulative + len >= target {
            if len <= 0.0 {
                return Some(SnappedPosition {
                    latitude: path[i].1,
                    longitude: path[i].0,
                    bearing: None,
                });
            }
            let local = (target - cumulative) / len;
            let lon = path[i].0 + local * (path[i + 1].0 - path[i].0);
            let lat = path[i].1 + local * (path[i + 1].1 - path[i].1);
            return Some(SnappedPosition {
                latitude: lat,
                longitude: lon,
                bearing: Some(initial_bearing_deg(path[i], path[i + 1])),
            });
        }
        cumulative += len;
    }

    Some(SnappedPosition {
        latitude: last.1,
        longitude: last.0,
        bearing: Some(initial_bearing_deg(path[path.len() - 2], last)),
    })
}

/// Straight-line fallback between two station coordinates.
fn straight_line(from: Coord, to: Coord, fraction: f64) -> SnappedPosition {
    let lon = from.0 + fraction * (to.0 - from.0);
    let lat = from.1 + fraction * (to.1 - from.1);
    SnappedPosition {
        latitude: lat,
        longitude: lon,
        bearing: Some(initial_bearing_deg(from, to)),
    }
}
