//! Timetable parsing and indexing.
//!
//! Turns raw timetable rows into [`TimetableTrain`]s: time strings become
//! seconds from service-day start, trains crossing midnight get a +24 h
//! rollover correction, and three lookup indices are built per line.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::model::{RawStopRow, RawTimetableRow, StopTime, TimetableTrain};
use super::CorpusError;
use crate::service_day::{ServiceType, SECONDS_PER_DAY};

/// `(train_number, service_type, direction)` — the identity under which
/// real-time trips are matched back to static trains.
pub type TrainKey = (String, ServiceType, String);

/// Parse `HH:MM` or `HH:MM:SS` into seconds from 00:00.
///
/// Hours are restricted to 0–23; `24:00`-style wrap values are rejected and
/// the caller decides whether the stop survives.
pub fn parse_time_to_seconds(time_str: &str) -> Result<i64, CorpusError> {
    let invalid = || CorpusError::InvalidTime(time_str.to_string());

    let mut parts = time_str.split(':');
    let hour: i64 = parts
        .next()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)?;
    let minute: i64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(invalid)?;
    let second: i64 = match parts.next() {
        Some(s) => s.parse().map_err(|_| invalid())?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }

    if !(0..=23).contains(&hour) || !(0..=59).contains(&minute) || !(0..=59).contains(&second) {
        return Err(invalid());
    }

    Ok(hour * 3600 + minute * 60 + second)
}

/// Normalize raw stop rows, applying day-rollover correction.
///
/// A running offset starts at 0 and grows by 86 400 whenever a stop's
/// representative time (departure, else arrival) decreases against the
/// previous stop's raw representative time. Stops without any time keep
/// both fields null and do not advance the detector.
pub fn normalize_stop_times(line_id: &str, rows: &[RawStopRow]) -> Vec<StopTime> {
    let mut result = Vec::with_capacity(rows.len());

    let mut day_offset: i64 = 0;
    let mut prev_rep_sec: Option<i64> = None;

    for (i, row) in rows.iter().enumerate() {
        if row.station.is_empty() {
            warn!(line_id, index = i, "timetable row has no station id, skipping");
            continue;
        }

        if row.arrival.is_none() && row.departure.is_none() {
            result.push(StopTime {
                station_id: row.station.clone(),
                arrival_sec: None,
                departure_sec: None,
            });
            continue;
        }

        // A parse failure invalidates the whole stop's times, not just the
        // offending field.
        let parsed = row
            .departure
            .as_deref()
            .map(parse_time_to_seconds)
            .transpose()
            .and_then(|dep| {
                let arr = row.arrival.as_deref().map(parse_time_to_seconds).transpose()?;
                Ok((dep, arr))
            });
        let (dep_sec, arr_sec) = match parsed {
            Ok(times) => times,
            Err(e) => {
                warn!(
                    line_id,
                    index = i,
                    station = %row.station,
                    error = %e,
                    "failed to parse stop time"
                );
                (None, None)
            }
        };

        let rep_sec = dep_sec.or(arr_sec);

        if let (Some(rep), Some(prev)) = (rep_sec, prev_rep_sec) {
            if rep < prev {
                day_offset += SECONDS_PER_DAY;
            }
        }

        if rep_sec.is_some() {
            prev_rep_sec = rep_sec;
        }

        result.push(StopTime {
            station_id: row.station.clone(),
            arrival_sec: arr_sec.map(|s| s + day_offset),
            departure_sec: dep_sec.map(|s| s + day_offset),
        });
    }

    result
}

/// Per-train sanity checks. Returns warning messages; violators are kept.
fn validate_train(train: &TimetableTrain) -> Vec<String> {
    let mut warnings = Vec::new();

    if train.stops.len() < 2 {
        warnings.push(format!("too few stops: {}", train.stops.len()));
    }

    let mut prev_sec: Option<i64> = None;
    for (i, stop) in train.stops.iter().enumerate() {
        let Some(sec) = stop.representative_sec() else {
            continue;
        };
        if let Some(prev) = prev_sec {
            if sec < prev {
                warnings.push(format!(
                    "non-monotonic time at stop index {i} ({})",
                    stop.station_id
                ));
                break;
            }
        }
        prev_sec = Some(sec);
    }

    if !train.origin_stations.is_empty() {
        if let Some(first) = train.stops.first() {
            if !train.origin_stations.contains(&first.station_id) {
                warnings.push(format!(
                    "first stop {} not in declared origins",
                    first.station_id
                ));
            }
        }
    }

    warnings
}

/// Parse a line's raw timetable rows into trains.
///
/// Rows without an id or without any surviving stop are skipped with a
/// warning; everything else is kept even when validation complains.
pub fn parse_timetable(line_id: &str, rows: Vec<RawTimetableRow>) -> Vec<TimetableTrain> {
    let mut trains = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for (idx, row) in rows.into_iter().enumerate() {
        if row.id.is_empty() {
            warn!(line_id, index = idx, "timetable row has no id, skipping");
            skipped += 1;
            continue;
        }

        // Service type comes from the id's trailing segment.
        let service_type = row
            .id
            .rsplit('.')
            .next()
            .map(ServiceType::from_tag)
            .unwrap_or(ServiceType::Unknown);
        if service_type == ServiceType::Unknown {
            debug!(line_id, id = %row.id, "train id has no recognized service-type suffix");
        }

        let base_id = row.train_id.clone().unwrap_or_else(|| row.id.clone());

        let stops = normalize_stop_times(line_id, &row.stops);
        if stops.is_empty() {
            warn!(line_id, id = %row.id, "train has no valid stops, skipping");
            skipped += 1;
            continue;
        }

        // Destinations: explicit field when present, else the final stop.
        let destination_stations = if row.destination_stations.is_empty() {
            stops
                .last()
                .map(|s| vec![s.station_id.clone()])
                .unwrap_or_default()
        } else {
            row.destination_stations
        };

        let train = TimetableTrain {
            base_id,
            service_type,
            line_id: row.railway,
            number: row.number,
            train_class: row.train_class,
            direction: row.direction,
            origin_stations: row.origin_stations,
            destination_stations,
            stops,
        };

        let warnings = validate_train(&train);
        if !warnings.is_empty() {
            warn!(
                line_id,
                id = %train.base_id,
                warnings = %warnings.join("; "),
                "timetable train validation warnings"
            );
        }

        trains.push(train);
    }

    if skipped > 0 {
        warn!(line_id, skipped, "skipped timetable trains");
    }

    trains
}

/// A line's trains plus the post-load indices.
#[derive(Debug, Default)]
pub struct LineTimetable {
    pub trains: Vec<TimetableTrain>,
    /// First-wins index by `(number, service_type, direction)`.
    lookup: HashMap<TrainKey, usize>,
    /// `stop_sequence -> station_id` per train, sequences numbered from 1.
    seq_maps: HashMap<TrainKey, HashMap<u32, String>>,
}

impl LineTimetable {
    pub fn build(trains: Vec<TimetableTrain>) -> Self {
        let mut lookup: HashMap<TrainKey, usize> = HashMap::new();
        let mut seq_maps: HashMap<TrainKey, HashMap<u32, String>> = HashMap::new();

        for (i, train) in trains.iter().enumerate() {
            let key = (
                train.number.clone(),
                train.service_type,
                train.direction.clone(),
            );
            if lookup.contains_key(&key) {
                debug!(number = %train.number, "duplicate train key, keeping first");
                continue;
            }

            let seq_map = train
                .stops
                .iter()
                .enumerate()
                .map(|(seq, stop)| (seq as u32 + 1, stop.station_id.clone()))
                .collect();

            lookup.insert(key.clone(), i);
            seq_maps.insert(key, seq_map);
        }

        Self {
            trains,
            lookup,
            seq_maps,
        }
    }

    /// Exact `(number, service_type, direction)` lookup, then a relaxed scan
    /// for the same number under any service type or direction.
    pub fn get_static_train(
        &self,
        number: &str,
        service_type: ServiceType,
        direction: &str,
    ) -> Option<&TimetableTrain> {
        if number.is_empty() {
            return None;
        }
        let key = (number.to_string(), service_type, direction.to_string());
        if let Some(&i) = self.lookup.get(&key) {
            return Some(&self.trains[i]);
        }
        self.lookup
            .iter()
            .find(|((num, _, _), _)| num == number)
            .map(|(_, &i)| &self.trains[i])
    }

    /// `stop_sequence -> station_id` map with the same relaxed fallback.
    pub fn seq_to_station_map(
        &self,
        number: &str,
        service_type: ServiceType,
        direction: &str,
    ) -> Option<&HashMap<u32, String>> {
        if number.is_empty() {
            return None;
        }
        let key = (number.to_string(), service_type, direction.to_string());
        if let Some(map) = self.seq_maps.get(&key) {
            return Some(map);
        }
        self.seq_maps
            .iter()
            .find(|((num, _, _), _)| num == number)
            .map(|(_, map)| map)
    }
}
