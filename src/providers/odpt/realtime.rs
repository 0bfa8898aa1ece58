//! GTFS-RT TripUpdate fetch and normalization.
//!
//! Fetches the ODPT TripUpdate protobuf, filters it to one line, resolves
//! the feed's stop identifiers to internal station ids, and emits one
//! [`TrainSchedule`] per active trip. The schedules are request-scoped:
//! they are rebuilt from the feed on every position query.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use prost::Message;
use tracing::debug;

use super::error::FeedError;
use super::resolver;
use crate::corpus::{StaticCorpus, StationRecord};
use crate::lines::LineConfig;
use crate::service_day;

/// Stop ids already carrying the operator prefix are trusted verbatim.
const OPERATOR_STOP_PREFIX: &str = "JR-East.";

/// Maximum allowed protobuf response size (50 MB).
const MAX_PROTOBUF_SIZE: usize = 50 * 1024 * 1024;

/// TripDescriptor.schedule_relationship value for a cancelled trip.
const TRIP_CANCELED: i32 = 3;
/// StopTimeUpdate.schedule_relationship value for a skipped stop.
const STOP_SKIPPED: i32 = 1;

/// One stop of a trip's real-time timetable.
#[derive(Debug, Clone)]
pub struct RealtimeStationSchedule {
    pub stop_sequence: u32,
    /// Resolved internal station id; `None` when every strategy failed.
    pub station_id: Option<String>,
    /// Stop id as published by the feed.
    pub raw_stop_id: String,
    /// Unix seconds.
    pub arrival_time: Option<i64>,
    /// Unix seconds.
    pub departure_time: Option<i64>,
    pub delay_seconds: i32,
    pub resolved: bool,
}

/// Canonical real-time timetable of one active trip.
#[derive(Debug, Clone)]
pub struct TrainSchedule {
    pub trip_id: String,
    pub train_number: String,
    pub service_date: NaiveDate,
    pub direction: String,
    /// Feed header timestamp, unix seconds.
    pub feed_timestamp: i64,
    pub schedules_by_sequence: HashMap<u32, RealtimeStationSchedule>,
    /// Ascending; length >= 2 by construction.
    pub ordered_sequences: Vec<u32>,
}

impl TrainSchedule {
    pub fn stop(&self, sequence: u32) -> Option<&RealtimeStationSchedule> {
        self.schedules_by_sequence.get(&sequence)
    }
}

/// Fetch and decode the GTFS-RT TripUpdate feed.
///
/// The consumer key travels as a query parameter, per the ODPT convention.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<gtfs_realtime::FeedMessage, FeedError> {
    if api_key.is_empty() {
        return Err(FeedError::MissingApiKey);
    }

    let response = client
        .get(url)
        .query(&[("acl:consumerKey", api_key)])
        .timeout(timeout)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(FeedError::NetworkMessage(format!(
            "GTFS-RT HTTP {}",
            response.status()
        )));
    }

    let bytes = response.bytes().await?;
    if bytes.len() > MAX_PROTOBUF_SIZE {
        return Err(FeedError::NetworkMessage(format!(
            "GTFS-RT response too large: {} bytes (max {} bytes)",
            bytes.len(),
            MAX_PROTOBUF_SIZE
        )));
    }

    gtfs_realtime::FeedMessage::decode(bytes.as_ref()).map_err(FeedError::from)
}

/// Normalize a feed into one [`TrainSchedule`] per surviving trip on `line`.
pub fn normalize_trip_updates(
    feed: &gtfs_realtime::FeedMessage,
    line: &LineConfig,
    corpus: &StaticCorpus,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<TrainSchedule> {
    let feed_timestamp = feed
        .header
        .timestamp
        .map(|t| t as i64)
        .unwrap_or_else(|| now.timestamp());
    let service_type = service_day::service_type(now, tz);
    let default_service_date = service_day::service_date(now, tz);

    let line_stations = corpus.line_stations(line);

    let mut schedules = Vec::new();
    let mut seen_trips: HashSet<&str> = HashSet::new();
    let mut total = 0usize;
    let mut matched = 0usize;

    for entity in &feed.entity {
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };
        total += 1;

        let trip = &trip_update.trip;
        let Some(trip_id) = trip.trip_id.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        if trip.schedule_relationship == Some(TRIP_CANCELED) {
            continue;
        }
        // trip_id is the primary key; a feed repeating an entity keeps the
        // first occurrence.
        if !seen_trips.insert(trip_id) {
            continue;
        }

        let feed_route_id = trip.route_id.as_deref().unwrap_or("");
        if !resolver::matches_route(trip_id, feed_route_id, line.gtfs_route_id) {
            continue;
        }
        matched += 1;

        let train_number = resolver::normalize_train_number(trip_id);
        // Direction from the trip id; trips with no numeric body fall back
        // to whatever the static timetable knows about the train number.
        let direction = resolver::direction_for_trip(trip_id, line)
            .map(String::from)
            .or_else(|| {
                corpus
                    .line_timetable(line)
                    .and_then(|tt| tt.get_static_train(&train_number, service_type, ""))
                    .map(|train| train.direction.clone())
            })
            .unwrap_or_else(|| "Unknown".to_string());
        let ascending = direction == line.ascending_direction();

        let seq_map = corpus
            .line_timetable(line)
            .and_then(|tt| tt.seq_to_station_map(&train_number, service_type, &direction));

        let service_date = trip
            .start_date
            .as_deref()
            .and_then(parse_service_date)
            .unwrap_or(default_service_date);

        let mut by_sequence: HashMap<u32, RealtimeStationSchedule> = HashMap::new();

        for stu in &trip_update.stop_time_update {
            let Some(sequence) = stu.stop_sequence.filter(|&s| s > 0) else {
                continue;
            };
            if stu.schedule_relationship == Some(STOP_SKIPPED) {
                continue;
            }

            let arrival_time = stu.arrival.as_ref().and_then(|e| e.time);
            let departure_time = stu.departure.as_ref().and_then(|e| e.time);
            if arrival_time.is_none() && departure_time.is_none() {
                continue;
            }

            let delay_seconds = stu
                .arrival
                .as_ref()
                .and_then(|e| e.delay)
                .or_else(|| stu.departure.as_ref().and_then(|e| e.delay))
                .unwrap_or(0);

            let raw_stop_id = stu.stop_id.clone().unwrap_or_default();
            let station_id =
                resolve_stop_id(&raw_stop_id, sequence, line, seq_map, line_stations, ascending);

            by_sequence
                .entry(sequence)
                .or_insert(RealtimeStationSchedule {
                    stop_sequence: sequence,
                    resolved: station_id.is_some(),
                    station_id,
                    raw_stop_id,
                    arrival_time,
                    departure_time,
                    delay_seconds,
                });
        }

        if by_sequence.len() < 2 {
            debug!(trip_id, stops = by_sequence.len(), "trip has too few usable stops");
            continue;
        }

        let mut ordered_sequences: Vec<u32> = by_sequence.keys().copied().collect();
        ordered_sequences.sort_unstable();

        schedules.push(TrainSchedule {
            trip_id: trip_id.to_string(),
            train_number,
            service_date,
            direction,
            feed_timestamp,
            schedules_by_sequence: by_sequence,
            ordered_sequences,
        });
    }

    debug!(
        total_updates = total,
        matched,
        kept = schedules.len(),
        route = line.gtfs_route_id,
        "normalized trip updates"
    );

    schedules
}

/// Resolve a feed stop id to an internal station id.
///
/// Strategies in priority order: operator-prefixed ids pass verbatim; a
/// configured line prefix is prepended; the static timetable's
/// sequence-to-station map is consulted; finally the line's ordered station
/// list is indexed by sequence (from the far end for descending trips).
fn resolve_stop_id(
    raw: &str,
    sequence: u32,
    line: &LineConfig,
    seq_map: Option<&HashMap<u32, String>>,
    line_stations: &[StationRecord],
    ascending: bool,
) -> Option<String> {
    if !raw.is_empty() {
        if raw.starts_with(OPERATOR_STOP_PREFIX) {
            return Some(raw.to_string());
        }
        if let Some(prefix) = line.stop_id_prefix {
            return Some(format!("{prefix}.{raw}"));
        }
    }

    if let Some(station) = seq_map.and_then(|m| m.get(&sequence)) {
        return Some(station.clone());
    }

    let len = line_stations.len();
    let index = if ascending {
        (sequence as usize).checked_sub(1)
    } else {
        len.checked_sub(sequence as usize)
    }?;
    line_stations.get(index).map(|s| s.id.clone())
}

/// Parse a GTFS-RT service date string `YYYYMMDD`.
fn parse_service_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
