//! Stop-state and segment-progress solver.
//!
//! Given one trip's real-time timetable and a reference timestamp, decides
//! whether the train is dwelling at a station or running between two, and
//! how far through the running segment it is. Progress is not linear: a
//! trapezoidal speed profile models acceleration out of one station and
//! braking into the next.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::providers::odpt::{RealtimeStationSchedule, TrainSchedule};

/// Seconds a train spends accelerating to cruise speed.
pub const ACCEL_SECONDS: f64 = 30.0;
/// Seconds a train spends braking into the next stop.
pub const DECEL_SECONDS: f64 = 25.0;

/// Dwell applied when a stop publishes a single time and no rank is known.
pub const DEFAULT_DWELL_SECONDS: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrainStatus {
    Running,
    Stopped,
    Unknown,
    Invalid,
}

/// Where one trip is along its real-time timetable at a given instant.
#[derive(Debug, Clone)]
pub struct SegmentProgress {
    pub trip_id: String,
    pub train_number: String,
    pub direction: String,
    pub status: TrainStatus,
    pub prev_station_id: Option<String>,
    pub next_station_id: Option<String>,
    pub prev_sequence: u32,
    pub next_sequence: u32,
    /// The clamped reference timestamp the state was computed against.
    pub now_timestamp: i64,
    /// Effective departure of the segment's first stop (running), or of the
    /// dwelling stop (stopped).
    pub t0_departure: Option<i64>,
    /// Arrival at the segment's second stop (running only).
    pub t1_arrival: Option<i64>,
    /// `[0, 1]` while running, `0.0` while stopped, `None` otherwise.
    pub progress: Option<f64>,
    pub delay_seconds: i32,
    pub feed_timestamp: i64,
}

/// Fractional progress through a segment under the trapezoidal profile.
///
/// The train accelerates for [`ACCEL_SECONDS`], cruises, then brakes for
/// [`DECEL_SECONDS`]; segments shorter than the two ramps shrink both
/// proportionally. The peak normalized rate `v` makes the area under the
/// profile exactly 1.
pub fn trapezoidal_progress(elapsed: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return 1.0;
    }
    if elapsed <= 0.0 {
        return 0.0;
    }
    if elapsed >= duration {
        return 1.0;
    }

    let (t_acc, t_dec) = if duration < ACCEL_SECONDS + DECEL_SECONDS {
        let scale = duration / (ACCEL_SECONDS + DECEL_SECONDS);
        (ACCEL_SECONDS * scale, DECEL_SECONDS * scale)
    } else {
        (ACCEL_SECONDS, DECEL_SECONDS)
    };
    let t_const = duration - t_acc - t_dec;
    let v = 1.0 / (0.5 * t_acc + t_const + 0.5 * t_dec);

    if elapsed < t_acc {
        0.5 * (v / t_acc) * elapsed * elapsed
    } else if elapsed < t_acc + t_const {
        0.5 * v * t_acc + v * (elapsed - t_acc)
    } else {
        let remaining = duration - elapsed;
        1.0 - 0.5 * (v / t_dec) * remaining * remaining
    }
}

/// Effective departure time of a stop.
///
/// Feeds republishing single-entry timetables report `arrival == departure`;
/// the dwell table supplies how long the train actually stands there. A stop
/// with only an arrival gets the same treatment.
fn effective_departure(stop: &RealtimeStationSchedule, dwell: &HashMap<String, i64>) -> Option<i64> {
    let dwell_secs = stop
        .station_id
        .as_deref()
        .and_then(|id| dwell.get(id).copied())
        .unwrap_or(DEFAULT_DWELL_SECONDS);

    match (stop.arrival_time, stop.departure_time) {
        (Some(arr), Some(dep)) if arr == dep => Some(arr + dwell_secs),
        (_, Some(dep)) => Some(dep),
        (Some(arr), None) => Some(arr + dwell_secs),
        (None, None) => None,
    }
}

/// Solve one trip's state at `now`.
///
/// `now` is clamped to the feed's header timestamp so a stale local clock
/// can never run the train backwards.
pub fn solve(
    schedule: &TrainSchedule,
    now: i64,
    dwell: &HashMap<String, i64>,
) -> SegmentProgress {
    let now = now.max(schedule.feed_timestamp);

    let base = |status: TrainStatus| SegmentProgress {
        trip_id: schedule.trip_id.clone(),
        train_number: schedule.train_number.clone(),
        direction: schedule.direction.clone(),
        status,
        prev_station_id: None,
        next_station_id: None,
        prev_sequence: 0,
        next_sequence: 0,
        now_timestamp: now,
        t0_departure: None,
        t1_arrival: None,
        progress: None,
        delay_seconds: 0,
        feed_timestamp: schedule.feed_timestamp,
    };

    if schedule.ordered_sequences.len() < 2 {
        return base(TrainStatus::Invalid);
    }

    // Dwelling at a station?
    for &seq in &schedule.ordered_sequences {
        let Some(stop) = schedule.stop(seq) else {
            continue;
        };
        let (Some(arrival), Some(departure)) = (stop.arrival_time, effective_departure(stop, dwell))
        else {
            continue;
        };
        if arrival <= now && now <= departure {
            return SegmentProgress {
                prev_station_id: stop.station_id.clone(),
                next_station_id: stop.station_id.clone(),
                prev_sequence: seq,
                next_sequence: seq,
                t0_departure: Some(departure),
                progress: Some(0.0),
                delay_seconds: stop.delay_seconds,
                ..base(TrainStatus::Stopped)
            };
        }
    }

    // Running between a consecutive pair?
    let mut any_valid_interval = false;
    for pair in schedule.ordered_sequences.windows(2) {
        let (Some(prev), Some(next)) = (schedule.stop(pair[0]), schedule.stop(pair[1])) else {
            continue;
        };
        let Some(t0) = effective_departure(prev, dwell) else {
            continue;
        };
        let Some(t1) = next.arrival_time.or(next.departure_time) else {
            continue;
        };
        if t1 <= t0 {
            continue;
        }
        any_valid_interval = true;

        if t0 <= now && now <= t1 {
            let progress = trapezoidal_progress((now - t0) as f64, (t1 - t0) as f64);
            let delay = if next.delay_seconds != 0 {
                next.delay_seconds
            } else {
                prev.delay_seconds
            };
            return SegmentProgress {
                prev_station_id: prev.station_id.clone(),
                next_station_id: next.station_id.clone(),
                prev_sequence: pair[0],
                next_sequence: pair[1],
                t0_departure: Some(t0),
                t1_arrival: Some(t1),
                progress: Some(progress),
                delay_seconds: delay,
                ..base(TrainStatus::Running)
            };
        }
    }

    if any_valid_interval {
        // Before the first stop or past the last.
        base(TrainStatus::Unknown)
    } else {
        base(TrainStatus::Invalid)
    }
}
