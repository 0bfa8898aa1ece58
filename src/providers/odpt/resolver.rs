//! Trip and route identifier resolution.
//!
//! The ODPT GTFS-RT feed frequently publishes trip updates with an empty
//! `route_id`, so line membership has to be inferred from the trip id's
//! trailing letter. The same suffix is shared by several lines, hence the
//! candidate lists. Direction and train number are likewise derived from
//! the trip id following the operator's numbering conventions.

use std::sync::LazyLock;

use regex::Regex;

use crate::lines::LineConfig;

/// Loop-line trip id prefixes: 4201xxx runs the outer loop, 4211xxx the
/// inner loop.
const OUTER_LOOP_PREFIX: &str = "4201";
const INNER_LOOP_PREFIX: &str = "4211";

/// Candidate routes for a trip id's trailing letter.
///
/// Closed table reflecting the operator's trip numbering; a suffix missing
/// here resolves to no candidates.
pub fn candidate_routes(trip_id: &str) -> &'static [&'static str] {
    let Some(suffix) = trip_id.chars().next_back() else {
        return &[];
    };
    match suffix.to_ascii_uppercase() {
        'G' => &["JR-East.Yamanote"],
        'H' => &["JR-East.ChuoRapid", "JR-East.Yokosuka"],
        'T' => &["JR-East.ChuoRapid"],
        'A' => &["JR-East.KeihinTohokuNegishi", "JR-East.ChuoSobuLocal"],
        'B' => &["JR-East.KeihinTohokuNegishi", "JR-East.ChuoSobuLocal"],
        'C' => &["JR-East.ChuoSobuLocal"],
        'K' => &["JR-East.Yokohama", "JR-East.SaikyoKawagoe"],
        'F' => &["JR-East.Nambu", "JR-East.SaikyoKawagoe", "JR-East.SobuRapid"],
        'M' => &[
            "JR-East.Joban",
            "JR-East.JobanRapid",
            "JR-East.SaikyoKawagoe",
            "JR-East.Keiyo",
            "JR-East.Tokaido",
            "JR-East.Sobu",
            "JR-East.SobuRapid",
        ],
        'Y' => &[
            "JR-East.Yokosuka",
            "JR-East.Keiyo",
            "JR-East.Tokaido",
            "JR-East.ChuoSobuLocal",
        ],
        'S' => &["JR-East.SaikyoKawagoe", "JR-East.Yokosuka"],
        'E' => &["JR-East.Musashino", "JR-East.Tokaido"],
        _ => &[],
    }
}

/// Decide whether a feed trip belongs to the target route.
///
/// A matching feed `route_id` wins outright; otherwise the trip id's
/// trailing letter must list the target among its candidates.
pub fn matches_route(trip_id: &str, feed_route_id: &str, target_route_id: &str) -> bool {
    if feed_route_id == target_route_id {
        return true;
    }
    candidate_routes(trip_id)
        .iter()
        .any(|&route| route == target_route_id)
}

/// Canonical direction name for a trip on the given line.
///
/// The loop line is decided by its numeric prefixes. Everything else uses
/// the odd/even convention on the trip id's numeric body: odd numbers run
/// in the line's first-listed direction, even numbers in the second.
pub fn direction_for_trip(trip_id: &str, line: &LineConfig) -> Option<&'static str> {
    if line.is_loop {
        if trip_id.starts_with(OUTER_LOOP_PREFIX) {
            return Some(line.directions.0);
        }
        if trip_id.starts_with(INNER_LOOP_PREFIX) {
            return Some(line.directions.1);
        }
    }

    // Numeric body past the 4-digit line prefix.
    let body: String = trip_id
        .get(4..)
        .unwrap_or("")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let number: u64 = body.parse().ok()?;

    if number % 2 == 1 {
        Some(line.directions.0)
    } else {
        Some(line.directions.1)
    }
}

static TRAIN_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3,4})([A-Z])$").expect("train number pattern"));

/// Extract the normalized train number from a trip id.
///
/// Takes the trailing 3-or-4-digit group plus its letter and strips leading
/// zeros, e.g. `4201301G` -> `301G`, `42000906G` -> `906G`. Unmatched ids
/// are returned unchanged rather than sliced blindly.
pub fn normalize_train_number(trip_id: &str) -> String {
    match TRAIN_NUMBER_RE.captures(trip_id) {
        Some(caps) => {
            let digits: u64 = caps[1].parse().unwrap_or(0);
            format!("{digits}{}", &caps[2])
        }
        None => trip_id.to_string(),
    }
}
