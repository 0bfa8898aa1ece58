//! Typed records for the static timetable corpus.
//!
//! The published files use single-letter keys; the raw structs mirror them
//! exactly and everything downstream works on the normalized types, so no
//! other module ever inspects loosely-keyed maps.

use serde::Deserialize;

use crate::service_day::ServiceType;

/// One stop of a train, times normalized to seconds from service-day start.
///
/// Seconds may exceed 86 400 after day-rollover correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTime {
    pub station_id: String,
    pub arrival_sec: Option<i64>,
    pub departure_sec: Option<i64>,
}

impl StopTime {
    /// Representative time: departure when present, else arrival.
    pub fn representative_sec(&self) -> Option<i64> {
        self.departure_sec.or(self.arrival_sec)
    }
}

/// One train of the static timetable.
#[derive(Debug, Clone)]
pub struct TimetableTrain {
    /// Base identifier without the service-type suffix, e.g. `JR-East.Yamanote.400G`.
    pub base_id: String,
    pub service_type: ServiceType,
    /// Internal line id, e.g. `JR-East.Yamanote`.
    pub line_id: String,
    /// Train number, e.g. `400G`.
    pub number: String,
    /// Train class, e.g. `JR-East.Local`.
    pub train_class: String,
    /// Canonical direction name, e.g. `OuterLoop`.
    pub direction: String,
    pub origin_stations: Vec<String>,
    pub destination_stations: Vec<String>,
    pub stops: Vec<StopTime>,
}

// --- Raw file rows ---

/// A raw timetable row as published (short keys).
#[derive(Debug, Clone, Deserialize)]
pub struct RawTimetableRow {
    #[serde(default)]
    pub id: String,
    /// Base train id.
    #[serde(rename = "t")]
    pub train_id: Option<String>,
    /// Railway (internal line id).
    #[serde(rename = "r", default)]
    pub railway: String,
    /// Train number.
    #[serde(rename = "n", default)]
    pub number: String,
    /// Train class.
    #[serde(rename = "y", default)]
    pub train_class: String,
    /// Direction name.
    #[serde(rename = "d", default)]
    pub direction: String,
    /// Origin station ids.
    #[serde(rename = "os", default)]
    pub origin_stations: Vec<String>,
    /// Destination station ids.
    #[serde(rename = "ds", default)]
    pub destination_stations: Vec<String>,
    /// Stop list.
    #[serde(rename = "tt", default)]
    pub stops: Vec<RawStopRow>,
}

/// A raw stop row: station id plus `HH:MM[:SS]` arrival/departure strings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStopRow {
    #[serde(rename = "s", default)]
    pub station: String,
    #[serde(rename = "a")]
    pub arrival: Option<String>,
    #[serde(rename = "d")]
    pub departure: Option<String>,
}

/// A raw station row from `stations.json`, used to seed the store.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStationRow {
    pub id: String,
    #[serde(default)]
    pub railway: String,
    #[serde(default)]
    pub title: RawStationTitle,
    /// `[lon, lat]` when present.
    #[serde(default)]
    pub coord: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStationTitle {
    pub ja: Option<String>,
    pub en: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn representative_prefers_departure() {
        let stop = StopTime {
            station_id: "S".into(),
            arrival_sec: Some(100),
            departure_sec: Some(130),
        };
        assert_eq!(stop.representative_sec(), Some(130));

        let arrival_only = StopTime {
            station_id: "S".into(),
            arrival_sec: Some(100),
            departure_sec: None,
        };
        assert_eq!(arrival_only.representative_sec(), Some(100));

        let timeless = StopTime {
            station_id: "S".into(),
            arrival_sec: None,
            departure_sec: None,
        };
        assert_eq!(timeless.representative_sec(), None);
    }

    #[test]
    fn raw_station_row_deserializes() {
        let json = r#"{
            "id": "JR-East.Yamanote.Tokyo",
            "railway": "JR-East.Yamanote",
            "title": {"ja": "東京", "en": "Tokyo"},
            "coord": [139.7672, 35.6812]
        }"#;
        let row: RawStationRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.coord, vec![139.7672, 35.6812]);
        assert_eq!(row.title.en.as_deref(), Some("Tokyo"));

        let bare: RawStationRow = serde_json::from_str(r#"{"id": "X"}"#).unwrap();
        assert!(bare.coord.is_empty());
        assert_eq!(bare.title.ja, None);
    }

    #[test]
    fn raw_row_deserializes_short_keys() {
        let json = r#"{
            "id": "JR-East.Yamanote.400G.Weekday",
            "t": "JR-East.Yamanote.400G",
            "r": "JR-East.Yamanote",
            "n": "400G",
            "y": "JR-East.Local",
            "d": "InnerLoop",
            "os": ["JR-East.Yamanote.Osaki"],
            "tt": [
                {"s": "JR-East.Yamanote.Osaki", "d": "05:00"},
                {"s": "JR-East.Yamanote.Gotanda", "a": "05:02", "d": "05:03"}
            ]
        }"#;
        let row: RawTimetableRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.number, "400G");
        assert_eq!(row.stops.len(), 2);
        assert_eq!(row.stops[0].departure.as_deref(), Some("05:00"));
        assert_eq!(row.stops[0].arrival, None);
        assert!(row.destination_stations.is_empty());
    }
}
