//! Service-day arithmetic.
//!
//! Timetables are published against an operating day that starts at 04:00
//! local time, so a 01:30 departure belongs to the previous calendar date.
//! Everything downstream that needs a clock goes through these functions
//! with an explicit instant, which keeps the computations testable.

use chrono::{DateTime, Datelike, Days, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Local hour at which a new service day begins.
pub const SERVICE_DAY_START_HOUR: u32 = 4;

/// Seconds in a civil day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Coarse service classification used to pick a timetable variant.
///
/// Timetable identifiers carry a trailing tag (`Weekday`, `SaturdayHoliday`,
/// sometimes the older `Holiday`); anything else maps to `Unknown` and only
/// matches through the relaxed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    Weekday,
    SaturdayHoliday,
    Unknown,
}

impl ServiceType {
    /// Parse the trailing identifier segment of a timetable id.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Weekday" => ServiceType::Weekday,
            "SaturdayHoliday" | "Holiday" => ServiceType::SaturdayHoliday,
            _ => ServiceType::Unknown,
        }
    }

}

/// The service date an instant belongs to: before 04:00 local it is still
/// the previous calendar date.
pub fn service_date(instant: DateTime<Utc>, tz: Tz) -> chrono::NaiveDate {
    let local = instant.with_timezone(&tz);
    if local.hour() < SERVICE_DAY_START_HOUR {
        local
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap_or_else(|| local.date_naive())
    } else {
        local.date_naive()
    }
}

/// Seconds since 00:00 local of the service date.
///
/// Post-midnight instants of a late-night service day yield values at or
/// above 86 400, matching the rollover-corrected timetable seconds.
pub fn service_day_seconds(instant: DateTime<Utc>, tz: Tz) -> i64 {
    let local = instant.with_timezone(&tz);
    let secs = i64::from(local.num_seconds_from_midnight());
    if local.hour() < SERVICE_DAY_START_HOUR {
        secs + SECONDS_PER_DAY
    } else {
        secs
    }
}

/// Service classification of an instant's service date.
///
/// Saturday and Sunday map to `SaturdayHoliday`. Statutory holidays are not
/// consulted; they resolve as ordinary weekdays.
pub fn service_type(instant: DateTime<Utc>, tz: Tz) -> ServiceType {
    match service_date(instant, tz).weekday() {
        Weekday::Sat | Weekday::Sun => ServiceType::SaturdayHoliday,
        _ => ServiceType::Weekday,
    }
}
