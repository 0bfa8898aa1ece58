//! ODPT GTFS-RT integration: feed fetching, trip/route resolution and
//! normalization into per-trip real-time timetables.

pub mod error;
pub mod realtime;
pub mod resolver;

pub use error::FeedError;
pub use realtime::{RealtimeStationSchedule, TrainSchedule};
