//! Position computation: stop-state solving and polyline snapping.

pub mod progress;
pub mod snap;

pub use progress::{SegmentProgress, TrainStatus};
pub use snap::SnappedPosition;
