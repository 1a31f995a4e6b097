pub mod distance;
pub mod geofence;

pub use distance::Coordinate;
pub use geofence::{GeofenceEvaluation, GeofenceZone};
