use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::geo::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationPing {
    pub id: i64,
    pub worker_id: i64,
    pub coordinate: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LocationUpdate {
    pub coordinate: Coordinate,
    #[schema(example = 8.0)]
    pub accuracy_meters: Option<f64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LocationHistoryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocationHistory {
    pub worker_id: i64,
    pub pings: Vec<LocationPing>,
    #[schema(example = 12.4)]
    pub distance_miles: f64,
}
