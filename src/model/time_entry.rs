use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::{IntoParams, ToSchema};

use crate::geo::Coordinate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeEntryStatus {
    Active,
    Completed,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationSnapshot {
    pub coordinate: Coordinate,
    pub zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TimeEntry {
    pub id: i64,
    pub worker_id: i64,
    #[schema(value_type = String, format = "date")]
    pub work_date: NaiveDate,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub break_start: Option<DateTime<Utc>>,
    pub break_end: Option<DateTime<Utc>>,
    pub total_hours: Option<f64>,
    pub hourly_rate: f64,
    pub overtime_rate: f64,
    pub overtime_hours: Option<f64>,
    pub total_pay: Option<f64>,
    pub location: Option<LocationSnapshot>,
    pub notes: Option<String>,
    pub status: TimeEntryStatus,
}

impl TimeEntry {
    pub fn is_active(&self) -> bool {
        self.clock_out.is_none()
    }

    pub fn on_break(&self) -> bool {
        self.break_start.is_some() && self.break_end.is_none()
    }
}

/// Fields written when a worker clocks in.
#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub worker_id: i64,
    pub work_date: NaiveDate,
    pub clock_in: DateTime<Utc>,
    pub hourly_rate: f64,
    pub overtime_rate: f64,
    pub location: Option<LocationSnapshot>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct TimeEntryQuery {
    #[schema(example = "2026-05-01", value_type = Option<String>, format = "date")]
    pub start: Option<NaiveDate>,
    #[schema(example = "2026-05-15", value_type = Option<String>, format = "date")]
    pub end: Option<NaiveDate>,
    pub status: Option<TimeEntryStatus>,
    #[schema(example = 1)]
    pub worker_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateNotes {
    #[schema(example = "Milled and patched Broad St")]
    pub notes: Option<String>,
}
