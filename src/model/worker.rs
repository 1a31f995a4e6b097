use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::geo::Coordinate;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    ClockedOut,
    ClockedIn,
    OnBreak,
    Traveling,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GeofenceStatus {
    InRange,
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Dale Whitmore",
        "email": "dale@blacktop.example",
        "phone": "+18045550142",
        "position": "Paver Operator",
        "hourly_rate": 24.5,
        "location": { "lat": 37.5407, "lng": -77.436 },
        "attendance_status": "clocked_in",
        "geofence_status": "in_range",
        "current_zone": "Main Shop",
        "active": true,
        "hire_date": "2024-03-11",
        "created_at": "2024-03-11T12:00:00Z",
        "updated_at": "2026-05-02T13:30:00Z"
    })
)]
pub struct Worker {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: String,
    pub hourly_rate: f64,
    pub location: Option<Coordinate>,
    pub attendance_status: AttendanceStatus,
    pub geofence_status: GeofenceStatus,
    pub current_zone: Option<String>,
    pub active: bool,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewWorker {
    #[schema(example = "Dale Whitmore")]
    pub name: String,
    #[schema(example = "dale@blacktop.example")]
    pub email: Option<String>,
    #[schema(example = "+18045550142")]
    pub phone: Option<String>,
    #[schema(example = "Paver Operator")]
    pub position: String,
    #[schema(example = 24.5)]
    pub hourly_rate: f64,
    #[schema(example = "2024-03-11", value_type = String, format = "date")]
    pub hire_date: NaiveDate,
}

impl NewWorker {
    pub fn validate(self) -> AppResult<Self> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        if self.position.trim().is_empty() {
            return Err(AppError::Validation("position must not be empty".into()));
        }
        validate_rate(self.hourly_rate)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct WorkerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    #[schema(example = 26.0)]
    pub hourly_rate: Option<f64>,
    pub active: Option<bool>,
}

impl WorkerUpdate {
    pub fn validate(self) -> AppResult<Self> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        if self.position.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(AppError::Validation("position must not be empty".into()));
        }
        if let Some(rate) = self.hourly_rate {
            validate_rate(rate)?;
        }
        Ok(self)
    }

    pub fn apply(self, worker: &mut Worker) {
        if let Some(name) = self.name {
            worker.name = name;
        }
        if let Some(email) = self.email {
            worker.email = Some(email);
        }
        if let Some(phone) = self.phone {
            worker.phone = Some(phone);
        }
        if let Some(position) = self.position {
            worker.position = position;
        }
        if let Some(rate) = self.hourly_rate {
            worker.hourly_rate = rate;
        }
        if let Some(active) = self.active {
            worker.active = active;
        }
    }
}

fn validate_rate(rate: f64) -> AppResult<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(AppError::Validation(format!(
            "hourly rate must be positive, got {rate}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn new_worker() -> NewWorker {
        NewWorker {
            name: "Dale Whitmore".into(),
            email: None,
            phone: None,
            position: "Paver Operator".into(),
            hourly_rate: 24.5,
            hire_date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
        }
    }

    #[test]
    fn status_strings_match_storage_format() {
        assert_eq!(AttendanceStatus::OnBreak.as_ref(), "on_break");
        assert_eq!(
            AttendanceStatus::from_str("clocked_in").unwrap(),
            AttendanceStatus::ClockedIn
        );
        assert_eq!(GeofenceStatus::OutOfRange.to_string(), "out_of_range");
        assert_eq!(
            serde_json::to_value(AttendanceStatus::Traveling).unwrap(),
            serde_json::json!("traveling")
        );
    }

    #[test]
    fn rejects_bad_rates_and_blank_names() {
        assert!(new_worker().validate().is_ok());
        assert!(NewWorker { hourly_rate: 0.0, ..new_worker() }.validate().is_err());
        assert!(NewWorker { hourly_rate: f64::INFINITY, ..new_worker() }.validate().is_err());
        assert!(NewWorker { name: "  ".into(), ..new_worker() }.validate().is_err());
        assert!(
            WorkerUpdate { hourly_rate: Some(-3.0), ..Default::default() }
                .validate()
                .is_err()
        );
    }
}
