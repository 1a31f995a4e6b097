use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PayrollStatus {
    Draft,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Withholding {
    pub federal: f64,
    pub state: f64,
    pub social_security: f64,
    pub medicare: f64,
}

impl Withholding {
    pub fn total(&self) -> f64 {
        self.federal + self.state + self.social_security + self.medicare
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "batch_id": "5b0c4c4e-8e0f-4a59-9c55-3f5a0f0f8c11",
        "worker_id": 1,
        "period_start": "2026-05-01",
        "period_end": "2026-05-07",
        "regular_hours": 40.0,
        "overtime_hours": 5.0,
        "hourly_rate": 20.0,
        "gross_pay": 950.0,
        "withholding": {
            "federal": 114.0,
            "state": 57.0,
            "social_security": 58.9,
            "medicare": 13.775
        },
        "net_pay": 706.325,
        "status": "draft",
        "created_at": "2026-05-08T09:00:00Z"
    })
)]
pub struct PayrollRecord {
    pub id: i64,
    pub batch_id: Uuid,
    pub worker_id: i64,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub hourly_rate: f64,
    pub gross_pay: f64,
    pub withholding: Withholding,
    pub net_pay: f64,
    pub status: PayrollStatus,
    pub created_at: DateTime<Utc>,
}

/// A computed payroll line waiting to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayrollRecord {
    pub batch_id: Uuid,
    pub worker_id: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub hourly_rate: f64,
    pub gross_pay: f64,
    pub withholding: Withholding,
    pub net_pay: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayPeriod {
    #[schema(example = "2026-05-01", value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(example = "2026-05-07", value_type = String, format = "date")]
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 1)]
    pub worker_id: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<PayrollRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}
