use utoipa::OpenApi;

use crate::api::payroll::ProcessPayrollResponse;
use crate::api::worker::{LocationResponse, WorkerListResponse};
use crate::geo::geofence::{GeofenceEvaluation, GeofenceMatch, GeofenceZone};
use crate::geo::Coordinate;
use crate::model::location::{LocationHistory, LocationPing, LocationUpdate};
use crate::model::payroll::{
    PaginatedPayrollResponse, PayPeriod, PayrollQuery, PayrollRecord, PayrollStatus, Withholding,
};
use crate::model::time_entry::{
    LocationSnapshot, TimeEntry, TimeEntryQuery, TimeEntryStatus, UpdateNotes,
};
use crate::model::worker::{AttendanceStatus, GeofenceStatus, NewWorker, Worker, WorkerUpdate};
use crate::service::attendance::AttendanceUpdate;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PaveOps Field Attendance API",
        version = "1.0.0",
        description = r#"
## Field Attendance & Payroll

Tracks paving crews through GPS geofences around the shop, the equipment
yard and the asphalt plant, and turns their time on the clock into payroll.

### Key Features
- **Workers**
  - Hire, update and list crew members with their hourly rate
- **Location**
  - GPS pings, zone membership, trip history
- **Attendance**
  - Manual clock in/out, breaks and travel between sites
  - Automatic clock in/out from the geofence monitor
- **Time Entries**
  - Per-shift hours with daily overtime, notes, approval
- **Payroll**
  - Weekly overtime, tax withholding, paid status

### Response Format
- JSON bodies; errors are `{"message": "..."}`
- Pagination on the payroll list

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::worker::create_worker,
        crate::api::worker::list_workers,
        crate::api::worker::get_worker,
        crate::api::worker::update_worker,
        crate::api::worker::record_location,
        crate::api::worker::location_history,

        crate::api::geofence::list_zones,
        crate::api::geofence::check_point,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::break_start,
        crate::api::attendance::break_end,
        crate::api::attendance::travel_start,
        crate::api::attendance::travel_end,

        crate::api::time_entry::list_entries,
        crate::api::time_entry::list_active,
        crate::api::time_entry::get_entry,
        crate::api::time_entry::update_notes,
        crate::api::time_entry::approve_entry,

        crate::api::payroll::process_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,
        crate::api::payroll::mark_paid
    ),
    components(
        schemas(
            Coordinate,
            GeofenceZone,
            GeofenceMatch,
            GeofenceEvaluation,
            Worker,
            NewWorker,
            WorkerUpdate,
            WorkerListResponse,
            AttendanceStatus,
            GeofenceStatus,
            LocationPing,
            LocationUpdate,
            LocationHistory,
            LocationResponse,
            AttendanceUpdate,
            TimeEntry,
            TimeEntryStatus,
            TimeEntryQuery,
            LocationSnapshot,
            UpdateNotes,
            PayrollRecord,
            PayrollStatus,
            Withholding,
            PayPeriod,
            PayrollQuery,
            PaginatedPayrollResponse,
            ProcessPayrollResponse
        )
    ),
    tags(
        (name = "Worker", description = "Crew roster APIs"),
        (name = "Location", description = "GPS tracking APIs"),
        (name = "Geofence", description = "Work zone APIs"),
        (name = "Attendance", description = "Clock in/out APIs"),
        (name = "TimeEntry", description = "Time ledger APIs"),
        (name = "Payroll", description = "Payroll APIs"),
    )
)]
pub struct ApiDoc;

/// Prefix the handlers are documented under.
const DOCUMENTED_PREFIX: &str = "/api";

/// The API document with every path moved under the prefix the server
/// actually mounts the API at.
pub fn openapi_for(api_prefix: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let prefix = api_prefix.trim_end_matches('/');
    if prefix == DOCUMENTED_PREFIX {
        return doc;
    }

    doc.paths.paths = std::mem::take(&mut doc.paths.paths)
        .into_iter()
        .map(|(path, item)| {
            let path = match path.strip_prefix(DOCUMENTED_PREFIX) {
                Some(rest) => format!("{prefix}{rest}"),
                None => path,
            };
            (path, item)
        })
        .collect();
    doc
}
