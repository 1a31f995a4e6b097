use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppResult;
use crate::geo::Coordinate;
use crate::model::{
    location::LocationPing,
    payroll::{NewPayrollRecord, PayrollRecord, PayrollStatus},
    time_entry::{NewTimeEntry, TimeEntry, TimeEntryStatus},
    worker::{AttendanceStatus, GeofenceStatus, NewWorker, Worker, WorkerUpdate},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Filters for reading the time entry ledger.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: Option<TimeEntryStatus>,
    pub worker_id: Option<i64>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &TimeEntry) -> bool {
        self.start.is_none_or(|s| entry.work_date >= s)
            && self.end.is_none_or(|e| entry.work_date <= e)
            && self.status.is_none_or(|s| entry.status == s)
            && self.worker_id.is_none_or(|w| entry.worker_id == w)
    }
}

/// Persistence boundary for workers, the time entry ledger, payroll and
/// location pings.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_worker(&self, worker: NewWorker, now: DateTime<Utc>) -> AppResult<Worker>;
    async fn get_worker(&self, id: i64) -> AppResult<Option<Worker>>;
    async fn list_workers(&self, active_only: bool) -> AppResult<Vec<Worker>>;
    async fn update_worker(
        &self,
        id: i64,
        update: WorkerUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Worker>>;
    async fn set_attendance_status(
        &self,
        id: i64,
        status: AttendanceStatus,
        now: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn set_worker_location(
        &self,
        id: i64,
        coordinate: Coordinate,
        geofence: GeofenceStatus,
        zone: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Fails with `Conflict` when the worker already has an active entry.
    async fn insert_entry(&self, entry: NewTimeEntry) -> AppResult<TimeEntry>;
    async fn get_entry(&self, id: i64) -> AppResult<Option<TimeEntry>>;
    async fn active_entry(&self, worker_id: i64) -> AppResult<Option<TimeEntry>>;
    async fn list_active_entries(&self) -> AppResult<Vec<TimeEntry>>;
    async fn list_entries(&self, filter: &EntryFilter) -> AppResult<Vec<TimeEntry>>;
    /// Writes the whole entry if its stored status is still `expected`,
    /// otherwise `Conflict`.
    async fn save_entry(&self, entry: &TimeEntry, expected: TimeEntryStatus) -> AppResult<()>;
    /// Sets notes unless the entry is approved. `None` when nothing matched.
    async fn update_entry_notes(&self, id: i64, notes: Option<String>) -> AppResult<Option<TimeEntry>>;
    /// Moves an entry from `from` to `to`. `None` when it was not in `from`.
    async fn transition_entry(
        &self,
        id: i64,
        from: TimeEntryStatus,
        to: TimeEntryStatus,
    ) -> AppResult<Option<TimeEntry>>;

    /// Inserts the records and approves the entries in one transaction.
    async fn commit_payroll(
        &self,
        records: Vec<NewPayrollRecord>,
        entry_ids: &[i64],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PayrollRecord>>;
    async fn get_payroll(&self, id: i64) -> AppResult<Option<PayrollRecord>>;
    async fn list_payroll(
        &self,
        worker_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<PayrollRecord>, i64)>;
    /// Moves a record from `from` to `to`. `None` when it was not in `from`.
    async fn set_payroll_status(
        &self,
        id: i64,
        from: PayrollStatus,
        to: PayrollStatus,
    ) -> AppResult<Option<PayrollRecord>>;

    async fn record_ping(
        &self,
        worker_id: i64,
        coordinate: Coordinate,
        accuracy_meters: Option<f64>,
        recorded_at: DateTime<Utc>,
    ) -> AppResult<LocationPing>;
    async fn location_history(
        &self,
        worker_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<LocationPing>>;
    /// Most recent ping per worker recorded at or after `since`.
    async fn latest_pings(&self, since: DateTime<Utc>) -> AppResult<Vec<LocationPing>>;

    async fn health_check(&self) -> AppResult<()>;
}
