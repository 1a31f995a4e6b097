use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{EntryFilter, Repository};
use crate::error::{AppError, AppResult};
use crate::geo::Coordinate;
use crate::model::{
    location::LocationPing,
    payroll::{NewPayrollRecord, PayrollRecord, PayrollStatus, Withholding},
    time_entry::{LocationSnapshot, NewTimeEntry, TimeEntry, TimeEntryStatus},
    worker::{AttendanceStatus, GeofenceStatus, NewWorker, Worker, WorkerUpdate},
};

const WORKER_COLUMNS: &str = "id, name, email, phone, position, hourly_rate, lat, lng, \
    attendance_status, geofence_status, current_zone, active, hire_date, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, worker_id, work_date, clock_in, clock_out, break_start, \
    break_end, total_hours, hourly_rate, overtime_rate, overtime_hours, total_pay, \
    location_lat, location_lng, location_zone, notes, status";

const PAYROLL_COLUMNS: &str = "id, batch_id, worker_id, period_start, period_end, \
    regular_hours, overtime_hours, hourly_rate, gross_pay, federal_tax, state_tax, \
    social_security_tax, medicare_tax, net_pay, status, created_at";

const PING_COLUMNS: &str = "id, worker_id, lat, lng, accuracy_meters, recorded_at";

pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    info!(max_connections, "Connecting to Postgres");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    info!("Postgres connection pool established");
    Ok(pool)
}

fn parse_enum<T: FromStr>(raw: &str) -> Result<T, sqlx::Error>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn coordinate(lat: Option<f64>, lng: Option<f64>) -> Option<Coordinate> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Coordinate { lat, lng }),
        _ => None,
    }
}

#[derive(FromRow)]
struct WorkerRow {
    id: i64,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    position: String,
    hourly_rate: f64,
    lat: Option<f64>,
    lng: Option<f64>,
    attendance_status: String,
    geofence_status: String,
    current_zone: Option<String>,
    active: bool,
    hire_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkerRow> for Worker {
    type Error = sqlx::Error;

    fn try_from(r: WorkerRow) -> Result<Self, Self::Error> {
        Ok(Worker {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            position: r.position,
            hourly_rate: r.hourly_rate,
            location: coordinate(r.lat, r.lng),
            attendance_status: parse_enum::<AttendanceStatus>(&r.attendance_status)?,
            geofence_status: parse_enum::<GeofenceStatus>(&r.geofence_status)?,
            current_zone: r.current_zone,
            active: r.active,
            hire_date: r.hire_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct EntryRow {
    id: i64,
    worker_id: i64,
    work_date: NaiveDate,
    clock_in: DateTime<Utc>,
    clock_out: Option<DateTime<Utc>>,
    break_start: Option<DateTime<Utc>>,
    break_end: Option<DateTime<Utc>>,
    total_hours: Option<f64>,
    hourly_rate: f64,
    overtime_rate: f64,
    overtime_hours: Option<f64>,
    total_pay: Option<f64>,
    location_lat: Option<f64>,
    location_lng: Option<f64>,
    location_zone: Option<String>,
    notes: Option<String>,
    status: String,
}

impl TryFrom<EntryRow> for TimeEntry {
    type Error = sqlx::Error;

    fn try_from(r: EntryRow) -> Result<Self, Self::Error> {
        let location = coordinate(r.location_lat, r.location_lng).map(|coordinate| {
            LocationSnapshot {
                coordinate,
                zone: r.location_zone,
            }
        });
        Ok(TimeEntry {
            id: r.id,
            worker_id: r.worker_id,
            work_date: r.work_date,
            clock_in: r.clock_in,
            clock_out: r.clock_out,
            break_start: r.break_start,
            break_end: r.break_end,
            total_hours: r.total_hours,
            hourly_rate: r.hourly_rate,
            overtime_rate: r.overtime_rate,
            overtime_hours: r.overtime_hours,
            total_pay: r.total_pay,
            location,
            notes: r.notes,
            status: parse_enum::<TimeEntryStatus>(&r.status)?,
        })
    }
}

#[derive(FromRow)]
struct PayrollRow {
    id: i64,
    batch_id: Uuid,
    worker_id: i64,
    period_start: NaiveDate,
    period_end: NaiveDate,
    regular_hours: f64,
    overtime_hours: f64,
    hourly_rate: f64,
    gross_pay: f64,
    federal_tax: f64,
    state_tax: f64,
    social_security_tax: f64,
    medicare_tax: f64,
    net_pay: f64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PayrollRow> for PayrollRecord {
    type Error = sqlx::Error;

    fn try_from(r: PayrollRow) -> Result<Self, Self::Error> {
        Ok(PayrollRecord {
            id: r.id,
            batch_id: r.batch_id,
            worker_id: r.worker_id,
            period_start: r.period_start,
            period_end: r.period_end,
            regular_hours: r.regular_hours,
            overtime_hours: r.overtime_hours,
            hourly_rate: r.hourly_rate,
            gross_pay: r.gross_pay,
            withholding: Withholding {
                federal: r.federal_tax,
                state: r.state_tax,
                social_security: r.social_security_tax,
                medicare: r.medicare_tax,
            },
            net_pay: r.net_pay,
            status: parse_enum::<PayrollStatus>(&r.status)?,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct PingRow {
    id: i64,
    worker_id: i64,
    lat: f64,
    lng: f64,
    accuracy_meters: Option<f64>,
    recorded_at: DateTime<Utc>,
}

impl From<PingRow> for LocationPing {
    fn from(r: PingRow) -> Self {
        LocationPing {
            id: r.id,
            worker_id: r.worker_id,
            coordinate: Coordinate { lat: r.lat, lng: r.lng },
            accuracy_meters: r.accuracy_meters,
            recorded_at: r.recorded_at,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = sqlx::Error>,
{
    rows.into_iter()
        .map(|r| T::try_from(r).map_err(AppError::from))
        .collect()
}

/// Postgres-backed repository.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> AppResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl Repository for PgStore {
    #[instrument(skip(self, worker), fields(name = %worker.name))]
    async fn create_worker(&self, worker: NewWorker, now: DateTime<Utc>) -> AppResult<Worker> {
        let sql = format!(
            "INSERT INTO workers (name, email, phone, position, hourly_rate, hire_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) RETURNING {WORKER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, WorkerRow>(&sql)
            .bind(&worker.name)
            .bind(&worker.email)
            .bind(&worker.phone)
            .bind(&worker.position)
            .bind(worker.hourly_rate)
            .bind(worker.hire_date)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_into()?)
    }

    async fn get_worker(&self, id: i64) -> AppResult<Option<Worker>> {
        let sql = format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = $1");
        let row = sqlx::query_as::<_, WorkerRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Worker::try_from).transpose()?)
    }

    async fn list_workers(&self, active_only: bool) -> AppResult<Vec<Worker>> {
        let sql = format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE ($1 = FALSE OR active) ORDER BY id"
        );
        let rows = sqlx::query_as::<_, WorkerRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn update_worker(
        &self,
        id: i64,
        update: WorkerUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Worker>> {
        let sql = format!(
            "UPDATE workers SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                phone = COALESCE($4, phone), \
                position = COALESCE($5, position), \
                hourly_rate = COALESCE($6, hourly_rate), \
                active = COALESCE($7, active), \
                updated_at = $8 \
             WHERE id = $1 RETURNING {WORKER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, WorkerRow>(&sql)
            .bind(id)
            .bind(update.name)
            .bind(update.email)
            .bind(update.phone)
            .bind(update.position)
            .bind(update.hourly_rate)
            .bind(update.active)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Worker::try_from).transpose()?)
    }

    async fn set_attendance_status(
        &self,
        id: i64,
        status: AttendanceStatus,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE workers SET attendance_status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_ref())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("worker {id} not found")));
        }
        Ok(())
    }

    async fn set_worker_location(
        &self,
        id: i64,
        coordinate: Coordinate,
        geofence: GeofenceStatus,
        zone: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE workers SET lat = $2, lng = $3, geofence_status = $4, current_zone = $5, \
             updated_at = $6 WHERE id = $1",
        )
        .bind(id)
        .bind(coordinate.lat)
        .bind(coordinate.lng)
        .bind(geofence.as_ref())
        .bind(zone)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("worker {id} not found")));
        }
        Ok(())
    }

    #[instrument(skip(self, entry), fields(worker_id = entry.worker_id))]
    async fn insert_entry(&self, entry: NewTimeEntry) -> AppResult<TimeEntry> {
        let sql = format!(
            "INSERT INTO time_entries \
             (worker_id, work_date, clock_in, hourly_rate, overtime_rate, \
              location_lat, location_lng, location_zone, notes, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active') RETURNING {ENTRY_COLUMNS}"
        );
        let (lat, lng, zone) = match &entry.location {
            Some(s) => (Some(s.coordinate.lat), Some(s.coordinate.lng), s.zone.clone()),
            None => (None, None, None),
        };
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(entry.worker_id)
            .bind(entry.work_date)
            .bind(entry.clock_in)
            .bind(entry.hourly_rate)
            .bind(entry.overtime_rate)
            .bind(lat)
            .bind(lng)
            .bind(zone)
            .bind(&entry.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(format!(
                        "worker {} already has an active time entry",
                        entry.worker_id
                    ))
                }
                other => AppError::Database(other),
            })?;

        Ok(row.try_into()?)
    }

    async fn get_entry(&self, id: i64) -> AppResult<Option<TimeEntry>> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM time_entries WHERE id = $1");
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TimeEntry::try_from).transpose()?)
    }

    async fn active_entry(&self, worker_id: i64) -> AppResult<Option<TimeEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM time_entries WHERE worker_id = $1 AND clock_out IS NULL"
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TimeEntry::try_from).transpose()?)
    }

    async fn list_active_entries(&self) -> AppResult<Vec<TimeEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM time_entries WHERE clock_out IS NULL ORDER BY clock_in"
        );
        let rows = sqlx::query_as::<_, EntryRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn list_entries(&self, filter: &EntryFilter) -> AppResult<Vec<TimeEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM time_entries \
             WHERE ($1::DATE IS NULL OR work_date >= $1) \
               AND ($2::DATE IS NULL OR work_date <= $2) \
               AND ($3::TEXT IS NULL OR status = $3) \
               AND ($4::BIGINT IS NULL OR worker_id = $4) \
             ORDER BY work_date, clock_in, id"
        );
        debug!(sql = %sql, filter = ?filter, "Listing time entries");

        let rows = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(filter.start)
            .bind(filter.end)
            .bind(filter.status.map(|s| s.as_ref().to_owned()))
            .bind(filter.worker_id)
            .fetch_all(&self.pool)
            .await?;

        convert_all(rows)
    }

    async fn save_entry(&self, entry: &TimeEntry, expected: TimeEntryStatus) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE time_entries SET \
                clock_out = $2, break_start = $3, break_end = $4, total_hours = $5, \
                overtime_hours = $6, total_pay = $7, notes = $8, status = $9 \
             WHERE id = $1 AND status = $10",
        )
        .bind(entry.id)
        .bind(entry.clock_out)
        .bind(entry.break_start)
        .bind(entry.break_end)
        .bind(entry.total_hours)
        .bind(entry.overtime_hours)
        .bind(entry.total_pay)
        .bind(&entry.notes)
        .bind(entry.status.as_ref())
        .bind(expected.as_ref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_entry(entry.id).await? {
                Some(current) => Err(AppError::Conflict(format!(
                    "time entry {} is {} now, expected {expected}",
                    entry.id, current.status
                ))),
                None => Err(AppError::NotFound(format!("time entry {} not found", entry.id))),
            };
        }
        Ok(())
    }

    async fn update_entry_notes(&self, id: i64, notes: Option<String>) -> AppResult<Option<TimeEntry>> {
        let sql = format!(
            "UPDATE time_entries SET notes = $2 \
             WHERE id = $1 AND status <> 'approved' RETURNING {ENTRY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(id)
            .bind(notes)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TimeEntry::try_from).transpose()?)
    }

    async fn transition_entry(
        &self,
        id: i64,
        from: TimeEntryStatus,
        to: TimeEntryStatus,
    ) -> AppResult<Option<TimeEntry>> {
        let sql = format!(
            "UPDATE time_entries SET status = $3 \
             WHERE id = $1 AND status = $2 RETURNING {ENTRY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(id)
            .bind(from.as_ref())
            .bind(to.as_ref())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(TimeEntry::try_from).transpose()?)
    }

    #[instrument(skip(self, records, entry_ids), fields(records = records.len(), entries = entry_ids.len()))]
    async fn commit_payroll(
        &self,
        records: Vec<NewPayrollRecord>,
        entry_ids: &[i64],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PayrollRecord>> {
        let mut tx = self.pool.begin().await?;

        let approved = sqlx::query(
            "UPDATE time_entries SET status = 'approved' \
             WHERE id = ANY($1) AND status = 'completed'",
        )
        .bind(entry_ids)
        .execute(&mut *tx)
        .await?;

        if approved.rows_affected() != entry_ids.len() as u64 {
            // dropping the transaction rolls it back
            return Err(AppError::Conflict(
                "time entries changed while payroll was being processed".into(),
            ));
        }

        let sql = format!(
            "INSERT INTO payroll_records \
             (batch_id, worker_id, period_start, period_end, regular_hours, overtime_hours, \
              hourly_rate, gross_pay, federal_tax, state_tax, social_security_tax, medicare_tax, \
              net_pay, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 'draft', $14) \
             RETURNING {PAYROLL_COLUMNS}"
        );

        let mut created = Vec::with_capacity(records.len());
        for r in records {
            let row = sqlx::query_as::<_, PayrollRow>(&sql)
                .bind(r.batch_id)
                .bind(r.worker_id)
                .bind(r.period_start)
                .bind(r.period_end)
                .bind(r.regular_hours)
                .bind(r.overtime_hours)
                .bind(r.hourly_rate)
                .bind(r.gross_pay)
                .bind(r.withholding.federal)
                .bind(r.withholding.state)
                .bind(r.withholding.social_security)
                .bind(r.withholding.medicare)
                .bind(r.net_pay)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
            created.push(PayrollRecord::try_from(row)?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn get_payroll(&self, id: i64) -> AppResult<Option<PayrollRecord>> {
        let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll_records WHERE id = $1");
        let row = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(PayrollRecord::try_from).transpose()?)
    }

    async fn list_payroll(
        &self,
        worker_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<PayrollRecord>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payroll_records WHERE ($1::BIGINT IS NULL OR worker_id = $1)",
        )
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {PAYROLL_COLUMNS} FROM payroll_records \
             WHERE ($1::BIGINT IS NULL OR worker_id = $1) \
             ORDER BY period_start DESC, id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(worker_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((convert_all(rows)?, total))
    }

    async fn set_payroll_status(
        &self,
        id: i64,
        from: PayrollStatus,
        to: PayrollStatus,
    ) -> AppResult<Option<PayrollRecord>> {
        let sql = format!(
            "UPDATE payroll_records SET status = $3 \
             WHERE id = $1 AND status = $2 RETURNING {PAYROLL_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PayrollRow>(&sql)
            .bind(id)
            .bind(from.as_ref())
            .bind(to.as_ref())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(PayrollRecord::try_from).transpose()?)
    }

    async fn record_ping(
        &self,
        worker_id: i64,
        coordinate: Coordinate,
        accuracy_meters: Option<f64>,
        recorded_at: DateTime<Utc>,
    ) -> AppResult<LocationPing> {
        let sql = format!(
            "INSERT INTO location_pings (worker_id, lat, lng, accuracy_meters, recorded_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PingRow>(&sql)
            .bind(worker_id)
            .bind(coordinate.lat)
            .bind(coordinate.lng)
            .bind(accuracy_meters)
            .bind(recorded_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn location_history(
        &self,
        worker_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<LocationPing>> {
        let sql = format!(
            "SELECT {PING_COLUMNS} FROM ( \
                SELECT {PING_COLUMNS} FROM location_pings \
                WHERE worker_id = $1 \
                  AND ($2::TIMESTAMPTZ IS NULL OR recorded_at >= $2) \
                  AND ($3::TIMESTAMPTZ IS NULL OR recorded_at <= $3) \
                ORDER BY recorded_at DESC, id DESC LIMIT $4 \
             ) newest ORDER BY recorded_at, id"
        );
        let rows = sqlx::query_as::<_, PingRow>(&sql)
            .bind(worker_id)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(LocationPing::from).collect())
    }

    async fn latest_pings(&self, since: DateTime<Utc>) -> AppResult<Vec<LocationPing>> {
        let sql = format!(
            "SELECT DISTINCT ON (worker_id) {PING_COLUMNS} FROM location_pings \
             WHERE recorded_at >= $1 ORDER BY worker_id, recorded_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, PingRow>(&sql)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(LocationPing::from).collect())
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
