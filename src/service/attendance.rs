use serde::Serialize;
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::geo::{Coordinate, GeofenceZone, geofence};
use crate::model::time_entry::{LocationSnapshot, TimeEntry};
use crate::model::worker::{AttendanceStatus, Worker};
use crate::service::clock::Clock;
use crate::service::ledger::TimeEntryLedger;
use crate::store::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceAction {
    ClockIn,
    ClockOut,
    StartBreak,
    EndBreak,
    StartTravel,
    EndTravel,
}

impl AttendanceAction {
    fn verb(self) -> &'static str {
        match self {
            AttendanceAction::ClockIn => "clock in",
            AttendanceAction::ClockOut => "clock out",
            AttendanceAction::StartBreak => "start a break",
            AttendanceAction::EndBreak => "end a break",
            AttendanceAction::StartTravel => "start traveling",
            AttendanceAction::EndTravel => "stop traveling",
        }
    }
}

/// What caused a transition, kept for the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransitionSource {
    Manual,
    Geofence,
}

/// Allowed moves between attendance states.
pub fn next_status(
    current: AttendanceStatus,
    action: AttendanceAction,
) -> AppResult<AttendanceStatus> {
    use AttendanceAction::*;
    use AttendanceStatus::*;

    match (current, action) {
        (ClockedOut, ClockIn) => Ok(ClockedIn),
        (_, ClockOut) => Ok(ClockedOut),
        (ClockedIn, StartBreak) => Ok(OnBreak),
        (OnBreak, EndBreak) => Ok(ClockedIn),
        (ClockedIn, StartTravel) => Ok(Traveling),
        (Traveling, EndTravel) => Ok(ClockedIn),
        (from, action) => Err(AppError::invalid_transition(from, action.verb())),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceUpdate {
    pub worker_id: i64,
    pub status: AttendanceStatus,
    pub entry: Option<TimeEntry>,
}

pub struct AttendanceService {
    repo: Arc<dyn Repository>,
    ledger: Arc<TimeEntryLedger>,
    clock: Arc<dyn Clock>,
    zones: Arc<Vec<GeofenceZone>>,
    // serializes transitions so a manual action and the monitor cannot interleave
    transitions: Mutex<()>,
}

impl AttendanceService {
    pub fn new(
        repo: Arc<dyn Repository>,
        ledger: Arc<TimeEntryLedger>,
        clock: Arc<dyn Clock>,
        zones: Arc<Vec<GeofenceZone>>,
    ) -> Self {
        Self {
            repo,
            ledger,
            clock,
            zones,
            transitions: Mutex::new(()),
        }
    }

    async fn worker(&self, worker_id: i64) -> AppResult<Worker> {
        self.repo
            .get_worker(worker_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("worker {worker_id} not found")))
    }

    async fn active_entry(&self, worker: &Worker, action: AttendanceAction) -> AppResult<TimeEntry> {
        self.ledger
            .active_for(worker.id)
            .await?
            .ok_or_else(|| AppError::invalid_transition("no active time entry", action.verb()))
    }

    async fn set_status(&self, worker_id: i64, status: AttendanceStatus) -> AppResult<()> {
        self.repo
            .set_attendance_status(worker_id, status, self.clock.now())
            .await
    }

    pub async fn clock_in(
        &self,
        worker_id: i64,
        source: TransitionSource,
        location: Option<LocationSnapshot>,
    ) -> AppResult<AttendanceUpdate> {
        let _guard = self.transitions.lock().await;
        self.clock_in_locked(worker_id, source, location).await
    }

    async fn clock_in_locked(
        &self,
        worker_id: i64,
        source: TransitionSource,
        location: Option<LocationSnapshot>,
    ) -> AppResult<AttendanceUpdate> {
        let worker = self.worker(worker_id).await?;
        if !worker.active {
            return Err(AppError::Validation(format!("worker {worker_id} is inactive")));
        }
        let status = next_status(worker.attendance_status, AttendanceAction::ClockIn)?;

        let location = location.or_else(|| {
            worker.location.map(|coordinate| LocationSnapshot {
                coordinate,
                zone: worker.current_zone.clone(),
            })
        });
        let entry = self
            .ledger
            .start_entry(&worker, self.clock.now(), location)
            .await?;
        self.set_status(worker_id, status).await?;

        info!(worker_id, source = %source, entry_id = entry.id, "Clocked in");
        Ok(AttendanceUpdate {
            worker_id,
            status,
            entry: Some(entry),
        })
    }

    /// Closes the active entry. Without one this only settles the status.
    pub async fn clock_out(&self, worker_id: i64, source: TransitionSource) -> AppResult<AttendanceUpdate> {
        let _guard = self.transitions.lock().await;
        self.clock_out_locked(worker_id, source).await
    }

    async fn clock_out_locked(&self, worker_id: i64, source: TransitionSource) -> AppResult<AttendanceUpdate> {
        let worker = self.worker(worker_id).await?;
        let status = next_status(worker.attendance_status, AttendanceAction::ClockOut)?;

        let entry = match self.ledger.active_for(worker_id).await? {
            Some(active) => Some(self.ledger.close_entry(active, self.clock.now()).await?),
            None => {
                debug!(worker_id, source = %source, "Clock-out without an active entry");
                None
            }
        };
        if worker.attendance_status != status {
            self.set_status(worker_id, status).await?;
        }

        if let Some(e) = &entry {
            info!(worker_id, source = %source, entry_id = e.id, "Clocked out");
        }
        Ok(AttendanceUpdate {
            worker_id,
            status,
            entry,
        })
    }

    pub async fn start_break(&self, worker_id: i64) -> AppResult<AttendanceUpdate> {
        self.entry_transition(worker_id, AttendanceAction::StartBreak).await
    }

    pub async fn end_break(&self, worker_id: i64) -> AppResult<AttendanceUpdate> {
        self.entry_transition(worker_id, AttendanceAction::EndBreak).await
    }

    pub async fn start_travel(&self, worker_id: i64) -> AppResult<AttendanceUpdate> {
        self.entry_transition(worker_id, AttendanceAction::StartTravel).await
    }

    pub async fn end_travel(&self, worker_id: i64) -> AppResult<AttendanceUpdate> {
        self.entry_transition(worker_id, AttendanceAction::EndTravel).await
    }

    /// Manual transitions that keep the entry open.
    async fn entry_transition(
        &self,
        worker_id: i64,
        action: AttendanceAction,
    ) -> AppResult<AttendanceUpdate> {
        let _guard = self.transitions.lock().await;

        let worker = self.worker(worker_id).await?;
        let status = next_status(worker.attendance_status, action)?;
        let entry = self.active_entry(&worker, action).await?;
        let now = self.clock.now();

        let entry = match action {
            AttendanceAction::StartBreak => self.ledger.record_break_start(entry, now).await?,
            AttendanceAction::EndBreak => self.ledger.record_break_end(entry, now).await?,
            _ => entry,
        };
        self.set_status(worker_id, status).await?;

        info!(worker_id, status = %status, "Attendance updated");
        Ok(AttendanceUpdate {
            worker_id,
            status,
            entry: Some(entry),
        })
    }

    /// Automatic clock-in on entering a zone and clock-out on leaving one.
    /// Workers on break or traveling are left alone.
    pub async fn apply_geofence(
        &self,
        worker_id: i64,
        point: Coordinate,
    ) -> AppResult<Option<AttendanceUpdate>> {
        let _guard = self.transitions.lock().await;

        let worker = self.worker(worker_id).await?;
        if !worker.active {
            return Ok(None);
        }
        let eval = geofence::evaluate(point, &self.zones);

        match (worker.attendance_status, eval.in_range()) {
            (AttendanceStatus::ClockedOut, true) => {
                let snapshot = LocationSnapshot {
                    coordinate: point,
                    zone: eval.zone_name().map(str::to_owned),
                };
                match self
                    .clock_in_locked(worker_id, TransitionSource::Geofence, Some(snapshot))
                    .await
                {
                    Ok(update) => Ok(Some(update)),
                    Err(AppError::Conflict(msg)) => {
                        warn!(worker_id, %msg, "Auto clock-in skipped");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
            (AttendanceStatus::ClockedIn, false) => self
                .clock_out_locked(worker_id, TransitionSource::Geofence)
                .await
                .map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::time_entry::TimeEntryStatus;
    use crate::model::worker::NewWorker;
    use crate::service::clock::testing::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

    struct Fixture {
        service: AttendanceService,
        clock: Arc<ManualClock>,
        worker_id: i64,
    }

    fn shop() -> GeofenceZone {
        GeofenceZone::new("Shop", Coordinate { lat: 37.0, lng: -77.0 }, 200.0).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 11, 0, 0).unwrap()
    }

    async fn fixture() -> Fixture {
        let repo: Arc<dyn Repository> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let ledger = Arc::new(TimeEntryLedger::new(repo.clone(), offset));

        let worker = repo
            .create_worker(
                NewWorker {
                    name: "Dale Whitmore".into(),
                    email: None,
                    phone: None,
                    position: "Paver Operator".into(),
                    hourly_rate: 20.0,
                    hire_date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
                },
                t0(),
            )
            .await
            .unwrap();

        Fixture {
            service: AttendanceService::new(repo, ledger, clock.clone(), Arc::new(vec![shop()])),
            clock,
            worker_id: worker.id,
        }
    }

    #[test]
    fn state_table() {
        use AttendanceAction::*;
        use AttendanceStatus::*;

        assert_eq!(next_status(ClockedOut, ClockIn).unwrap(), ClockedIn);
        assert_eq!(next_status(ClockedIn, StartBreak).unwrap(), OnBreak);
        assert_eq!(next_status(OnBreak, EndBreak).unwrap(), ClockedIn);
        assert_eq!(next_status(ClockedIn, StartTravel).unwrap(), Traveling);
        assert_eq!(next_status(Traveling, EndTravel).unwrap(), ClockedIn);
        assert_eq!(next_status(OnBreak, ClockOut).unwrap(), ClockedOut);
        assert_eq!(next_status(ClockedOut, ClockOut).unwrap(), ClockedOut);

        assert!(next_status(ClockedIn, ClockIn).is_err());
        assert!(next_status(OnBreak, ClockIn).is_err());
        assert!(next_status(ClockedOut, StartBreak).is_err());
        assert!(next_status(Traveling, StartBreak).is_err());
    }

    #[actix_web::test]
    async fn eight_hour_shift_pays_straight_time() {
        let f = fixture().await;
        f.service
            .clock_in(f.worker_id, TransitionSource::Manual, None)
            .await
            .unwrap();
        f.clock.advance(Duration::hours(8));

        let update = f
            .service
            .clock_out(f.worker_id, TransitionSource::Manual)
            .await
            .unwrap();
        let entry = update.entry.unwrap();

        assert_eq!(update.status, AttendanceStatus::ClockedOut);
        assert_eq!(entry.overtime_hours, Some(0.0));
        assert_eq!(entry.total_pay, Some(8.0 * 20.0));
        assert_eq!(entry.overtime_rate, 30.0);
    }

    #[actix_web::test]
    async fn nine_hour_shift_has_one_overtime_hour() {
        let f = fixture().await;
        f.service
            .clock_in(f.worker_id, TransitionSource::Manual, None)
            .await
            .unwrap();
        f.clock.advance(Duration::hours(9));

        let entry = f
            .service
            .clock_out(f.worker_id, TransitionSource::Manual)
            .await
            .unwrap()
            .entry
            .unwrap();

        assert_eq!(entry.overtime_hours, Some(1.0));
        assert_eq!(entry.total_pay, Some(8.0 * 20.0 + 1.0 * 20.0 * 1.5));
        assert_eq!(entry.status, TimeEntryStatus::Completed);
    }

    #[actix_web::test]
    async fn double_clock_in_is_an_invalid_transition() {
        let f = fixture().await;
        f.service
            .clock_in(f.worker_id, TransitionSource::Manual, None)
            .await
            .unwrap();

        let err = f
            .service
            .clock_in(f.worker_id, TransitionSource::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[actix_web::test]
    async fn clock_out_without_entry_is_a_no_op() {
        let f = fixture().await;
        let update = f
            .service
            .clock_out(f.worker_id, TransitionSource::Manual)
            .await
            .unwrap();

        assert!(update.entry.is_none());
        assert_eq!(update.status, AttendanceStatus::ClockedOut);
    }

    #[actix_web::test]
    async fn break_cycle_and_clock_out_from_break() {
        let f = fixture().await;
        f.service
            .clock_in(f.worker_id, TransitionSource::Manual, None)
            .await
            .unwrap();
        f.clock.advance(Duration::hours(3));

        let update = f.service.start_break(f.worker_id).await.unwrap();
        assert_eq!(update.status, AttendanceStatus::OnBreak);
        assert!(matches!(
            f.service.start_break(f.worker_id).await,
            Err(AppError::InvalidTransition { .. })
        ));

        f.clock.advance(Duration::minutes(30));
        let entry = f
            .service
            .clock_out(f.worker_id, TransitionSource::Manual)
            .await
            .unwrap()
            .entry
            .unwrap();

        assert_eq!(entry.break_end, entry.clock_out);
        assert_eq!(entry.total_hours, Some(3.5));
    }

    #[actix_web::test]
    async fn lunch_then_afternoon_break() {
        let f = fixture().await;
        f.service
            .clock_in(f.worker_id, TransitionSource::Manual, None)
            .await
            .unwrap();

        for _ in 0..2 {
            f.clock.advance(Duration::hours(2));
            f.service.start_break(f.worker_id).await.unwrap();
            f.clock.advance(Duration::minutes(15));
            let update = f.service.end_break(f.worker_id).await.unwrap();
            assert_eq!(update.status, AttendanceStatus::ClockedIn);
        }

        let entry = f
            .service
            .clock_out(f.worker_id, TransitionSource::Manual)
            .await
            .unwrap()
            .entry
            .unwrap();
        let second_break = entry.clock_in + Duration::minutes(2 * 60 + 15 + 2 * 60);
        assert_eq!(entry.break_start, Some(second_break));
        assert_eq!(entry.break_end, Some(second_break + Duration::minutes(15)));
        assert_eq!(entry.total_hours, Some(4.5));
    }

    #[actix_web::test]
    async fn geofence_drives_clock_in_and_out() {
        let f = fixture().await;
        let inside = Coordinate { lat: 37.0005, lng: -77.0 };
        let outside = Coordinate { lat: 37.1, lng: -77.0 };

        assert!(f.service.apply_geofence(f.worker_id, outside).await.unwrap().is_none());

        let update = f
            .service
            .apply_geofence(f.worker_id, inside)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.status, AttendanceStatus::ClockedIn);
        let snapshot = update.entry.unwrap().location.unwrap();
        assert_eq!(snapshot.zone.as_deref(), Some("Shop"));

        // still inside: nothing to do
        assert!(f.service.apply_geofence(f.worker_id, inside).await.unwrap().is_none());

        f.clock.advance(Duration::hours(2));
        let update = f
            .service
            .apply_geofence(f.worker_id, outside)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.status, AttendanceStatus::ClockedOut);
        assert_eq!(update.entry.unwrap().total_hours, Some(2.0));
    }

    #[actix_web::test]
    async fn traveling_worker_is_not_auto_clocked_out() {
        let f = fixture().await;
        f.service
            .clock_in(f.worker_id, TransitionSource::Manual, None)
            .await
            .unwrap();
        f.service.start_travel(f.worker_id).await.unwrap();

        let far = Coordinate { lat: 38.0, lng: -77.0 };
        assert!(f.service.apply_geofence(f.worker_id, far).await.unwrap().is_none());

        let update = f.service.end_travel(f.worker_id).await.unwrap();
        assert_eq!(update.status, AttendanceStatus::ClockedIn);
    }

    #[actix_web::test]
    async fn unknown_worker_is_not_found() {
        let f = fixture().await;
        let err = f
            .service
            .clock_in(f.worker_id + 100, TransitionSource::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
