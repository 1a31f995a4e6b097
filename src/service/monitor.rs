use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::error::AppResult;
use crate::service::attendance::AttendanceService;
use crate::store::Repository;
use crate::utils::location_cache::LocationCache;

/// The single timer that turns fresh worker locations into automatic
/// clock-in and clock-out events.
pub struct GeofenceMonitor {
    attendance: Arc<AttendanceService>,
    repo: Arc<dyn Repository>,
    locations: LocationCache,
    interval: Duration,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub evaluated: usize,
    pub transitions: usize,
    pub failures: usize,
}

impl GeofenceMonitor {
    pub fn new(
        attendance: Arc<AttendanceService>,
        repo: Arc<dyn Repository>,
        locations: LocationCache,
        interval: Duration,
    ) -> Self {
        Self {
            attendance,
            repo,
            locations,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "Geofence monitor started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(summary) if summary.transitions > 0 || summary.failures > 0 => {
                            info!(
                                evaluated = summary.evaluated,
                                transitions = summary.transitions,
                                failures = summary.failures,
                                "Geofence sweep finished"
                            );
                        }
                        Ok(summary) => debug!(evaluated = summary.evaluated, "Geofence sweep finished"),
                        Err(e) => error!(error = %e, "Geofence sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Geofence monitor stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over every active worker with a fresh location.
    pub async fn tick(&self) -> AppResult<TickSummary> {
        let active: HashSet<i64> = self
            .repo
            .list_workers(true)
            .await?
            .into_iter()
            .map(|w| w.id)
            .collect();

        let mut summary = TickSummary::default();
        for (worker_id, point) in self.locations.snapshot() {
            if !active.contains(&worker_id) {
                continue;
            }
            summary.evaluated += 1;
            match self.attendance.apply_geofence(worker_id, point).await {
                Ok(Some(update)) => {
                    summary.transitions += 1;
                    info!(worker_id, status = %update.status, "Automatic attendance change");
                }
                Ok(None) => {}
                Err(e) => {
                    summary.failures += 1;
                    error!(error = %e, worker_id, "Geofence evaluation failed");
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Coordinate, GeofenceZone};
    use crate::model::worker::{AttendanceStatus, NewWorker, WorkerUpdate};
    use crate::service::clock::testing::ManualClock;
    use crate::service::ledger::TimeEntryLedger;
    use crate::store::MemoryStore;
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    async fn setup() -> (GeofenceMonitor, Arc<dyn Repository>, LocationCache, i64) {
        let repo: Arc<dyn Repository> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 11, 0, 0).unwrap(),
        ));
        let ledger = Arc::new(TimeEntryLedger::new(
            repo.clone(),
            FixedOffset::west_opt(5 * 3600).unwrap(),
        ));
        let zones = Arc::new(vec![
            GeofenceZone::new("Shop", Coordinate { lat: 37.0, lng: -77.0 }, 200.0).unwrap(),
        ]);
        let attendance = Arc::new(AttendanceService::new(repo.clone(), ledger, clock, zones));
        let locations = LocationCache::new(Duration::from_secs(300));

        let worker = repo
            .create_worker(
                NewWorker {
                    name: "Ana Brooks".into(),
                    email: None,
                    phone: None,
                    position: "Laborer".into(),
                    hourly_rate: 19.0,
                    hire_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                },
                Utc.with_ymd_and_hms(2026, 5, 4, 11, 0, 0).unwrap(),
            )
            .await
            .unwrap();

        let monitor = GeofenceMonitor::new(
            attendance,
            repo.clone(),
            locations.clone(),
            Duration::from_secs(30),
        );
        (monitor, repo, locations, worker.id)
    }

    #[actix_web::test]
    async fn repeated_ticks_clock_in_once() {
        let (monitor, repo, locations, id) = setup().await;
        locations.remember(id, Coordinate { lat: 37.0, lng: -77.0 }).await;

        let first = monitor.tick().await.unwrap();
        assert_eq!(first.transitions, 1);
        let second = monitor.tick().await.unwrap();
        assert_eq!(second, TickSummary { evaluated: 1, transitions: 0, failures: 0 });

        let worker = repo.get_worker(id).await.unwrap().unwrap();
        assert_eq!(worker.attendance_status, AttendanceStatus::ClockedIn);
        assert_eq!(repo.list_active_entries().await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn inactive_and_untracked_workers_are_skipped() {
        let (monitor, repo, locations, id) = setup().await;
        assert_eq!(monitor.tick().await.unwrap().evaluated, 0);

        locations.remember(id, Coordinate { lat: 37.0, lng: -77.0 }).await;
        repo.update_worker(
            id,
            WorkerUpdate {
                active: Some(false),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(monitor.tick().await.unwrap(), TickSummary::default());
    }

    #[actix_web::test]
    async fn run_stops_on_shutdown() {
        let (monitor, _, _, _) = setup().await;
        let (tx, rx) = watch::channel(false);
        let handle = actix_web::rt::spawn(monitor.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
