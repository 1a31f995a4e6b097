use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::geo::distance::distance_miles;
use crate::geo::{Coordinate, GeofenceEvaluation, GeofenceZone, geofence};
use crate::model::location::{LocationHistory, LocationPing};
use crate::service::clock::Clock;
use crate::store::Repository;
use crate::utils::location_cache::LocationCache;

pub const DEFAULT_HISTORY_LIMIT: u32 = 500;
pub const MAX_HISTORY_LIMIT: u32 = 5_000;

/// Total path length over consecutive pings, in miles.
pub fn path_length_miles(pings: &[LocationPing]) -> f64 {
    pings
        .windows(2)
        .map(|w| distance_miles(w[0].coordinate, w[1].coordinate))
        .sum()
}

pub struct LocationTracker {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    zones: Arc<Vec<GeofenceZone>>,
    cache: LocationCache,
}

impl LocationTracker {
    pub fn new(
        repo: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
        zones: Arc<Vec<GeofenceZone>>,
        cache: LocationCache,
    ) -> Self {
        Self {
            repo,
            clock,
            zones,
            cache,
        }
    }

    pub fn zones(&self) -> &[GeofenceZone] {
        &self.zones
    }

    pub fn check(&self, point: Coordinate) -> AppResult<GeofenceEvaluation> {
        Ok(geofence::evaluate(point.validated()?, &self.zones))
    }

    /// Stores a ping and refreshes the worker's position and geofence status.
    pub async fn record(
        &self,
        worker_id: i64,
        point: Coordinate,
        accuracy_meters: Option<f64>,
    ) -> AppResult<(LocationPing, GeofenceEvaluation)> {
        let point = point.validated()?;
        if accuracy_meters.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Err(AppError::Validation("accuracy must be a non-negative number".into()));
        }
        if self.repo.get_worker(worker_id).await?.is_none() {
            return Err(AppError::NotFound(format!("worker {worker_id} not found")));
        }

        let now = self.clock.now();
        let ping = self
            .repo
            .record_ping(worker_id, point, accuracy_meters, now)
            .await?;
        let eval = geofence::evaluate(point, &self.zones);
        self.repo
            .set_worker_location(worker_id, point, eval.status, eval.zone_name(), now)
            .await?;
        self.cache.remember(worker_id, point).await;

        debug!(worker_id, status = %eval.status, zone = ?eval.zone_name(), "Location recorded");
        Ok((ping, eval))
    }

    pub async fn history(
        &self,
        worker_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> AppResult<LocationHistory> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(AppError::Validation("`from` must not be after `to`".into()));
            }
        }
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        let pings = self
            .repo
            .location_history(worker_id, from, to, limit as i64)
            .await?;

        Ok(LocationHistory {
            worker_id,
            distance_miles: path_length_miles(&pings),
            pings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::worker::{GeofenceStatus, NewWorker};
    use crate::service::clock::testing::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, NaiveDate, TimeZone};

    async fn tracker() -> (LocationTracker, Arc<ManualClock>, i64) {
        let repo: Arc<dyn Repository> = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap(),
        ));
        let worker = repo
            .create_worker(
                NewWorker {
                    name: "Tomas Reyes".into(),
                    email: None,
                    phone: None,
                    position: "Truck Driver".into(),
                    hourly_rate: 22.0,
                    hire_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                },
                clock.now(),
            )
            .await
            .unwrap();
        let zones = vec![
            GeofenceZone::new("Yard", Coordinate { lat: 37.0, lng: -77.0 }, 300.0).unwrap(),
        ];
        let tracker = LocationTracker::new(
            repo,
            clock.clone(),
            Arc::new(zones),
            LocationCache::new(std::time::Duration::from_secs(300)),
        );
        (tracker, clock, worker.id)
    }

    #[actix_web::test]
    async fn record_updates_worker_and_cache() {
        let (tracker, _, id) = tracker().await;
        let point = Coordinate { lat: 37.001, lng: -77.0 };

        let (ping, eval) = tracker.record(id, point, Some(5.0)).await.unwrap();
        assert_eq!(ping.worker_id, id);
        assert!(eval.in_range());

        let worker = tracker.repo.get_worker(id).await.unwrap().unwrap();
        assert_eq!(worker.location, Some(point));
        assert_eq!(worker.geofence_status, GeofenceStatus::InRange);
        assert_eq!(worker.current_zone.as_deref(), Some("Yard"));
        assert_eq!(tracker.cache.snapshot(), vec![(id, point)]);
    }

    #[actix_web::test]
    async fn record_rejects_bad_input() {
        let (tracker, _, id) = tracker().await;
        let bad = Coordinate { lat: 123.0, lng: 0.0 };
        assert!(matches!(tracker.record(id, bad, None).await, Err(AppError::Validation(_))));

        let ok = Coordinate { lat: 37.0, lng: -77.0 };
        assert!(matches!(tracker.record(id, ok, Some(-1.0)).await, Err(AppError::Validation(_))));
        assert!(matches!(tracker.record(id + 9, ok, None).await, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn history_sums_miles_in_order() {
        let (tracker, clock, id) = tracker().await;
        for lat in [37.0, 37.1, 37.2] {
            tracker
                .record(id, Coordinate { lat, lng: -77.0 }, None)
                .await
                .unwrap();
            clock.advance(Duration::minutes(5));
        }

        let history = tracker.history(id, None, None, None).await.unwrap();
        assert_eq!(history.pings.len(), 3);
        // 0.2 degrees of latitude is close to 13.8 miles
        assert!((history.distance_miles - 13.82).abs() < 0.1, "{}", history.distance_miles);

        let limited = tracker.history(id, None, None, Some(2)).await.unwrap();
        let lats: Vec<f64> = limited.pings.iter().map(|p| p.coordinate.lat).collect();
        assert_eq!(lats, vec![37.1, 37.2]);
    }
}
