use std::sync::Arc;

use crate::config::Config;
use crate::geo::GeofenceZone;
use crate::service::{
    attendance::AttendanceService, clock::Clock, ledger::TimeEntryLedger,
    location::LocationTracker, payroll::PayrollProcessor,
};
use crate::store::Repository;
use crate::utils::location_cache::LocationCache;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<TimeEntryLedger>,
    pub attendance: Arc<AttendanceService>,
    pub payroll: Arc<PayrollProcessor>,
    pub locations: Arc<LocationTracker>,
    pub location_cache: LocationCache,
}

impl AppState {
    pub fn build(
        config: &Config,
        repo: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
        zones: Vec<GeofenceZone>,
    ) -> Self {
        let zones = Arc::new(zones);
        let location_cache = LocationCache::new(config.location_ttl);
        let ledger = Arc::new(TimeEntryLedger::new(repo.clone(), config.work_offset));

        Self {
            attendance: Arc::new(AttendanceService::new(
                repo.clone(),
                ledger.clone(),
                clock.clone(),
                zones.clone(),
            )),
            payroll: Arc::new(PayrollProcessor::new(repo.clone(), ledger.clone(), clock.clone())),
            locations: Arc::new(LocationTracker::new(
                repo.clone(),
                clock.clone(),
                zones,
                location_cache.clone(),
            )),
            ledger,
            location_cache,
            repo,
            clock,
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::service::clock::testing::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{FixedOffset, TimeZone, Utc};
    use std::time::Duration;

    pub fn test_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".into(),
            database_url: None,
            db_max_connections: 1,
            run_migrations: false,
            api_prefix: "/api".into(),
            rate_protected_per_min: 1000,
            geofence_poll: Duration::from_secs(30),
            location_ttl: Duration::from_secs(300),
            zones_path: None,
            work_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
            log_dir: "logs".into(),
            log_level: tracing::Level::DEBUG,
        }
    }

    /// In-memory state with a hand-driven clock.
    pub fn test_state() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 11, 0, 0).unwrap(),
        ));
        let zones = vec![
            GeofenceZone::new(
                "Main Shop",
                crate::geo::Coordinate { lat: 37.5407, lng: -77.4360 },
                150.0,
            )
            .unwrap(),
        ];
        let state = AppState::build(
            &test_config(),
            Arc::new(MemoryStore::new()),
            clock.clone(),
            zones,
        );
        (state, clock)
    }
}
