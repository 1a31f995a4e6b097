use anyhow::Result;
use chrono::Duration as ChronoDuration;
use moka::{Expiry, future::Cache};
use std::time::{Duration, Instant};

use crate::geo::Coordinate;
use crate::service::clock::Clock;
use crate::store::Repository;

#[derive(Debug, Clone, Copy)]
struct TrackedLocation {
    coordinate: Coordinate,
    lifetime: Duration,
}

/// Each entry lives for the lifetime it was stored with. A new ping for the
/// same worker restarts the clock.
struct RemainingLifetime;

impl Expiry<i64, TrackedLocation> for RemainingLifetime {
    fn expire_after_create(
        &self,
        _worker_id: &i64,
        value: &TrackedLocation,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.lifetime)
    }

    fn expire_after_update(
        &self,
        _worker_id: &i64,
        value: &TrackedLocation,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.lifetime)
    }
}

/// Last known coordinate per worker. Entries expire after the TTL so a
/// phone that stops reporting stops driving auto clock actions.
#[derive(Clone)]
pub struct LocationCache {
    cache: Cache<i64, TrackedLocation>,
    ttl: Duration,
}

impl LocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(10_000)
                .expire_after(RemainingLifetime)
                .build(),
            ttl,
        }
    }

    pub async fn remember(&self, worker_id: i64, coordinate: Coordinate) {
        let tracked = TrackedLocation {
            coordinate,
            lifetime: self.ttl,
        };
        self.cache.insert(worker_id, tracked).await;
    }

    pub async fn forget(&self, worker_id: i64) {
        self.cache.invalidate(&worker_id).await;
    }

    /// Fresh coordinates of every tracked worker, ordered by worker id.
    pub fn snapshot(&self) -> Vec<(i64, Coordinate)> {
        let mut all: Vec<_> = self
            .cache
            .iter()
            .map(|(id, t)| (*id, t.coordinate))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Batch insert concurrently
    async fn batch_remember(&self, batch: &[(i64, TrackedLocation)]) {
        let futures: Vec<_> = batch
            .iter()
            .map(|(id, t)| self.cache.insert(*id, *t))
            .collect();

        futures::future::join_all(futures).await;
    }

    /// Seeds the cache with pings still inside the TTL window. A ping keeps
    /// only what is left of its TTL, so a warm restart never extends it.
    pub async fn warmup(
        &self,
        repo: &dyn Repository,
        clock: &dyn Clock,
        batch_size: usize,
    ) -> Result<usize> {
        let now = clock.now();
        let since = now - ChronoDuration::from_std(self.ttl)?;
        let pings = repo.latest_pings(since).await?;

        let latest: Vec<_> = pings
            .iter()
            .filter_map(|p| {
                let age = (now - p.recorded_at).to_std().unwrap_or(Duration::ZERO);
                let lifetime = self.ttl.saturating_sub(age);
                (!lifetime.is_zero()).then_some((
                    p.worker_id,
                    TrackedLocation {
                        coordinate: p.coordinate,
                        lifetime,
                    },
                ))
            })
            .collect();
        for batch in latest.chunks(batch_size.max(1)) {
            self.batch_remember(batch).await;
        }

        tracing::info!(
            workers = latest.len(),
            "Location cache warmup complete"
        );
        Ok(latest.len())
    }
}
