use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{EntryFilter, Repository};
use crate::error::{AppError, AppResult};
use crate::geo::Coordinate;
use crate::model::{
    location::LocationPing,
    payroll::{NewPayrollRecord, PayrollRecord, PayrollStatus},
    time_entry::{NewTimeEntry, TimeEntry, TimeEntryStatus},
    worker::{AttendanceStatus, GeofenceStatus, NewWorker, Worker, WorkerUpdate},
};

#[derive(Default)]
struct Tables {
    workers: BTreeMap<i64, Worker>,
    entries: BTreeMap<i64, TimeEntry>,
    payroll: BTreeMap<i64, PayrollRecord>,
    pings: Vec<LocationPing>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store used by tests and when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn worker_missing(id: i64) -> AppError {
    AppError::NotFound(format!("worker {id} not found"))
}

#[async_trait]
impl Repository for MemoryStore {
    async fn create_worker(&self, worker: NewWorker, now: DateTime<Utc>) -> AppResult<Worker> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        let worker = Worker {
            id,
            name: worker.name,
            email: worker.email,
            phone: worker.phone,
            position: worker.position,
            hourly_rate: worker.hourly_rate,
            location: None,
            attendance_status: AttendanceStatus::ClockedOut,
            geofence_status: GeofenceStatus::OutOfRange,
            current_zone: None,
            active: true,
            hire_date: worker.hire_date,
            created_at: now,
            updated_at: now,
        };
        t.workers.insert(id, worker.clone());
        Ok(worker)
    }

    async fn get_worker(&self, id: i64) -> AppResult<Option<Worker>> {
        Ok(self.tables.read().await.workers.get(&id).cloned())
    }

    async fn list_workers(&self, active_only: bool) -> AppResult<Vec<Worker>> {
        let t = self.tables.read().await;
        Ok(t.workers
            .values()
            .filter(|w| !active_only || w.active)
            .cloned()
            .collect())
    }

    async fn update_worker(
        &self,
        id: i64,
        update: WorkerUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Worker>> {
        let mut t = self.tables.write().await;
        Ok(t.workers.get_mut(&id).map(|w| {
            update.apply(w);
            w.updated_at = now;
            w.clone()
        }))
    }

    async fn set_attendance_status(
        &self,
        id: i64,
        status: AttendanceStatus,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut t = self.tables.write().await;
        let w = t.workers.get_mut(&id).ok_or_else(|| worker_missing(id))?;
        w.attendance_status = status;
        w.updated_at = now;
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
        let mut t = self.tables.write().await;
        let w = t.workers.get_mut(&id).ok_or_else(|| worker_missing(id))?;
        w.location = Some(coordinate);
        w.geofence_status = geofence;
        w.current_zone = zone.map(str::to_owned);
        w.updated_at = now;
        Ok(())
    }

    async fn insert_entry(&self, entry: NewTimeEntry) -> AppResult<TimeEntry> {
        let mut t = self.tables.write().await;
        if t
            .entries
            .values()
            .any(|e| e.worker_id == entry.worker_id && e.is_active())
        {
            return Err(AppError::Conflict(format!(
                "worker {} already has an active time entry",
                entry.worker_id
            )));
        }
        let id = t.next_id();
        let stored = TimeEntry {
            id,
            worker_id: entry.worker_id,
            work_date: entry.work_date,
            clock_in: entry.clock_in,
            clock_out: None,
            break_start: None,
            break_end: None,
            total_hours: None,
            hourly_rate: entry.hourly_rate,
            overtime_rate: entry.overtime_rate,
            overtime_hours: None,
            total_pay: None,
            location: entry.location,
            notes: entry.notes,
            status: TimeEntryStatus::Active,
        };
        t.entries.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_entry(&self, id: i64) -> AppResult<Option<TimeEntry>> {
        Ok(self.tables.read().await.entries.get(&id).cloned())
    }

    async fn active_entry(&self, worker_id: i64) -> AppResult<Option<TimeEntry>> {
        let t = self.tables.read().await;
        Ok(t.entries
            .values()
            .find(|e| e.worker_id == worker_id && e.is_active())
            .cloned())
    }

    async fn list_active_entries(&self) -> AppResult<Vec<TimeEntry>> {
        let t = self.tables.read().await;
        Ok(t.entries.values().filter(|e| e.is_active()).cloned().collect())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> AppResult<Vec<TimeEntry>> {
        let t = self.tables.read().await;
        Ok(t.entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn save_entry(&self, entry: &TimeEntry, expected: TimeEntryStatus) -> AppResult<()> {
        let mut t = self.tables.write().await;
        match t.entries.get_mut(&entry.id) {
            Some(slot) if slot.status == expected => {
                *slot = entry.clone();
                Ok(())
            }
            Some(slot) => Err(AppError::Conflict(format!(
                "time entry {} is {} now, expected {expected}",
                entry.id, slot.status
            ))),
            None => Err(AppError::NotFound(format!("time entry {} not found", entry.id))),
        }
    }

    async fn update_entry_notes(&self, id: i64, notes: Option<String>) -> AppResult<Option<TimeEntry>> {
        let mut t = self.tables.write().await;
        Ok(t.entries
            .get_mut(&id)
            .filter(|e| e.status != TimeEntryStatus::Approved)
            .map(|e| {
                e.notes = notes;
                e.clone()
            }))
    }

    async fn transition_entry(
        &self,
        id: i64,
        from: TimeEntryStatus,
        to: TimeEntryStatus,
    ) -> AppResult<Option<TimeEntry>> {
        let mut t = self.tables.write().await;
        Ok(t.entries
            .get_mut(&id)
            .filter(|e| e.status == from)
            .map(|e| {
                e.status = to;
                e.clone()
            }))
    }

    async fn commit_payroll(
        &self,
        records: Vec<NewPayrollRecord>,
        entry_ids: &[i64],
        now: DateTime<Utc>,
    ) -> AppResult<Vec<PayrollRecord>> {
        let mut t = self.tables.write().await;

        // validate everything before touching state so a failure leaves nothing behind
        for id in entry_ids {
            match t.entries.get(id) {
                Some(e) if e.status == TimeEntryStatus::Completed => {}
                Some(_) => {
                    return Err(AppError::Conflict(format!(
                        "time entry {id} is no longer completed"
                    )));
                }
                None => return Err(AppError::NotFound(format!("time entry {id} not found"))),
            }
        }

        let mut created = Vec::with_capacity(records.len());
        for r in records {
            let id = t.next_id();
            let record = PayrollRecord {
                id,
                batch_id: r.batch_id,
                worker_id: r.worker_id,
                period_start: r.period_start,
                period_end: r.period_end,
                regular_hours: r.regular_hours,
                overtime_hours: r.overtime_hours,
                hourly_rate: r.hourly_rate,
                gross_pay: r.gross_pay,
                withholding: r.withholding,
                net_pay: r.net_pay,
                status: PayrollStatus::Draft,
                created_at: now,
            };
            t.payroll.insert(id, record.clone());
            created.push(record);
        }
        for id in entry_ids {
            if let Some(e) = t.entries.get_mut(id) {
                e.status = TimeEntryStatus::Approved;
            }
        }
        Ok(created)
    }

    async fn get_payroll(&self, id: i64) -> AppResult<Option<PayrollRecord>> {
        Ok(self.tables.read().await.payroll.get(&id).cloned())
    }

    async fn list_payroll(
        &self,
        worker_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<PayrollRecord>, i64)> {
        let t = self.tables.read().await;
        let mut matching: Vec<_> = t
            .payroll
            .values()
            .filter(|r| worker_id.is_none_or(|w| r.worker_id == w))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.period_start.cmp(&a.period_start).then(b.id.cmp(&a.id)));
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn set_payroll_status(
        &self,
        id: i64,
        from: PayrollStatus,
        to: PayrollStatus,
    ) -> AppResult<Option<PayrollRecord>> {
        let mut t = self.tables.write().await;
        Ok(t.payroll
            .get_mut(&id)
            .filter(|r| r.status == from)
            .map(|r| {
                r.status = to;
                r.clone()
            }))
    }

    async fn record_ping(
        &self,
        worker_id: i64,
        coordinate: Coordinate,
        accuracy_meters: Option<f64>,
        recorded_at: DateTime<Utc>,
    ) -> AppResult<LocationPing> {
        let mut t = self.tables.write().await;
        let id = t.next_id();
        let ping = LocationPing {
            id,
            worker_id,
            coordinate,
            accuracy_meters,
            recorded_at,
        };
        t.pings.push(ping.clone());
        Ok(ping)
    }

    async fn location_history(
        &self,
        worker_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> AppResult<Vec<LocationPing>> {
        let t = self.tables.read().await;
        let mut pings: Vec<_> = t
            .pings
            .iter()
            .filter(|p| p.worker_id == worker_id)
            .filter(|p| from.is_none_or(|f| p.recorded_at >= f))
            .filter(|p| to.is_none_or(|x| p.recorded_at <= x))
            .cloned()
            .collect();
        pings.sort_by_key(|p| (p.recorded_at, p.id));
        // keep the newest `limit`, still oldest first
        let skip = pings.len().saturating_sub(limit.max(0) as usize);
        Ok(pings.split_off(skip))
    }

    async fn latest_pings(&self, since: DateTime<Utc>) -> AppResult<Vec<LocationPing>> {
        let t = self.tables.read().await;
        let mut latest: HashMap<i64, &LocationPing> = HashMap::new();
        for p in t.pings.iter().filter(|p| p.recorded_at >= since) {
            let newer = latest
                .get(&p.worker_id)
                .is_none_or(|cur| (p.recorded_at, p.id) > (cur.recorded_at, cur.id));
            if newer {
                latest.insert(p.worker_id, p);
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, hour, 0, 0).unwrap()
    }

    fn new_entry(worker_id: i64) -> NewTimeEntry {
        NewTimeEntry {
            worker_id,
            work_date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            clock_in: at(7),
            hourly_rate: 20.0,
            overtime_rate: 30.0,
            location: None,
            notes: None,
        }
    }

    #[actix_web::test]
    async fn second_active_entry_is_rejected() {
        let store = MemoryStore::new();
        store.insert_entry(new_entry(1)).await.unwrap();

        let err = store.insert_entry(new_entry(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // a different worker is unaffected
        assert!(store.insert_entry(new_entry(2)).await.is_ok());
    }

    #[actix_web::test]
    async fn closed_entry_frees_the_slot() {
        let store = MemoryStore::new();
        let mut entry = store.insert_entry(new_entry(1)).await.unwrap();
        entry.clock_out = Some(at(15));
        entry.status = TimeEntryStatus::Completed;
        store.save_entry(&entry, TimeEntryStatus::Active).await.unwrap();

        assert!(store.active_entry(1).await.unwrap().is_none());
        assert!(store.insert_entry(new_entry(1)).await.is_ok());
    }

    #[actix_web::test]
    async fn commit_payroll_refuses_non_completed_entries() {
        let store = MemoryStore::new();
        let entry = store.insert_entry(new_entry(1)).await.unwrap();

        let err = store.commit_payroll(vec![], &[entry.id], at(18)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            store.get_entry(entry.id).await.unwrap().unwrap().status,
            TimeEntryStatus::Active
        );
    }

    #[actix_web::test]
    async fn latest_pings_keeps_one_per_worker() {
        let store = MemoryStore::new();
        let c = |lat| Coordinate { lat, lng: -77.0 };
        store.record_ping(1, c(37.0), None, at(7)).await.unwrap();
        store.record_ping(1, c(37.1), None, at(8)).await.unwrap();
        store.record_ping(2, c(38.0), None, at(5)).await.unwrap();

        let latest = store.latest_pings(at(6)).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].coordinate, c(37.1));
    }

    #[actix_web::test]
    async fn stale_write_cannot_undo_approval() {
        let store = MemoryStore::new();
        let mut entry = store.insert_entry(new_entry(1)).await.unwrap();
        entry.clock_out = Some(at(15));
        entry.status = TimeEntryStatus::Completed;
        store.save_entry(&entry, TimeEntryStatus::Active).await.unwrap();

        // a reader still holding the completed snapshot
        let mut stale = store.get_entry(entry.id).await.unwrap().unwrap();
        store.commit_payroll(vec![], &[entry.id], at(18)).await.unwrap();

        stale.notes = Some("late start".into());
        let err = store
            .save_entry(&stale, TimeEntryStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(store.update_entry_notes(entry.id, None).await.unwrap().is_none());
        assert!(store
            .transition_entry(entry.id, TimeEntryStatus::Completed, TimeEntryStatus::Approved)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store.get_entry(entry.id).await.unwrap().unwrap().status,
            TimeEntryStatus::Approved
        );
    }

    #[actix_web::test]
    async fn payroll_status_only_moves_from_expected() {
        let store = MemoryStore::new();
        let record = NewPayrollRecord {
            batch_id: uuid::Uuid::new_v4(),
            worker_id: 1,
            period_start: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
            regular_hours: 8.0,
            overtime_hours: 0.0,
            hourly_rate: 20.0,
            gross_pay: 160.0,
            withholding: crate::service::payroll::withholding_for(160.0),
            net_pay: 160.0 - crate::service::payroll::withholding_for(160.0).total(),
        };
        let id = store.commit_payroll(vec![record], &[], at(18)).await.unwrap()[0].id;

        let paid = store
            .set_payroll_status(id, PayrollStatus::Draft, PayrollStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.map(|r| r.status), Some(PayrollStatus::Paid));
        assert!(store
            .set_payroll_status(id, PayrollStatus::Draft, PayrollStatus::Paid)
            .await
            .unwrap()
            .is_none());
    }

    #[actix_web::test]
    async fn history_limit_keeps_the_newest_pings() {
        let store = MemoryStore::new();
        let c = |lat| Coordinate { lat, lng: -77.0 };
        for (hour, lat) in [(7, 37.0), (8, 37.1), (9, 37.2)] {
            store.record_ping(1, c(lat), None, at(hour)).await.unwrap();
        }

        let pings = store.location_history(1, None, None, 2).await.unwrap();
        let lats: Vec<f64> = pings.iter().map(|p| p.coordinate.lat).collect();
        assert_eq!(lats, vec![37.1, 37.2]);
    }
}
