use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::time_entry::{LocationSnapshot, NewTimeEntry, TimeEntry, TimeEntryStatus};
use crate::model::worker::Worker;
use crate::store::{EntryFilter, Repository};

/// Hours in a single entry before overtime starts.
pub const ENTRY_OVERTIME_THRESHOLD_HOURS: f64 = 8.0;
pub const OVERTIME_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryTotals {
    pub total_hours: f64,
    pub overtime_hours: f64,
    pub total_pay: f64,
}

/// Wall-clock hours between clock-in and clock-out. Breaks are not deducted.
pub fn entry_totals(clock_in: DateTime<Utc>, clock_out: DateTime<Utc>, rate: f64) -> EntryTotals {
    let seconds = (clock_out - clock_in).num_seconds().max(0);
    let total_hours = seconds as f64 / 3600.0;
    let overtime_hours = (total_hours - ENTRY_OVERTIME_THRESHOLD_HOURS).max(0.0);
    let regular_hours = total_hours - overtime_hours;

    EntryTotals {
        total_hours,
        overtime_hours,
        total_pay: regular_hours * rate + overtime_hours * rate * OVERTIME_MULTIPLIER,
    }
}

fn ensure_mutable(entry: &TimeEntry) -> AppResult<()> {
    if entry.status == TimeEntryStatus::Approved {
        return Err(AppError::Immutable(format!(
            "time entry {} is approved and can no longer change",
            entry.id
        )));
    }
    Ok(())
}

fn ensure_active(entry: &TimeEntry) -> AppResult<()> {
    ensure_mutable(entry)?;
    if !entry.is_active() {
        return Err(AppError::invalid_transition(entry.status, "change a closed entry"));
    }
    Ok(())
}

/// Append-mostly record of clock events per worker.
pub struct TimeEntryLedger {
    repo: Arc<dyn Repository>,
    work_offset: FixedOffset,
}

impl TimeEntryLedger {
    pub fn new(repo: Arc<dyn Repository>, work_offset: FixedOffset) -> Self {
        Self { repo, work_offset }
    }

    /// Calendar day of `at` in the company's local time.
    pub fn work_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.work_offset).date_naive()
    }

    pub async fn start_entry(
        &self,
        worker: &Worker,
        at: DateTime<Utc>,
        location: Option<LocationSnapshot>,
    ) -> AppResult<TimeEntry> {
        let entry = self
            .repo
            .insert_entry(NewTimeEntry {
                worker_id: worker.id,
                work_date: self.work_date(at),
                clock_in: at,
                hourly_rate: worker.hourly_rate,
                overtime_rate: worker.hourly_rate * OVERTIME_MULTIPLIER,
                location,
                notes: None,
            })
            .await?;

        info!(entry_id = entry.id, worker_id = worker.id, "Time entry opened");
        Ok(entry)
    }

    pub async fn close_entry(&self, mut entry: TimeEntry, at: DateTime<Utc>) -> AppResult<TimeEntry> {
        ensure_active(&entry)?;

        if entry.on_break() {
            entry.break_end = Some(at);
        }
        let totals = entry_totals(entry.clock_in, at, entry.hourly_rate);
        entry.clock_out = Some(at);
        entry.total_hours = Some(totals.total_hours);
        entry.overtime_hours = Some(totals.overtime_hours);
        entry.total_pay = Some(totals.total_pay);
        entry.status = TimeEntryStatus::Completed;

        self.repo.save_entry(&entry, TimeEntryStatus::Active).await?;

        info!(
            entry_id = entry.id,
            worker_id = entry.worker_id,
            total_hours = totals.total_hours,
            overtime_hours = totals.overtime_hours,
            "Time entry closed"
        );
        Ok(entry)
    }

    /// Starts a break. A later break in the same shift replaces the
    /// recorded one.
    pub async fn record_break_start(&self, mut entry: TimeEntry, at: DateTime<Utc>) -> AppResult<TimeEntry> {
        ensure_active(&entry)?;
        if entry.on_break() {
            return Err(AppError::invalid_transition("on break", "start a break"));
        }
        entry.break_start = Some(at);
        entry.break_end = None;
        self.repo.save_entry(&entry, TimeEntryStatus::Active).await?;
        Ok(entry)
    }

    pub async fn record_break_end(&self, mut entry: TimeEntry, at: DateTime<Utc>) -> AppResult<TimeEntry> {
        ensure_active(&entry)?;
        if !entry.on_break() {
            return Err(AppError::invalid_transition("not on break", "end a break"));
        }
        entry.break_end = Some(at);
        self.repo.save_entry(&entry, TimeEntryStatus::Active).await?;
        Ok(entry)
    }

    /// Entries whose work date falls in `[start, end]`.
    pub async fn list_by_period(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<TimeEntry>> {
        self.list(EntryFilter {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        })
        .await
    }

    pub async fn list(&self, filter: EntryFilter) -> AppResult<Vec<TimeEntry>> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if start > end {
                return Err(AppError::Validation(format!(
                    "period start {start} is after end {end}"
                )));
            }
        }
        self.repo.list_entries(&filter).await
    }

    pub async fn list_active(&self) -> AppResult<Vec<TimeEntry>> {
        self.repo.list_active_entries().await
    }

    pub async fn active_for(&self, worker_id: i64) -> AppResult<Option<TimeEntry>> {
        self.repo.active_entry(worker_id).await
    }

    pub async fn get(&self, id: i64) -> AppResult<TimeEntry> {
        self.repo
            .get_entry(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("time entry {id} not found")))
    }

    pub async fn update_notes(&self, id: i64, notes: Option<String>) -> AppResult<TimeEntry> {
        let entry = self.get(id).await?;
        ensure_mutable(&entry)?;

        // the store refuses the write if approval landed after the read
        self.repo
            .update_entry_notes(id, notes.filter(|n| !n.trim().is_empty()))
            .await?
            .ok_or_else(|| {
                AppError::Immutable(format!("time entry {id} is approved and can no longer change"))
            })
    }

    /// Approves a completed entry outside of a payroll run.
    pub async fn approve(&self, id: i64) -> AppResult<TimeEntry> {
        let entry = self.get(id).await?;
        match entry.status {
            TimeEntryStatus::Completed => {}
            TimeEntryStatus::Approved => {
                return Err(AppError::Immutable(format!("time entry {id} is already approved")));
            }
            TimeEntryStatus::Active => {
                return Err(AppError::invalid_transition(entry.status, "approve an entry"));
            }
        }

        let entry = self
            .repo
            .transition_entry(id, TimeEntryStatus::Completed, TimeEntryStatus::Approved)
            .await?
            .ok_or_else(|| AppError::Immutable(format!("time entry {id} is already approved")))?;
        info!(entry_id = id, worker_id = entry.worker_id, "Time entry approved");
        Ok(entry)
    }
}
