use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::payroll::{NewPayrollRecord, PayrollRecord, PayrollStatus, Withholding};
use crate::model::time_entry::{TimeEntry, TimeEntryStatus};
use crate::service::clock::Clock;
use crate::service::ledger::{OVERTIME_MULTIPLIER, TimeEntryLedger};
use crate::store::Repository;

/// Hours in a pay period before overtime starts.
pub const PERIOD_OVERTIME_THRESHOLD_HOURS: f64 = 40.0;

pub const FEDERAL_RATE: f64 = 0.12;
pub const STATE_RATE: f64 = 0.06;
pub const SOCIAL_SECURITY_RATE: f64 = 0.062;
pub const MEDICARE_RATE: f64 = 0.0145;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayBreakdown {
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub gross_pay: f64,
    pub withholding: Withholding,
    pub net_pay: f64,
}

pub fn withholding_for(gross: f64) -> Withholding {
    Withholding {
        federal: gross * FEDERAL_RATE,
        state: gross * STATE_RATE,
        social_security: gross * SOCIAL_SECURITY_RATE,
        medicare: gross * MEDICARE_RATE,
    }
}

pub fn compute_pay(total_hours: f64, rate: f64) -> PayBreakdown {
    let regular_hours = total_hours.min(PERIOD_OVERTIME_THRESHOLD_HOURS);
    let overtime_hours = (total_hours - PERIOD_OVERTIME_THRESHOLD_HOURS).max(0.0);
    let gross_pay = regular_hours * rate + overtime_hours * rate * OVERTIME_MULTIPLIER;
    let withholding = withholding_for(gross_pay);

    PayBreakdown {
        regular_hours,
        overtime_hours,
        gross_pay,
        withholding,
        net_pay: gross_pay - withholding.total(),
    }
}

struct WorkerTotals {
    hours: f64,
    rate: f64,
    latest: (chrono::DateTime<chrono::Utc>, i64),
    entry_ids: Vec<i64>,
}

/// Sums completed entries per worker. The rate is the snapshot on the
/// worker's most recent entry.
fn aggregate(entries: &[TimeEntry]) -> BTreeMap<i64, WorkerTotals> {
    let mut totals: BTreeMap<i64, WorkerTotals> = BTreeMap::new();

    for e in entries.iter().filter(|e| e.status == TimeEntryStatus::Completed) {
        let key = (e.clock_in, e.id);
        let t = totals.entry(e.worker_id).or_insert_with(|| WorkerTotals {
            hours: 0.0,
            rate: e.hourly_rate,
            latest: key,
            entry_ids: Vec::new(),
        });
        t.hours += e.total_hours.unwrap_or(0.0);
        t.entry_ids.push(e.id);
        if key > t.latest {
            t.latest = key;
            t.rate = e.hourly_rate;
        }
    }
    totals
}

pub struct PayrollProcessor {
    repo: Arc<dyn Repository>,
    ledger: Arc<TimeEntryLedger>,
    clock: Arc<dyn Clock>,
}

impl PayrollProcessor {
    pub fn new(repo: Arc<dyn Repository>, ledger: Arc<TimeEntryLedger>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, ledger, clock }
    }

    /// Creates one draft record per worker with completed entries in the
    /// period and approves those entries, atomically.
    pub async fn process_period(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<PayrollRecord>> {
        let entries = self.ledger.list_by_period(start, end).await?;
        let totals = aggregate(&entries);

        if totals.is_empty() {
            info!(%start, %end, "No completed time entries to process");
            return Ok(Vec::new());
        }

        let batch_id = Uuid::new_v4();
        let mut records = Vec::new();
        let mut entry_ids = Vec::new();

        for (worker_id, totals) in totals {
            let pay = compute_pay(totals.hours, totals.rate);
            records.push(NewPayrollRecord {
                batch_id,
                worker_id,
                period_start: start,
                period_end: end,
                regular_hours: pay.regular_hours,
                overtime_hours: pay.overtime_hours,
                hourly_rate: totals.rate,
                gross_pay: pay.gross_pay,
                withholding: pay.withholding,
                net_pay: pay.net_pay,
            });
            entry_ids.extend(totals.entry_ids);
        }

        let created = self
            .repo
            .commit_payroll(records, &entry_ids, self.clock.now())
            .await?;

        info!(
            %batch_id,
            %start,
            %end,
            records = created.len(),
            entries = entry_ids.len(),
            "Payroll batch processed"
        );
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> AppResult<PayrollRecord> {
        self.repo
            .get_payroll(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payroll record {id} not found")))
    }

    pub async fn list(
        &self,
        worker_id: Option<i64>,
        page: u32,
        per_page: u32,
    ) -> AppResult<(Vec<PayrollRecord>, i64)> {
        let offset = (page.max(1) - 1) as i64 * per_page as i64;
        self.repo.list_payroll(worker_id, per_page as i64, offset).await
    }

    pub async fn mark_paid(&self, id: i64) -> AppResult<PayrollRecord> {
        let record = self.get(id).await?;
        if record.status == PayrollStatus::Paid {
            return Err(AppError::invalid_transition(record.status, "mark paid"));
        }
        // only one of two racing calls finds the record still in draft
        let record = self
            .repo
            .set_payroll_status(id, PayrollStatus::Draft, PayrollStatus::Paid)
            .await?
            .ok_or_else(|| AppError::invalid_transition(PayrollStatus::Paid, "mark paid"))?;

        info!(payroll_id = id, worker_id = record.worker_id, "Payroll marked paid");
        Ok(record)
    }
}
