use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use super::aggregate::{self, AggregateError};
use super::alerts;
use super::domain::{
    Alert, AlertId, DailySummary, DriverId, DriverProfile, RollingMetrics, RuleCategory,
    RuleLevel, RuleOutcome, Severity, YearMonth,
};
use super::policy::CompliancePolicy;
use super::projector;
use super::repository::{
    AlertPage, AlertQuery, AlertStore, DriverDirectory, SeverityTally, StoreError,
    WorkRecordStore,
};
use super::rules;
use super::window;

/// Alerts returned on a driver detail view.
const RECENT_ALERTS: usize = 20;

/// Closed days shown in the driver detail trend.
const TREND_DAYS: i64 = 7;

/// Service facade composing the record store, alert store, and roster
/// around the pure evaluation pipeline.
pub struct ComplianceService<W, A, D> {
    records: Arc<W>,
    alerts: Arc<A>,
    drivers: Arc<D>,
    policy: CompliancePolicy,
}

/// Error raised by the compliance service.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("unknown driver {0}")]
    UnknownDriver(DriverId),
    #[error("invalid month {0}")]
    InvalidMonth(YearMonth),
}

/// Everything the evaluation of one driver-day produced.
#[derive(Debug, Clone, Serialize)]
pub struct DriverDayReport {
    pub driver_id: DriverId,
    pub date: NaiveDate,
    pub summary: DailySummary,
    pub rolling: RollingMetrics,
    pub outcomes: Vec<RuleOutcome>,
    pub created_alerts: Vec<Alert>,
    pub unchanged_alerts: usize,
}

/// Tally of one driver's share of a sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverSweep {
    pub days_evaluated: usize,
    pub alerts_created: usize,
}

/// Close-out sweep result across the roster.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub as_of: NaiveDate,
    pub lookback_days: u32,
    pub drivers_scanned: usize,
    pub days_evaluated: usize,
    pub alerts_created: usize,
    pub failures: Vec<SweepFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub driver_id: DriverId,
    pub message: String,
}

/// Graded live state of one driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    OffDuty,
    Normal,
    Warning,
    Violation,
    Critical,
    Unknown,
}

impl LiveStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LiveStatus::OffDuty => "off_duty",
            LiveStatus::Normal => "normal",
            LiveStatus::Warning => "warning",
            LiveStatus::Violation => "violation",
            LiveStatus::Critical => "critical",
            LiveStatus::Unknown => "unknown",
        }
    }

    const fn from_level(level: RuleLevel) -> Self {
        match level {
            RuleLevel::Normal => LiveStatus::Normal,
            RuleLevel::Warning => LiveStatus::Warning,
            RuleLevel::Violation => LiveStatus::Violation,
            RuleLevel::Critical => LiveStatus::Critical,
        }
    }
}

/// One driver's row on the live board.
#[derive(Debug, Clone, Serialize)]
pub struct DriverLiveStatus {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub employee_number: String,
    pub is_working: bool,
    pub current_binding_minutes: u32,
    pub binding_limit: u32,
    pub binding_ceiling: u32,
    pub status: LiveStatus,
}

/// Counts per state across the board.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BoardSummary {
    pub total_drivers: usize,
    pub working: usize,
    pub off_duty: usize,
    pub normal: usize,
    pub warning: usize,
    pub violation: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl BoardSummary {
    fn absorb(&mut self, status: &DriverLiveStatus) {
        if status.is_working {
            self.working += 1;
        }
        match status.status {
            LiveStatus::OffDuty => self.off_duty += 1,
            LiveStatus::Normal => self.normal += 1,
            LiveStatus::Warning => self.warning += 1,
            LiveStatus::Violation => self.violation += 1,
            LiveStatus::Critical => self.critical += 1,
            LiveStatus::Unknown => self.unknown += 1,
        }
    }
}

/// Fleet-wide live snapshot. Assembled fresh per request, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct LiveBoard {
    pub generated_at: DateTime<Utc>,
    pub drivers: Vec<DriverLiveStatus>,
    pub summary: BoardSummary,
}

/// Per-driver monthly rollup.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub work_days: u32,
    pub total_binding_minutes: u32,
    pub total_driving_minutes: u32,
    pub total_break_minutes: u32,
    pub extended_days: u32,
    pub violation_days: u32,
    pub max_daily_binding: u32,
    pub max_daily_driving: u32,
}

impl MonthlySummary {
    fn empty(month: YearMonth) -> Self {
        Self {
            month: month.to_string(),
            work_days: 0,
            total_binding_minutes: 0,
            total_driving_minutes: 0,
            total_break_minutes: 0,
            extended_days: 0,
            violation_days: 0,
            max_daily_binding: 0,
            max_daily_driving: 0,
        }
    }

    fn fold(&mut self, day: &DailySummary) {
        self.work_days += 1;
        self.total_binding_minutes = self.total_binding_minutes.saturating_add(day.binding_minutes);
        self.total_driving_minutes = self.total_driving_minutes.saturating_add(day.driving_minutes);
        self.total_break_minutes = self.total_break_minutes.saturating_add(day.break_minutes);
        if day.is_extended_day {
            self.extended_days += 1;
        }
        if day.has_violation {
            self.violation_days += 1;
        }
        self.max_daily_binding = self.max_daily_binding.max(day.binding_minutes);
        self.max_daily_driving = self.max_daily_driving.max(day.driving_minutes);
    }
}

/// Fleet-wide monthly rollup plus the month's alert counts.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyMonthlyStats {
    pub month: String,
    pub active_drivers: usize,
    pub drivers_with_records: usize,
    pub total_binding_minutes: u32,
    pub total_driving_minutes: u32,
    pub extended_days: u32,
    pub violation_days: u32,
    pub avg_daily_binding: u32,
    pub avg_daily_driving: u32,
    pub alerts: SeverityTally,
}

/// Driver drill-down for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DriverDetail {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub employee_number: String,
    pub live: DriverLiveStatus,
    pub recent_days: Vec<DailySummary>,
    pub recent_alerts: Vec<Alert>,
    pub month: MonthlySummary,
}

/// Result of acknowledging a batch of alerts; failures are per-id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkAcknowledgeOutcome {
    pub acknowledged: usize,
    pub failed: Vec<BulkAcknowledgeFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkAcknowledgeFailure {
    pub alert_id: AlertId,
    pub message: String,
}

impl<W, A, D> ComplianceService<W, A, D>
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    pub fn new(records: Arc<W>, alerts: Arc<A>, drivers: Arc<D>, policy: CompliancePolicy) -> Self {
        Self {
            records,
            alerts,
            drivers,
            policy: policy.sanitized(),
        }
    }

    pub fn policy(&self) -> &CompliancePolicy {
        &self.policy
    }

    /// Evaluate one driver-day end to end: aggregate, roll windows, grade,
    /// reconcile, persist. Returns `None` when the driver has no closed
    /// record for the day.
    pub fn evaluate_driver_day(
        &self,
        driver_id: &DriverId,
        date: NaiveDate,
    ) -> Result<Option<DriverDayReport>, ComplianceError> {
        self.require_driver(driver_id)?;

        let month_anchor = first_of_month(date);
        let fetch_start = month_anchor.min(date - Duration::days(14));
        let records = self.records.closed_records(driver_id, fetch_start, date)?;
        let anchor = self.records.latest_closed_before(driver_id, fetch_start)?;

        let Some(target) = records.iter().find(|record| record.date == date).cloned() else {
            return Ok(None);
        };
        let end = target.end.ok_or(AggregateError::StillOpen)?;
        let summary = aggregate::aggregate(&target, &self.policy)?;

        // Neighboring days feed the rolling windows; a malformed neighbor
        // drops out with a warning instead of blocking the target day.
        let mut history: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();
        for record in anchor.iter().chain(records.iter()) {
            if record.date == date {
                continue;
            }
            match aggregate::aggregate(record, &self.policy) {
                Ok(day) => {
                    history.insert(day.date, day);
                }
                Err(error) => warn!(
                    driver = %driver_id,
                    date = %record.date,
                    error = %error,
                    "skipping malformed duty record"
                ),
            }
        }
        history.insert(date, summary.clone());

        let previous_end = records
            .iter()
            .filter(|record| record.date < date)
            .last()
            .and_then(|record| record.end)
            .or_else(|| anchor.as_ref().and_then(|record| record.end));

        let history: Vec<DailySummary> = history.into_values().collect();
        let rolling = window::evaluate(&history, &target, end, previous_end, &self.policy);
        let outcomes = rules::classify(&summary, &rolling, &self.policy);

        let mut existing = self.alerts.alerts_for_day(driver_id, date)?;
        if month_anchor != date {
            existing.extend(self.alerts.alerts_for_day(driver_id, month_anchor)?);
        }

        let reconciliation = alerts::reconcile(&outcomes, &existing, &rolling, &self.policy);
        let unchanged_alerts = reconciliation.unchanged.len();
        let mut created = Vec::new();
        for draft in reconciliation.to_create {
            match self.alerts.insert(draft) {
                Ok(alert) => created.push(alert),
                // another sweep already created it
                Err(StoreError::Conflict) => {}
                Err(error) => return Err(error.into()),
            }
        }

        Ok(Some(DriverDayReport {
            driver_id: driver_id.clone(),
            date,
            summary,
            rolling,
            outcomes,
            created_alerts: created,
            unchanged_alerts,
        }))
    }

    /// Re-evaluate one driver's trailing days up to `as_of`.
    pub fn sweep_driver(
        &self,
        driver_id: &DriverId,
        as_of: NaiveDate,
        lookback_days: u32,
    ) -> Result<DriverSweep, ComplianceError> {
        let mut outcome = DriverSweep::default();
        for offset in (0..lookback_days.max(1)).rev() {
            let day = as_of - Duration::days(i64::from(offset));
            if let Some(report) = self.evaluate_driver_day(driver_id, day)? {
                outcome.days_evaluated += 1;
                outcome.alerts_created += report.created_alerts.len();
            }
        }
        Ok(outcome)
    }

    /// Close-out sweep over the active roster. One driver's failure is
    /// recorded and the sweep moves on.
    pub fn sweep(&self, as_of: NaiveDate, lookback_days: u32) -> Result<SweepReport, ComplianceError> {
        let drivers = self.drivers.active_drivers()?;
        let mut report = SweepReport {
            as_of,
            lookback_days,
            drivers_scanned: drivers.len(),
            days_evaluated: 0,
            alerts_created: 0,
            failures: Vec::new(),
        };

        for profile in &drivers {
            match self.sweep_driver(&profile.id, as_of, lookback_days) {
                Ok(outcome) => {
                    report.days_evaluated += outcome.days_evaluated;
                    report.alerts_created += outcome.alerts_created;
                }
                Err(error) => {
                    warn!(driver = %profile.id, error = %error, "driver sweep failed");
                    report.failures.push(SweepFailure {
                        driver_id: profile.id.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Who is on shift right now and how close to the daily line. Reads
    /// only; a driver whose stores misbehave degrades to `unknown`.
    pub fn live_board(&self, now: DateTime<Utc>) -> Result<LiveBoard, ComplianceError> {
        let profiles = self.drivers.active_drivers()?;
        let today = now.date_naive();

        let mut summary = BoardSummary {
            total_drivers: profiles.len(),
            ..BoardSummary::default()
        };
        let mut drivers = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let status = self.driver_live(profile, today, now);
            summary.absorb(&status);
            drivers.push(status);
        }

        Ok(LiveBoard {
            generated_at: now,
            drivers,
            summary,
        })
    }

    fn driver_live(
        &self,
        profile: &DriverProfile,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> DriverLiveStatus {
        let (is_working, binding, worked) = match self.driver_live_inner(&profile.id, today, now)
        {
            Ok(measured) => measured,
            Err(error) => {
                warn!(driver = %profile.id, error = %error, "live status unavailable");
                return self.live_status_row(profile, false, 0, LiveStatus::Unknown);
            }
        };

        let status = if worked {
            LiveStatus::from_level(
                self.policy
                    .thresholds(RuleCategory::BindingTimeDaily)
                    .grade(binding),
            )
        } else {
            LiveStatus::OffDuty
        };

        self.live_status_row(profile, is_working, binding, status)
    }

    fn driver_live_inner(
        &self,
        driver_id: &DriverId,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(bool, u32, bool), ComplianceError> {
        let mut binding = 0u32;
        let mut worked = false;

        for record in self.records.closed_records(driver_id, today, today)? {
            binding = binding.saturating_add(
                aggregate::aggregate(&record, &self.policy)?.binding_minutes,
            );
            worked = true;
        }

        let open = self.records.open_record(driver_id)?;
        let is_working = open.is_some();
        if let Some(open_record) = open {
            binding = binding.saturating_add(
                projector::project_live(&open_record, now, &self.policy)?.binding_minutes,
            );
            worked = true;
        }

        Ok((is_working, binding, worked))
    }

    fn live_status_row(
        &self,
        profile: &DriverProfile,
        is_working: bool,
        binding: u32,
        status: LiveStatus,
    ) -> DriverLiveStatus {
        DriverLiveStatus {
            driver_id: profile.id.clone(),
            driver_name: profile.name.clone(),
            employee_number: profile.employee_number.clone(),
            is_working,
            current_binding_minutes: binding,
            binding_limit: self.policy.daily_binding_limit,
            binding_ceiling: self.policy.daily_binding_ceiling,
            status,
        }
    }

    /// Driver drill-down: live state, a short trend, recent alerts, and
    /// the current month's rollup.
    pub fn driver_detail(
        &self,
        driver_id: &DriverId,
        now: DateTime<Utc>,
    ) -> Result<DriverDetail, ComplianceError> {
        let profile = self.require_driver(driver_id)?;
        let today = now.date_naive();
        let live = self.driver_live(&profile, today, now);

        let mut recent_days = Vec::new();
        let trend_start = today - Duration::days(TREND_DAYS - 1);
        for record in self.records.closed_records(driver_id, trend_start, today)? {
            match aggregate::aggregate(&record, &self.policy) {
                Ok(day) => recent_days.push(day),
                Err(error) => warn!(
                    driver = %driver_id,
                    date = %record.date,
                    error = %error,
                    "skipping malformed duty record"
                ),
            }
        }

        let recent_alerts = self.alerts.recent_for_driver(driver_id, RECENT_ALERTS)?;
        let month = self.monthly_summary(driver_id, YearMonth::of(today))?;

        Ok(DriverDetail {
            driver_id: profile.id,
            driver_name: profile.name,
            employee_number: profile.employee_number,
            live,
            recent_days,
            recent_alerts,
            month,
        })
    }

    /// One driver's month, recomputed from records. All zeros when the
    /// driver logged nothing.
    pub fn monthly_summary(
        &self,
        driver_id: &DriverId,
        month: YearMonth,
    ) -> Result<MonthlySummary, ComplianceError> {
        self.require_driver(driver_id)?;
        let (first, last) = month.days().ok_or(ComplianceError::InvalidMonth(month))?;

        let mut summary = MonthlySummary::empty(month);
        for record in self.records.closed_records(driver_id, first, last)? {
            match aggregate::aggregate(&record, &self.policy) {
                Ok(day) => summary.fold(&day),
                Err(error) => warn!(
                    driver = %driver_id,
                    date = %record.date,
                    error = %error,
                    "skipping malformed duty record"
                ),
            }
        }

        Ok(summary)
    }

    /// Fleet-wide month rollup plus the month's alert tally.
    pub fn company_monthly_stats(
        &self,
        month: YearMonth,
    ) -> Result<CompanyMonthlyStats, ComplianceError> {
        let (first, last) = month.days().ok_or(ComplianceError::InvalidMonth(month))?;
        let profiles = self.drivers.active_drivers()?;

        let mut stats = CompanyMonthlyStats {
            month: month.to_string(),
            active_drivers: profiles.len(),
            drivers_with_records: 0,
            total_binding_minutes: 0,
            total_driving_minutes: 0,
            extended_days: 0,
            violation_days: 0,
            avg_daily_binding: 0,
            avg_daily_driving: 0,
            alerts: SeverityTally::default(),
        };

        let mut work_days = 0u32;
        for profile in &profiles {
            let mut driver_days = 0u32;
            for record in self.records.closed_records(&profile.id, first, last)? {
                match aggregate::aggregate(&record, &self.policy) {
                    Ok(day) => {
                        work_days += 1;
                        driver_days += 1;
                        stats.total_binding_minutes =
                            stats.total_binding_minutes.saturating_add(day.binding_minutes);
                        stats.total_driving_minutes =
                            stats.total_driving_minutes.saturating_add(day.driving_minutes);
                        if day.is_extended_day {
                            stats.extended_days += 1;
                        }
                        if day.has_violation {
                            stats.violation_days += 1;
                        }
                    }
                    Err(error) => warn!(
                        driver = %profile.id,
                        date = %record.date,
                        error = %error,
                        "skipping malformed duty record"
                    ),
                }
            }
            if driver_days > 0 {
                stats.drivers_with_records += 1;
            }
        }

        if work_days > 0 {
            stats.avg_daily_binding = stats.total_binding_minutes / work_days;
            stats.avg_daily_driving = stats.total_driving_minutes / work_days;
        }
        stats.alerts = self.month_alert_tally(first, last)?;

        Ok(stats)
    }

    fn month_alert_tally(
        &self,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<SeverityTally, ComplianceError> {
        let mut tally = SeverityTally::default();
        for severity in [Severity::Warning, Severity::Violation, Severity::Critical] {
            let query = AlertQuery {
                level: Some(severity),
                date_from: Some(first),
                date_to: Some(last),
                limit: Some(0),
                ..AlertQuery::default()
            };
            let total = self.alerts.search(&query)?.total;
            match severity {
                Severity::Warning => tally.warning = total,
                Severity::Violation => tally.violation = total,
                Severity::Critical => tally.critical = total,
            }
        }
        Ok(tally)
    }

    pub fn search_alerts(&self, query: &AlertQuery) -> Result<AlertPage, ComplianceError> {
        Ok(self.alerts.search(query)?)
    }

    pub fn unacknowledged_counts(&self) -> Result<SeverityTally, ComplianceError> {
        Ok(self.alerts.unacknowledged_counts()?)
    }

    /// Acknowledge one alert. Acknowledging an already-acknowledged alert
    /// succeeds without change.
    pub fn acknowledge(&self, id: &AlertId) -> Result<Alert, ComplianceError> {
        Ok(self.alerts.set_acknowledged(id)?)
    }

    /// Acknowledge a batch; every id is attempted and failures are
    /// reported per id.
    pub fn bulk_acknowledge(&self, ids: &[AlertId]) -> Result<BulkAcknowledgeOutcome, ComplianceError> {
        let mut outcome = BulkAcknowledgeOutcome::default();
        for id in ids {
            match self.alerts.set_acknowledged(id) {
                Ok(_) => outcome.acknowledged += 1,
                Err(error) => outcome.failed.push(BulkAcknowledgeFailure {
                    alert_id: id.clone(),
                    message: error.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    pub fn active_drivers(&self) -> Result<Vec<DriverProfile>, ComplianceError> {
        Ok(self.drivers.active_drivers()?)
    }

    fn require_driver(&self, id: &DriverId) -> Result<DriverProfile, ComplianceError> {
        self.drivers
            .driver(id)?
            .ok_or_else(|| ComplianceError::UnknownDriver(id.clone()))
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    YearMonth::of(date).first_day().unwrap_or(date)
}
