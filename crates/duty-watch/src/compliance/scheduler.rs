use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::repository::{AlertStore, DriverDirectory, WorkRecordStore};
use super::service::{ComplianceError, ComplianceService, SweepFailure, SweepReport};

/// Days re-checked on every sweep, so late edits to recent records still
/// produce alerts.
pub const DEFAULT_SWEEP_LOOKBACK_DAYS: u32 = 3;

/// Cadence of the background close-out. `interval` must be nonzero.
#[derive(Debug, Clone, Copy)]
pub struct SweepSchedule {
    pub interval: Duration,
    pub lookback_days: u32,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            lookback_days: DEFAULT_SWEEP_LOOKBACK_DAYS,
        }
    }
}

/// Background driver of the nightly sweep.
pub struct SweepScheduler<W, A, D> {
    service: Arc<ComplianceService<W, A, D>>,
    schedule: SweepSchedule,
}

impl<W, A, D> SweepScheduler<W, A, D>
where
    W: WorkRecordStore + 'static,
    A: AlertStore + 'static,
    D: DriverDirectory + 'static,
{
    pub fn new(service: Arc<ComplianceService<W, A, D>>, schedule: SweepSchedule) -> Arc<Self> {
        Arc::new(Self { service, schedule })
    }

    /// Periodic close-out loop. The first tick fires immediately, which
    /// doubles as boot-time catch-up after downtime.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.schedule.interval);
        loop {
            ticker.tick().await;
            let as_of = Utc::now().date_naive();
            match self.sweep_now(as_of).await {
                Ok(report) => info!(
                    as_of = %report.as_of,
                    drivers = report.drivers_scanned,
                    days = report.days_evaluated,
                    alerts = report.alerts_created,
                    failures = report.failures.len(),
                    "compliance sweep finished"
                ),
                Err(error) => error!(error = %error, "compliance sweep failed"),
            }
        }
    }

    /// One sweep cycle, fanned out over blocking tasks one per driver.
    /// Alert-store uniqueness keeps concurrent evaluations of the same
    /// day from double-writing.
    pub async fn sweep_now(&self, as_of: NaiveDate) -> Result<SweepReport, ComplianceError> {
        let drivers = self.service.active_drivers()?;
        let mut report = SweepReport {
            as_of,
            lookback_days: self.schedule.lookback_days,
            drivers_scanned: drivers.len(),
            days_evaluated: 0,
            alerts_created: 0,
            failures: Vec::new(),
        };

        let mut tasks = JoinSet::new();
        for profile in drivers {
            let service = Arc::clone(&self.service);
            let lookback = self.schedule.lookback_days;
            tasks.spawn_blocking(move || {
                let result = service.sweep_driver(&profile.id, as_of, lookback);
                (profile.id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((driver_id, result)) => match result {
                    Ok(outcome) => {
                        report.days_evaluated += outcome.days_evaluated;
                        report.alerts_created += outcome.alerts_created;
                    }
                    Err(error) => {
                        warn!(driver = %driver_id, error = %error, "driver sweep failed");
                        report.failures.push(SweepFailure {
                            driver_id,
                            message: error.to_string(),
                        });
                    }
                },
                Err(join_error) => {
                    error!(error = %join_error, "sweep task aborted");
                }
            }
        }

        Ok(report)
    }
}
