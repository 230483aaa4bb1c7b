use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Alert, AlertId, DriverId, DriverProfile, NewAlert, RuleCategory, Severity, WorkRecord,
};

/// Page size applied when an alert search names no limit.
pub const DEFAULT_ALERT_PAGE: usize = 50;

/// Filters and paging for alert searches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    pub driver_id: Option<DriverId>,
    pub acknowledged: Option<bool>,
    pub level: Option<Severity>,
    pub category: Option<RuleCategory>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Page of alerts plus the total matching count before paging.
#[derive(Debug, Clone, Serialize)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub total: usize,
}

/// Alert counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityTally {
    pub warning: usize,
    pub violation: usize,
    pub critical: usize,
}

impl SeverityTally {
    pub fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Warning => self.warning += 1,
            Severity::Violation => self.violation += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.warning + self.violation + self.critical
    }
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row already exists")]
    Conflict,
    #[error("row not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to duty records. Ingestion happens outside the engine;
/// at most one closed record exists per driver-day.
pub trait WorkRecordStore: Send + Sync {
    /// The driver's currently open shift, if any.
    fn open_record(&self, driver: &DriverId) -> Result<Option<WorkRecord>, StoreError>;

    /// Closed records for the driver with duty days in `[from, until]`,
    /// ascending by day.
    fn closed_records(
        &self,
        driver: &DriverId,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<WorkRecord>, StoreError>;

    /// The latest closed record with a duty day strictly before `date`.
    fn latest_closed_before(
        &self,
        driver: &DriverId,
        date: NaiveDate,
    ) -> Result<Option<WorkRecord>, StoreError>;
}

/// Persistence for compliance alerts. `insert` must enforce uniqueness on
/// `(driver, alert date, category)`; that constraint, not engine locking,
/// arbitrates concurrent sweeps.
pub trait AlertStore: Send + Sync {
    fn insert(&self, draft: NewAlert) -> Result<Alert, StoreError>;

    /// All alerts anchored to the given driver-day, any category.
    fn alerts_for_day(&self, driver: &DriverId, date: NaiveDate) -> Result<Vec<Alert>, StoreError>;

    /// Filtered page ordered most severe first, newest first within a
    /// severity. A query without a limit pages by [`DEFAULT_ALERT_PAGE`].
    fn search(&self, query: &AlertQuery) -> Result<AlertPage, StoreError>;

    /// The driver's newest alerts, most recent first.
    fn recent_for_driver(&self, driver: &DriverId, limit: usize)
        -> Result<Vec<Alert>, StoreError>;

    /// Mark an alert acknowledged. Acknowledging twice is a no-op success.
    fn set_acknowledged(&self, id: &AlertId) -> Result<Alert, StoreError>;

    fn unacknowledged_counts(&self) -> Result<SeverityTally, StoreError>;
}

/// Roster lookup for sweep fan-out and display names.
pub trait DriverDirectory: Send + Sync {
    fn active_drivers(&self) -> Result<Vec<DriverProfile>, StoreError>;
    fn driver(&self, id: &DriverId) -> Result<Option<DriverProfile>, StoreError>;
}
