//! Compliance pipeline: aggregate duty records into daily summaries,
//! roll multi-day windows, grade against policy thresholds, and
//! reconcile deduplicated alerts.

pub mod aggregate;
pub mod alerts;
pub mod domain;
pub mod policy;
pub mod projector;
pub mod repository;
pub mod router;
pub mod rules;
pub mod scheduler;
pub mod service;
pub mod timecard;
pub mod window;

#[cfg(test)]
mod tests;

pub use aggregate::{aggregate, AggregateError};
pub use alerts::{hours_label, reconcile, Reconciliation};
pub use domain::{
    Alert, AlertId, BreakInterval, DailySummary, DriverId, DriverProfile, NewAlert,
    RollingMetrics, RuleCategory, RuleLevel, RuleOutcome, Severity, WindowedMinutes, WorkRecord,
    WorkRecordId, YearMonth,
};
pub use policy::{CompliancePolicy, RuleThresholds, ThresholdDirection};
pub use projector::project_live;
pub use repository::{
    AlertPage, AlertQuery, AlertStore, DriverDirectory, SeverityTally, StoreError,
    WorkRecordStore, DEFAULT_ALERT_PAGE,
};
pub use router::compliance_router;
pub use rules::classify;
pub use scheduler::{SweepSchedule, SweepScheduler, DEFAULT_SWEEP_LOOKBACK_DAYS};
pub use service::{
    BoardSummary, BulkAcknowledgeFailure, BulkAcknowledgeOutcome, CompanyMonthlyStats,
    ComplianceError, ComplianceService, DriverDayReport, DriverDetail, DriverLiveStatus,
    DriverSweep, LiveBoard, LiveStatus, MonthlySummary, SweepFailure, SweepReport,
};
pub use timecard::{parse_timecard, TimecardImportError};
