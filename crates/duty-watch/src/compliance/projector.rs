use chrono::{DateTime, Utc};

use super::aggregate::{summarize_bounded, AggregateError};
use super::domain::{DailySummary, WorkRecord};
use super::policy::CompliancePolicy;

/// Provisional daily summary for a shift still in progress, measured as
/// if it closed right now. Breaks still running clip at `now`; a shift
/// stamped in the future counts as zero so far.
pub fn project_live(
    record: &WorkRecord,
    now: DateTime<Utc>,
    policy: &CompliancePolicy,
) -> Result<DailySummary, AggregateError> {
    if record.end.is_some() {
        return Err(AggregateError::AlreadyClosed);
    }

    let bound = now.max(record.start);
    summarize_bounded(record, bound, false, policy)
}
