use chrono::{DateTime, Utc};
use tracing::warn;

use super::domain::{BreakInterval, DailySummary, WorkRecord};
use super::policy::CompliancePolicy;

/// Errors from folding a duty record into a daily summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("record is still open")]
    StillOpen,
    #[error("record is already closed")]
    AlreadyClosed,
    #[error("shift ends before it starts")]
    EndsBeforeStart,
    #[error("break falls outside the shift")]
    BreakOutsideShift,
    #[error("break ends before it starts")]
    InvertedBreak,
    #[error("breaks overlap")]
    OverlappingBreaks,
}

/// Fold a closed duty record into its daily summary.
///
/// Binding time is the clock-in to clock-out span minus breaks. Driving
/// time is the reported figure, falling back to binding when nothing was
/// reported and clamped to binding when over-reported.
pub fn aggregate(
    record: &WorkRecord,
    policy: &CompliancePolicy,
) -> Result<DailySummary, AggregateError> {
    let end = record.end.ok_or(AggregateError::StillOpen)?;
    summarize_bounded(record, end, true, policy)
}

/// Shared arithmetic for closed aggregation and live projection. The live
/// path passes `closed = false` so in-progress breaks clip at `bound`
/// instead of failing validation.
pub(crate) fn summarize_bounded(
    record: &WorkRecord,
    bound: DateTime<Utc>,
    closed: bool,
    policy: &CompliancePolicy,
) -> Result<DailySummary, AggregateError> {
    if bound < record.start {
        return Err(AggregateError::EndsBeforeStart);
    }

    let breaks = ordered_breaks(record, bound, closed)?;
    let break_minutes: u32 = breaks
        .iter()
        .map(|b| minutes_between(b.start.max(record.start), b.end.min(bound)))
        .sum();

    let span = minutes_between(record.start, bound);
    let binding_minutes = span.saturating_sub(break_minutes);

    let reported = record.reported_driving_minutes.unwrap_or(binding_minutes);
    let driving_minutes = if reported > binding_minutes {
        warn!(
            driver = %record.driver_id,
            date = %record.date,
            reported,
            binding_minutes,
            "reported driving exceeds binding time, clamping"
        );
        binding_minutes
    } else {
        reported
    };

    Ok(DailySummary {
        driver_id: record.driver_id.clone(),
        date: record.date,
        binding_minutes,
        driving_minutes,
        break_minutes,
        is_extended_day: binding_minutes > policy.daily_binding_limit,
        has_violation: binding_minutes > policy.daily_binding_ceiling,
    })
}

/// Validate and sort the record's breaks. Closed records must contain
/// their breaks entirely; open projections may have a break running past
/// `bound`.
fn ordered_breaks(
    record: &WorkRecord,
    bound: DateTime<Utc>,
    closed: bool,
) -> Result<Vec<BreakInterval>, AggregateError> {
    let mut breaks = record.breaks.clone();
    breaks.sort_by_key(|b| b.start);

    let mut previous_end: Option<DateTime<Utc>> = None;
    for interval in &breaks {
        if interval.end < interval.start {
            return Err(AggregateError::InvertedBreak);
        }
        if interval.start < record.start {
            return Err(AggregateError::BreakOutsideShift);
        }
        if closed && interval.end > bound {
            return Err(AggregateError::BreakOutsideShift);
        }
        if let Some(prev) = previous_end {
            if interval.start < prev {
                return Err(AggregateError::OverlappingBreaks);
            }
        }
        previous_end = Some(interval.end);
    }

    Ok(breaks)
}

/// Whole minutes between two instants, zero when inverted.
pub(crate) fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let minutes = (end - start).num_minutes().max(0);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}
