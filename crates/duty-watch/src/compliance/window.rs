use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use super::aggregate::minutes_between;
use super::domain::{DailySummary, RollingMetrics, WindowedMinutes, WorkRecord, YearMonth};
use super::policy::CompliancePolicy;

/// Roll per-day history into the windowed metrics for one driver-day.
///
/// `history` holds the driver's daily summaries in any order, including
/// the day under evaluation; days missing from a covered window count as
/// rest days with zero minutes. `bound` caps the continuous-driving scan
/// (the clock-out for closed shifts, the current instant for open ones).
pub fn evaluate(
    history: &[DailySummary],
    record: &WorkRecord,
    bound: DateTime<Utc>,
    previous_shift_end: Option<DateTime<Utc>>,
    policy: &CompliancePolicy,
) -> RollingMetrics {
    let as_of = record.date;

    RollingMetrics {
        two_day_avg_driving: windowed_average(history, as_of, 2),
        two_week_avg_driving: windowed_average(history, as_of, 14),
        month_binding_minutes: month_to_date_binding(history, as_of),
        extended_days_in_week: extended_days_in_week(history, as_of),
        rest_gap_minutes: previous_shift_end.map(|prev| minutes_between(prev, record.start)),
        longest_continuous_driving: longest_driving_stretch(
            record,
            bound,
            policy.break_time_minimum,
        ),
    }
}

/// Average driving over the trailing window of calendar days ending the
/// day before `as_of`. Both windows grade a per-half figure: the 2-day
/// window yields the per-day average, the 14-day window the per-week
/// average. The window is complete once history reaches back to its
/// first day.
fn windowed_average(history: &[DailySummary], as_of: NaiveDate, days: i64) -> WindowedMinutes {
    let from = as_of - Duration::days(days);
    let until = as_of - Duration::days(1);
    let total: u32 = history
        .iter()
        .filter(|day| day.date >= from && day.date <= until)
        .map(|day| day.driving_minutes)
        .sum();

    WindowedMinutes {
        minutes: total / 2,
        complete: history.iter().any(|day| day.date <= from),
    }
}

/// Binding minutes accumulated in `as_of`'s month, `as_of` included.
fn month_to_date_binding(history: &[DailySummary], as_of: NaiveDate) -> u32 {
    let month = YearMonth::of(as_of);
    history
        .iter()
        .filter(|day| month.contains(day.date) && day.date <= as_of)
        .map(|day| day.binding_minutes)
        .sum()
}

/// Extended days already taken in `as_of`'s Monday-based week, the day
/// under evaluation excluded so re-runs count the same week identically.
fn extended_days_in_week(history: &[DailySummary], as_of: NaiveDate) -> u32 {
    let week_start = as_of - Duration::days(i64::from(as_of.weekday().num_days_from_monday()));
    history
        .iter()
        .filter(|day| day.is_extended_day && day.date >= week_start && day.date < as_of)
        .count() as u32
}

/// Longest elapsed stretch between qualifying breaks inside the shift,
/// clipped to `[start, bound]`. Breaks shorter than `minimum_break` do
/// not interrupt the stretch.
pub fn longest_driving_stretch(
    record: &WorkRecord,
    bound: DateTime<Utc>,
    minimum_break: u32,
) -> u32 {
    let bound = bound.max(record.start);
    let mut breaks = record.breaks.clone();
    breaks.sort_by_key(|b| b.start);

    let mut cursor = record.start;
    let mut longest = 0u32;
    for interval in &breaks {
        let clip_start = interval.start.clamp(record.start, bound);
        let clip_end = interval.end.clamp(record.start, bound);
        if clip_end <= clip_start || minutes_between(clip_start, clip_end) < minimum_break {
            continue;
        }
        longest = longest.max(minutes_between(cursor, clip_start));
        cursor = cursor.max(clip_end);
    }

    longest.max(minutes_between(cursor, bound))
}
